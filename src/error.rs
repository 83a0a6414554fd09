// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use thiserror::Error;

#[derive(Debug, PartialEq, Clone, Error)]
pub enum RegexError {
    /// The pattern is malformed.
    ///
    /// `offset` is the index (in characters) of the offending
    /// character within `pattern`.
    #[error("{}", render_syntax_error(.message, .pattern, *.offset))]
    Syntax {
        message: String,
        pattern: String,
        offset: usize,
    },

    /// A position or group accessor was called when no match is available.
    #[error("{0}")]
    IllegalState(String),

    #[error("No group {0}.")]
    GroupIndexOutOfRange(usize),

    #[error("No group with name <{0}>.")]
    NoSuchGroupName(String),

    /// The replacement template is malformed.
    #[error("Illegal replacement: {0}.")]
    Replacement(String),

    /// The configuration of the enhanced syntax is invalid.
    #[error("Invalid configuration: {0}.")]
    Config(String),
}

impl RegexError {
    pub fn syntax(message: &str, pattern: &str, offset: usize) -> Self {
        RegexError::Syntax {
            message: message.to_owned(),
            pattern: pattern.to_owned(),
            offset,
        }
    }

    pub fn no_match() -> Self {
        RegexError::IllegalState("No match available".to_owned())
    }
}

// e.g.
//
// ```text
// Unclosed group near index 3
// a(b
//    ^
// ```
fn render_syntax_error(message: &str, pattern: &str, offset: usize) -> String {
    let mut s = format!("{} near index {}\n{}", message, offset, pattern);
    if offset <= pattern.chars().count() {
        s.push('\n');
        s.push_str(&" ".repeat(offset));
        s.push('^');
    }
    s
}
