// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use bitflags::bitflags;

bitflags! {
    /// Compile flags.
    ///
    /// The flags can be combined, e.g. `Flags::CASE_INSENSITIVE | Flags::MULTILINE`,
    /// and most of them can also be switched inside a pattern
    /// with the inline modifiers `(?idmsuxUc-idmsuxUc)`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u32 {
        /// Only '\n' is a line terminator for `.`, `^` and `$`. Inline `d`.
        const UNIX_LINES = 0x01;

        /// Case-insensitive matching, ASCII only unless `UNICODE_CASE`
        /// is also set. Inline `i`.
        const CASE_INSENSITIVE = 0x02;

        /// Whitespace and `#` comments are ignored in the pattern. Inline `x`.
        const COMMENTS = 0x04;

        /// `^` and `$` match at line terminators. Inline `m`.
        const MULTILINE = 0x08;

        /// The whole pattern is a literal string.
        const LITERAL = 0x10;

        /// `.` matches any character including line terminators. Inline `s`.
        const DOTALL = 0x20;

        /// Unicode-aware case folding. Inline `u`.
        const UNICODE_CASE = 0x40;

        /// Canonical equivalence. Inline `c`.
        const CANON_EQ = 0x80;

        /// Unicode versions of the predefined and POSIX classes. Inline `U`.
        const UNICODE_CHARACTER_CLASS = 0x100;

        /// Enables the `~` assertions for balanced brackets and quotes.
        const ENHANCED_REGEX = 0x200;
    }
}

impl Flags {
    /// Map an inline modifier letter to its flag.
    pub fn from_letter(c: char) -> Option<Flags> {
        let flags = match c {
            'i' => Flags::CASE_INSENSITIVE,
            'm' => Flags::MULTILINE,
            's' => Flags::DOTALL,
            'd' => Flags::UNIX_LINES,
            'u' => Flags::UNICODE_CASE,
            'c' => Flags::CANON_EQ,
            'x' => Flags::COMMENTS,
            'U' => Flags::UNICODE_CHARACTER_CLASS | Flags::UNICODE_CASE,
            _ => return None,
        };
        Some(flags)
    }

    /// Parse a string of inline modifier letters, e.g. "im".
    pub fn from_letters(s: &str) -> Option<Flags> {
        s.chars()
            .try_fold(Flags::empty(), |acc, c| Flags::from_letter(c).map(|f| acc | f))
    }
}
