// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

mod boyermoore;
mod charproperty;
mod compiler;
mod enhanced;
mod instance;
mod node;
mod printer;
mod process;
mod registry;
mod replacement;
mod tokenizer;

pub mod context;
pub mod error;
pub mod flags;
pub mod regex;

pub use context::{ContextConfig, StructuralContext, SymbolPair};
pub use enhanced::Enhancement;
pub use error::RegexError;
pub use flags::Flags;
pub use instance::{Observer, TraceEvent};
pub use node::Program;
pub use regex::{CaptureMatches, Captures, Match, MatchResult, Matcher, Matches, Regex};

#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
