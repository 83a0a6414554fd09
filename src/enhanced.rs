// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

//! The enhanced assertions.
//!
//! - `~<` and `~>` mark a region where all the configured brackets are balanced,
//!   `~(` and `~)` (any configured bracket pair) check that pair only.
//! - `~'` (any configured open quote) asserts the position is inside of the quote,
//!   `~^'` asserts it is not. For a quote with distinct delimiters,
//!   the close delimiter inverts the meaning, e.g. `~]` is the same as `~^[`.
//! - `~^` followed by anything else asserts the position is outside of any quote.
//!
//! The assertions are translated into empty named groups (markers), the
//! pattern is compiled as usual, and the positions captured by the
//! markers are checked against the [`StructuralContext`] of the text
//! after the engine finds a candidate. A rejected candidate is searched
//! again in a shrinking window.

use std::ops::Range;

use log::{debug, trace};

use crate::{
    compiler::compile,
    context::{ContextConfig, StructuralContext},
    error::RegexError,
    flags::Flags,
    instance::{AcceptMode, Instance},
    node::{MarkerKind, Program},
    registry::GroupRegistry,
};

const MARKER_PREFIX: &str = "EREINTu";
const OPEN_PAREN_NAME: &str = "OPARENu";
const CLOSE_PAREN_NAME: &str = "CPARENu";
const NO_QUOTE_NAME: &str = "NOQUOTu";
const IN_QUOTE_NAME: &str = "INQUOTu";
const OUT_QUOTE_NAME: &str = "OUTQUOTu";

/// The kind of the marker a group name stands for.
pub fn marker_kind(name: &str) -> Option<MarkerKind> {
    let rest = name.strip_prefix(MARKER_PREFIX)?;
    if rest.starts_with(OPEN_PAREN_NAME) {
        Some(MarkerKind::OpenParen)
    } else if rest.starts_with(CLOSE_PAREN_NAME) {
        Some(MarkerKind::CloseParen)
    } else if rest.starts_with(NO_QUOTE_NAME)
        || rest.starts_with(IN_QUOTE_NAME)
        || rest.starts_with(OUT_QUOTE_NAME)
    {
        Some(MarkerKind::Quote)
    } else {
        None
    }
}

/// A check on the positions of markers. `G` refers to a marker group,
/// by name before compiling and by index after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion<G> {
    /// The brackets between the two markers are balanced.
    /// `kind` is the index of the bracket pair, `None` for all pairs.
    Parens {
        open: G,
        close: G,
        kind: Option<usize>,
    },

    /// The marker is inside of (or outside of) the quote.
    /// `quote` `None` stands for any quote.
    Quote {
        marker: G,
        quote: Option<usize>,
        inside: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub pattern: String,
    pub assertions: Vec<Assertion<String>>,
}

/// Replace the `~` assertions with marker groups.
pub fn translate(pattern: &str, config: &ContextConfig) -> Result<Translation, RegexError> {
    Translator::new(pattern, config).translate()
}

struct Translator<'a> {
    pattern: &'a str,
    chars: Vec<char>,
    config: &'a ContextConfig,
    output: String,
    assertions: Vec<Assertion<String>>,
    paren_count: usize,
    no_quote_count: usize,
    in_quote_counts: Vec<usize>,
    out_quote_counts: Vec<usize>,

    // the unclosed open markers, (marker index, offset), the last
    // stack is for `~<`.
    opens: Vec<Vec<(usize, usize)>>,
}

impl<'a> Translator<'a> {
    fn new(pattern: &'a str, config: &'a ContextConfig) -> Self {
        Translator {
            pattern,
            chars: pattern.chars().collect(),
            config,
            output: String::with_capacity(pattern.len()),
            assertions: vec![],
            paren_count: 0,
            no_quote_count: 0,
            in_quote_counts: vec![0; config.quotes.len()],
            out_quote_counts: vec![0; config.quotes.len()],
            opens: vec![vec![]; config.brackets.len() + 1],
        }
    }

    fn error_at(&self, message: &str, offset: usize) -> RegexError {
        RegexError::syntax(message, self.pattern, offset)
    }

    fn translate(mut self) -> Result<Translation, RegexError> {
        let mut index = 0;
        while index < self.chars.len() {
            let c = self.chars[index];
            match c {
                '\\' => {
                    index = self.copy_escape(index);
                }
                '~' => {
                    index = self.assertion(index)?;
                }
                _ => {
                    self.output.push(c);
                    index += 1;
                }
            }
        }

        if let Some((_, offset)) = self.opens.iter().flatten().min_by_key(|(_, offset)| *offset) {
            return Err(self.error_at("This tilde parenthesis has no matching close", *offset));
        }

        Ok(Translation {
            pattern: self.output,
            assertions: self.assertions,
        })
    }

    // copies `\x`, and `\Q...\E` as a whole.
    fn copy_escape(&mut self, index: usize) -> usize {
        let Some(&next) = self.chars.get(index + 1) else {
            self.output.push('\\');
            return index + 1;
        };

        self.output.push('\\');
        self.output.push(next);

        if next != 'Q' {
            return index + 2;
        }

        let mut position = index + 2;
        while position < self.chars.len() {
            let c = self.chars[position];
            self.output.push(c);
            position += 1;
            if c == '\\' && self.chars.get(position) == Some(&'E') {
                self.output.push('E');
                return position + 1;
            }
        }
        position
    }

    fn assertion(&mut self, index: usize) -> Result<usize, RegexError> {
        let Some(&symbol) = self.chars.get(index + 1) else {
            return Err(self.error_at("Dangling enhanced assertion", index));
        };

        match symbol {
            '<' => {
                self.open_paren(None, index + 1);
                Ok(index + 2)
            }
            '>' => {
                self.close_paren(None, index + 1)?;
                Ok(index + 2)
            }
            '^' => match self.chars.get(index + 2).copied() {
                Some('^') => Err(self.error_at(
                    "Multiple carets have no meaning in an enhanced assertion",
                    index + 2,
                )),
                Some(c) if c == '<' || c == '>' || self.bracket_of(c).is_some() => Err(self
                    .error_at(
                        "Carets can not precede a bracket in an enhanced assertion",
                        index + 2,
                    )),
                Some(c) => match self.quote_of(c) {
                    Some((quote, is_open)) => {
                        self.quote(quote, !is_open);
                        Ok(index + 3)
                    }
                    None => {
                        self.no_quote();
                        Ok(index + 2)
                    }
                },
                None => {
                    self.no_quote();
                    Ok(index + 2)
                }
            },
            _ => {
                if let Some((quote, is_open)) = self.quote_of(symbol) {
                    self.quote(quote, is_open);
                    return Ok(index + 2);
                }

                match self.bracket_of(symbol) {
                    Some((kind, true)) => {
                        self.open_paren(Some(kind), index + 1);
                        Ok(index + 2)
                    }
                    Some((kind, false)) => {
                        self.close_paren(Some(kind), index + 1)?;
                        Ok(index + 2)
                    }
                    None => Err(self.error_at(
                        &format!("\"{}\" is not a valid character in an enhanced assertion", symbol),
                        index + 1,
                    )),
                }
            }
        }
    }

    // (index, is open)
    fn quote_of(&self, c: char) -> Option<(usize, bool)> {
        self.config.quotes.iter().enumerate().find_map(|(index, pair)| {
            if pair.open == c {
                Some((index, true))
            } else if pair.close == c {
                Some((index, false))
            } else {
                None
            }
        })
    }

    fn bracket_of(&self, c: char) -> Option<(usize, bool)> {
        self.config.brackets.iter().enumerate().find_map(|(index, pair)| {
            if pair.open == c {
                Some((index, true))
            } else if pair.close == c {
                Some((index, false))
            } else {
                None
            }
        })
    }

    fn stack_of(&self, kind: Option<usize>) -> usize {
        kind.unwrap_or(self.config.brackets.len())
    }

    fn push_marker(&mut self, name: &str) {
        self.output.push_str("(?<");
        self.output.push_str(name);
        self.output.push_str(">)");
    }

    fn open_paren(&mut self, kind: Option<usize>, offset: usize) {
        let index = self.paren_count;
        self.paren_count += 1;

        let stack = self.stack_of(kind);
        self.opens[stack].push((index, offset));
        self.push_marker(&open_paren_name(index));
    }

    fn close_paren(&mut self, kind: Option<usize>, offset: usize) -> Result<(), RegexError> {
        let stack = self.stack_of(kind);
        let Some((index, _)) = self.opens[stack].pop() else {
            return Err(self.error_at("This tilde parenthesis has no matching open", offset));
        };

        self.push_marker(&close_paren_name(index));
        self.assertions.push(Assertion::Parens {
            open: open_paren_name(index),
            close: close_paren_name(index),
            kind,
        });
        Ok(())
    }

    fn quote(&mut self, quote: usize, inside: bool) {
        let name = if inside {
            let count = &mut self.in_quote_counts[quote];
            *count += 1;
            format!("{}{}{}u{}", MARKER_PREFIX, IN_QUOTE_NAME, quote, *count - 1)
        } else {
            let count = &mut self.out_quote_counts[quote];
            *count += 1;
            format!("{}{}{}u{}", MARKER_PREFIX, OUT_QUOTE_NAME, quote, *count - 1)
        };

        self.push_marker(&name);
        self.assertions.push(Assertion::Quote {
            marker: name,
            quote: Some(quote),
            inside,
        });
    }

    fn no_quote(&mut self) {
        let name = format!("{}{}{}", MARKER_PREFIX, NO_QUOTE_NAME, self.no_quote_count);
        self.no_quote_count += 1;

        self.push_marker(&name);
        self.assertions.push(Assertion::Quote {
            marker: name,
            quote: None,
            inside: false,
        });
    }
}

fn open_paren_name(index: usize) -> String {
    format!("{}{}{}", MARKER_PREFIX, OPEN_PAREN_NAME, index)
}

fn close_paren_name(index: usize) -> String {
    format!("{}{}{}", MARKER_PREFIX, CLOSE_PAREN_NAME, index)
}

/// The assertions of a compiled enhanced pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Enhancement {
    pub config: ContextConfig,
    pub assertions: Vec<Assertion<usize>>,
}

/// Translate and compile an enhanced pattern.
pub fn compile_enhanced(
    pattern: &str,
    flags: Flags,
    config: ContextConfig,
) -> Result<(Program, Enhancement), RegexError> {
    config.validate()?;

    if flags.contains(Flags::LITERAL) {
        let program = compile(pattern, flags)?;
        let enhancement = Enhancement {
            config,
            assertions: vec![],
        };
        return Ok((program, enhancement));
    }

    let translation = translate(pattern, &config)?;
    debug!(
        "translate enhanced pattern {:?} into {:?}",
        pattern, translation.pattern
    );

    let program = compile(&translation.pattern, flags)?;
    let enhancement = Enhancement::new(config, translation.assertions, &program.registry)?;
    Ok((program, enhancement))
}

impl Enhancement {
    pub fn new(
        config: ContextConfig,
        assertions: Vec<Assertion<String>>,
        registry: &GroupRegistry,
    ) -> Result<Self, RegexError> {
        let index_of = |name: &str| {
            registry
                .index_of(name)
                .ok_or_else(|| RegexError::NoSuchGroupName(name.to_owned()))
        };

        let assertions = assertions
            .into_iter()
            .map(|assertion| match assertion {
                Assertion::Parens { open, close, kind } => Ok(Assertion::Parens {
                    open: index_of(&open)?,
                    close: index_of(&close)?,
                    kind,
                }),
                Assertion::Quote {
                    marker,
                    quote,
                    inside,
                } => Ok(Assertion::Quote {
                    marker: index_of(&marker)?,
                    quote,
                    inside,
                }),
            })
            .collect::<Result<Vec<_>, RegexError>>()?;

        Ok(Enhancement { config, assertions })
    }

    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Check the marker positions of a candidate.
    ///
    /// A marker inside of a repetition records one position per iteration,
    /// every position is checked. When the open and close markers of a
    /// pair recorded different numbers of positions, only the last
    /// ones are paired.
    pub fn validate(&self, captures: &[Vec<Range<usize>>], context: &StructuralContext) -> bool {
        let positions_of = |group: usize| -> Vec<usize> {
            captures
                .get(group)
                .map(|ranges| ranges.iter().map(|range| range.start).collect())
                .unwrap_or_default()
        };

        self.assertions.iter().all(|assertion| match assertion {
            Assertion::Parens { open, close, kind } => {
                let opens = positions_of(*open);
                let closes = positions_of(*close);

                match (opens.last(), closes.last()) {
                    (None, None) => true,
                    (Some(open), Some(close)) => {
                        if opens.len() == closes.len() {
                            opens
                                .iter()
                                .zip(closes.iter())
                                .all(|(open, close)| context.parens_match(*open, *close, *kind))
                        } else {
                            context.parens_match(*open, *close, *kind)
                        }
                    }
                    _ => false,
                }
            }
            Assertion::Quote {
                marker,
                quote,
                inside,
            } => positions_of(*marker).iter().all(|position| {
                match (quote, inside) {
                    (Some(_), true) => context.quote_matches(*position, *quote),
                    (Some(_), false) => !context.quote_matches(*position, *quote),
                    (None, false) => context.quote_matches(*position, None),
                    (None, true) => !context.quote_matches(*position, None),
                }
            }),
        })
    }
}

/// The assertions of a pattern together with the structure of one text.
#[derive(Debug, Clone)]
pub struct Validator {
    pub enhancement: Enhancement,
    pub context: StructuralContext,
}

impl Validator {
    pub fn new(enhancement: &Enhancement, text: &str) -> Self {
        Validator {
            enhancement: enhancement.clone(),
            context: StructuralContext::build(text, &enhancement.config),
        }
    }

    pub fn is_valid(&self, captures: &[Vec<Range<usize>>]) -> bool {
        self.enhancement.validate(captures, &self.context)
    }
}

impl Instance<'_> {
    /// Find the next candidate that passes the assertions, starting at `from`
    /// and within `region`.
    ///
    /// A rejected candidate is searched again from its start within a window
    /// whose end shrinks by one char, until a candidate passes or no
    /// candidate is left, then the search resumes one char after the
    /// start of the latest rejected candidate.
    ///
    /// Only the end of a candidate is limited by the window, anchors and
    /// lookaround keep seeing the region under the current bounds.
    pub fn find_validated(&mut self, program: &Program, region: Range<usize>, from: usize) -> bool {
        let saved_from = self.from;
        let saved_to = self.to;
        let saved_window_end = self.window_end;
        let old_last = self.old_last;

        self.from = region.start;
        self.window_end = Some(region.end);

        let found = self.retry(program, region, from, old_last);

        self.from = saved_from;
        self.to = saved_to;
        self.window_end = saved_window_end;
        found
    }

    fn retry(
        &mut self,
        program: &Program,
        region: Range<usize>,
        from: usize,
        old_last: Option<usize>,
    ) -> bool {
        let mut start = from;
        let mut end = region.end;
        let mut rejected: Option<usize> = None;

        loop {
            trace!("search window {}..{}", start, end);

            self.to = end;
            self.old_last = old_last;

            if start <= end && self.search(program, start) {
                let candidate = self.first..self.last;
                if self.passes_assertions() {
                    trace!("accept candidate {:?}", candidate);
                    return true;
                }

                trace!("reject candidate {:?}", candidate);
                rejected = Some(candidate.start);

                if end > candidate.start {
                    start = candidate.start;
                    end = self.previous_position(end);
                    continue;
                }
            }

            // no candidate left in the windows of the rejected candidate
            let Some(rejected_start) = rejected.take() else {
                return false;
            };

            start = self.next_position(rejected_start);
            end = region.end;
            if start > end {
                return false;
            }
        }
    }

    /// Match at exactly `from`, a path whose markers fail the assertions
    /// backtracks like any other failed path.
    pub fn match_validated(
        &mut self,
        program: &Program,
        from: usize,
        accept_mode: AcceptMode,
    ) -> bool {
        self.validate_on_accept = true;
        let found = self.match_at(program, from, accept_mode);
        self.validate_on_accept = false;
        found
    }
}
