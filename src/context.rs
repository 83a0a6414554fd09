// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::collections::HashMap;

use log::warn;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::RegexError;

/// A pair of delimiters, e.g. `(` and `)`, or `'` and `'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolPair {
    pub open: char,
    pub close: char,

    /// Whether an odd run of backslashes before the open delimiter
    /// makes it a literal char.
    #[serde(default)]
    pub open_escaped: bool,

    #[serde(default)]
    pub close_escaped: bool,
}

impl SymbolPair {
    pub fn new(open: char, close: char, open_escaped: bool, close_escaped: bool) -> Self {
        SymbolPair {
            open,
            close,
            open_escaped,
            close_escaped,
        }
    }

    pub fn is_symmetric(&self) -> bool {
        self.open == self.close
    }

    fn open_matches(&self, c: char, escaped: bool) -> bool {
        c == self.open && !(self.open_escaped && escaped)
    }

    fn close_matches(&self, c: char, escaped: bool) -> bool {
        c == self.close && !(self.close_escaped && escaped)
    }
}

/// The brackets and quotes the enhanced assertions refer to.
///
/// The order of the pairs matters, the first pair that matches
/// a char wins, and quotes are tested before brackets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default)]
    pub brackets: Vec<SymbolPair>,

    #[serde(default)]
    pub quotes: Vec<SymbolPair>,
}

impl ContextConfig {
    pub fn new(brackets: Vec<SymbolPair>, quotes: Vec<SymbolPair>) -> Self {
        ContextConfig { brackets, quotes }
    }

    /// Brackets `()`, `[]`, `<>` and `{}`, and the quote `'` whose
    /// close delimiter can be escaped.
    pub fn standard() -> Self {
        ContextConfig {
            brackets: vec![
                SymbolPair::new('(', ')', false, false),
                SymbolPair::new('[', ']', false, false),
                SymbolPair::new('<', '>', false, false),
                SymbolPair::new('{', '}', false, false),
            ],
            quotes: vec![SymbolPair::new('\'', '\'', false, true)],
        }
    }

    /// The configuration of the Eredmel language, brackets `()` only.
    pub fn eredmel() -> Self {
        ContextConfig {
            brackets: vec![SymbolPair::new('(', ')', false, false)],
            quotes: vec![SymbolPair::new('\'', '\'', false, true)],
        }
    }

    /// Load a configuration from TOML text, e.g.
    ///
    /// ```toml
    /// brackets = [ { open = "(", close = ")" } ]
    /// quotes = [ { open = "'", close = "'", close_escaped = true } ]
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, RegexError> {
        let config: ContextConfig =
            toml::from_str(s).map_err(|e| RegexError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, RegexError> {
        toml::to_string(self).map_err(|e| RegexError::Config(e.to_string()))
    }

    /// Check that no char is used by two pairs, and that no bracket
    /// opens and closes with the same char.
    pub fn validate(&self) -> Result<(), RegexError> {
        let mut owners: HashMap<char, String> = HashMap::new();

        let pairs = self
            .brackets
            .iter()
            .map(|pair| ("bracket", pair))
            .chain(self.quotes.iter().map(|pair| ("quote", pair)));

        for (role, pair) in pairs {
            if pair.open == '\\' || pair.close == '\\' {
                return Err(RegexError::Config(format!(
                    "the backslash can not be a delimiter of the {} {}{}",
                    role, pair.open, pair.close
                )));
            }

            if role == "bracket" && pair.is_symmetric() {
                return Err(RegexError::Config(format!(
                    "the bracket {}{} opens and closes with the same char",
                    pair.open, pair.close
                )));
            }

            let owner = format!("{} {}{}", role, pair.open, pair.close);
            let chars: &[char] = if pair.is_symmetric() {
                &[pair.open]
            } else {
                &[pair.open, pair.close]
            };

            for c in chars {
                if let Some(previous) = owners.insert(*c, owner.clone()) {
                    return Err(RegexError::Config(format!(
                        "the char '{}' is used by both the {} and the {}",
                        c, previous, owner
                    )));
                }
            }
        }

        Ok(())
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig::standard()
    }
}

/// The structural state before a position of the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextState {
    /// The nesting depth of each bracket pair.
    pub depths: SmallVec<[i32; 4]>,

    /// The index of the quote pair the position is inside of.
    pub quote: Option<usize>,

    backslashes: usize,
}

impl ContextState {
    fn start_of_text(config: &ContextConfig) -> Self {
        ContextState {
            depths: SmallVec::from_elem(0, config.brackets.len()),
            quote: None,
            backslashes: 0,
        }
    }

    fn next(&self, c: char, config: &ContextConfig) -> Self {
        let mut state = self.clone();

        if c == '\\' {
            state.backslashes += 1;
            return state;
        }

        let escaped = self.backslashes % 2 == 1;
        state.backslashes = 0;

        if let Some(quote) = self.quote {
            // only the close delimiter is significant inside of a quote
            if config.quotes[quote].close_matches(c, escaped) {
                state.quote = None;
            }
            return state;
        }

        if let Some(quote) = config
            .quotes
            .iter()
            .position(|pair| pair.open_matches(c, escaped))
        {
            state.quote = Some(quote);
            return state;
        }

        for (index, pair) in config.brackets.iter().enumerate() {
            if pair.open_matches(c, escaped) {
                state.depths[index] += 1;
                break;
            }
            if pair.close_matches(c, escaped) {
                state.depths[index] -= 1;
                break;
            }
        }

        state
    }

    fn depths_equal(&self, other: &ContextState, kind: Option<usize>) -> bool {
        match kind {
            Some(index) => self.depths.get(index) == other.depths.get(index),
            None => self.depths == other.depths,
        }
    }

    fn depths_not_less(&self, other: &ContextState, kind: Option<usize>) -> bool {
        match kind {
            Some(index) => self.depths.get(index) >= other.depths.get(index),
            None => self
                .depths
                .iter()
                .zip(other.depths.iter())
                .all(|(a, b)| a >= b),
        }
    }
}

/// The bracket depths and the quote of every position of a text.
///
/// Positions are byte offsets, the state of a position is the state
/// after all the chars before it, so there are `text.len() + 1` states.
#[derive(Debug, Clone)]
pub struct StructuralContext {
    states: Vec<ContextState>,
}

impl StructuralContext {
    pub fn build(text: &str, config: &ContextConfig) -> Self {
        let mut states = Vec::with_capacity(text.len() + 1);
        let mut state = ContextState::start_of_text(config);
        states.push(state.clone());

        for c in text.chars() {
            let next = state.next(c, config);

            // the positions inside of a multibyte char share the
            // state before the char.
            for _ in 1..c.len_utf8() {
                states.push(state.clone());
            }
            states.push(next.clone());
            state = next;
        }

        if state.depths.iter().any(|depth| *depth != 0) {
            warn!("unbalanced brackets at the end of text, depths: {:?}", state.depths);
        }

        if let Some(quote) = state.quote {
            warn!(
                "unterminated quote {}{} at the end of text",
                config.quotes[quote].open, config.quotes[quote].close
            );
        }

        StructuralContext { states }
    }

    /// The number of positions.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state_at(&self, position: usize) -> Option<&ContextState> {
        self.states.get(position)
    }

    /// Whether the brackets between `open` and `close` are balanced.
    ///
    /// The depths at the two positions must be equal and no position
    /// between them may close a bracket opened before `open`.
    /// `kind` selects one bracket pair, `None` checks all of them.
    pub fn parens_match(&self, open: usize, close: usize, kind: Option<usize>) -> bool {
        let (Some(open_state), Some(close_state)) = (self.state_at(open), self.state_at(close))
        else {
            return false;
        };

        if !open_state.depths_equal(close_state, kind) {
            return false;
        }

        ((open + 1)..close).all(|position| self.states[position].depths_not_less(open_state, kind))
    }

    /// Whether the position is inside of the quote, `None` stands
    /// for outside of any quote.
    pub fn quote_matches(&self, position: usize, quote: Option<usize>) -> bool {
        self.state_at(position)
            .map(|state| state.quote == quote)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::error::RegexError;

    use super::{ContextConfig, StructuralContext, SymbolPair};

    #[test]
    fn test_build_brackets() {
        let context = StructuralContext::build("(a[b])c", &ContextConfig::standard());
        assert_eq!(context.len(), 8);

        let depths: Vec<[i32; 2]> = (0..context.len())
            .map(|position| {
                let state = context.state_at(position).unwrap();
                [state.depths[0], state.depths[1]]
            })
            .collect();

        assert_eq!(
            depths,
            vec![
                [0, 0],
                [1, 0],
                [1, 0],
                [1, 1],
                [1, 1],
                [1, 0],
                [0, 0],
                [0, 0]
            ]
        );
    }

    #[test]
    fn test_build_quotes() {
        let config = ContextConfig::eredmel();

        // a quote hides the brackets
        {
            let context = StructuralContext::build("'(')", &config);
            assert_eq!(context.state_at(2).unwrap().quote, Some(0));
            assert_eq!(context.state_at(2).unwrap().depths[0], 0);
            assert_eq!(context.state_at(4).unwrap().depths[0], -1);
        }

        // escaped close quote
        {
            let context = StructuralContext::build("'a\\'b'=", &config);
            assert_eq!(context.state_at(4).unwrap().quote, Some(0));
            assert_eq!(context.state_at(5).unwrap().quote, Some(0));
            assert_eq!(context.state_at(6).unwrap().quote, None);
        }

        // two backslashes escape each other
        {
            let context = StructuralContext::build("'a\\\\'b", &config);
            assert_eq!(context.state_at(5).unwrap().quote, None);
        }

        // the open quote can not be escaped
        {
            let context = StructuralContext::build("\\'a'", &config);
            assert_eq!(context.state_at(2).unwrap().quote, Some(0));
            assert_eq!(context.state_at(4).unwrap().quote, None);
        }

        // multibyte chars
        {
            let context = StructuralContext::build("'文'", &config);
            assert_eq!(context.len(), 6);
            assert_eq!(context.state_at(1).unwrap().quote, Some(0));
            assert_eq!(context.state_at(3).unwrap().quote, Some(0));
            assert_eq!(context.state_at(5).unwrap().quote, None);
        }
    }

    #[test]
    fn test_build_escaped_brackets() {
        let config = ContextConfig::new(vec![SymbolPair::new('(', ')', true, true)], vec![]);
        let context = StructuralContext::build("(\\))", &config);
        assert_eq!(context.state_at(3).unwrap().depths[0], 1);
        assert_eq!(context.state_at(4).unwrap().depths[0], 0);
    }

    #[test]
    fn test_parens_match() {
        let config = ContextConfig::standard();

        {
            let context = StructuralContext::build("(a(b)c)", &config);
            assert!(context.parens_match(1, 6, None));
            assert!(context.parens_match(0, 7, None));
            assert!(!context.parens_match(1, 4, None));
        }

        // the depth drops below the open position in between
        {
            let context = StructuralContext::build("(a)(b)", &config);
            assert!(!context.parens_match(1, 5, None));
            assert!(context.parens_match(1, 2, None));
        }

        // one kind only
        {
            let context = StructuralContext::build("(a[b)", &config);
            assert!(context.parens_match(1, 4, Some(0)));
            assert!(!context.parens_match(1, 4, None));
            assert!(!context.parens_match(1, 4, Some(1)));
        }

        // out of text
        {
            let context = StructuralContext::build("()", &config);
            assert!(!context.parens_match(0, 9, None));
        }
    }

    #[test]
    fn test_quote_matches() {
        let context = StructuralContext::build("x'[=]'=", &ContextConfig::standard());
        assert!(context.quote_matches(3, Some(0)));
        assert!(!context.quote_matches(3, None));
        assert!(context.quote_matches(6, None));
        assert!(!context.quote_matches(9, None));
    }

    #[test]
    fn test_config_from_toml() {
        {
            let config = ContextConfig::from_toml_str(
                r#"
                brackets = [ { open = "(", close = ")" }, { open = "[", close = "]" } ]
                quotes = [ { open = "\"", close = "\"", close_escaped = true } ]
                "#,
            )
            .unwrap();

            assert_eq!(
                config,
                ContextConfig::new(
                    vec![
                        SymbolPair::new('(', ')', false, false),
                        SymbolPair::new('[', ']', false, false)
                    ],
                    vec![SymbolPair::new('"', '"', false, true)]
                )
            );
        }

        // round trip of the preset
        {
            let text = ContextConfig::standard().to_toml_string().unwrap();
            assert_eq!(
                ContextConfig::from_toml_str(&text).unwrap(),
                ContextConfig::standard()
            );
        }

        // not a char
        assert!(matches!(
            ContextConfig::from_toml_str(r#"brackets = [ { open = "((", close = ")" } ]"#),
            Err(RegexError::Config(_))
        ));
    }

    #[test]
    fn test_config_validate() {
        assert_eq!(ContextConfig::standard().validate(), Ok(()));
        assert_eq!(ContextConfig::eredmel().validate(), Ok(()));

        // shared char
        assert!(matches!(
            ContextConfig::new(
                vec![SymbolPair::new('(', ')', false, false)],
                vec![SymbolPair::new('(', '(', false, false)]
            )
            .validate(),
            Err(RegexError::Config(_))
        ));

        // symmetric bracket
        assert!(matches!(
            ContextConfig::new(vec![SymbolPair::new('|', '|', false, false)], vec![]).validate(),
            Err(RegexError::Config(_))
        ));

        // backslash
        assert!(matches!(
            ContextConfig::new(vec![], vec![SymbolPair::new('\\', '/', false, false)]).validate(),
            Err(RegexError::Config(_))
        ));
    }
}
