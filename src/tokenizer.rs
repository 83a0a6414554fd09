// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use unicode_normalization::{
    char::{canonical_combining_class, compose},
    UnicodeNormalization,
};
use unicode_properties::{GeneralCategory, UnicodeGeneralCategory};

use crate::{error::RegexError, flags::Flags};

/// A cursor over the code points of a pattern.
///
/// The pattern is preprocessed once when the tokenizer is created:
/// - with `CANON_EQ` the pattern is decomposed (NFD) and every base
///   character followed by non-spacing marks is rewritten into an
///   alternation of its canonical equivalents.
/// - `\Q...\E` quoted sections are rewritten into escaped literals.
///
/// When `COMMENTS` is set (the flag may be switched on and off by the
/// compiler while parsing), `peek_char` and `next_char` skip whitespace
/// and `#` comments.
pub struct Tokenizer {
    chars: Vec<char>,
    cursor: usize,
    pub flags: Flags,
}

impl Tokenizer {
    pub fn new(pattern: &str, flags: Flags) -> Result<Self, RegexError> {
        let mut chars: Vec<char> = if flags.contains(Flags::CANON_EQ) && !flags.contains(Flags::LITERAL)
        {
            normalize_canonical(pattern)
                .map_err(|(message, offset)| RegexError::syntax(message, pattern, offset))?
        } else {
            pattern.chars().collect()
        };

        if !flags.contains(Flags::LITERAL) {
            chars = remove_qe_quoting(chars);
        }

        Ok(Self {
            chars,
            cursor: 0,
            flags,
        })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// The preprocessed pattern text, used in error messages.
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    /// Create a syntax error pointing at the last consumed character.
    pub fn error(&self, message: &str) -> RegexError {
        RegexError::syntax(message, &self.text(), self.cursor.saturating_sub(1))
    }

    /// Peek the current character without consuming it.
    ///
    /// In comments mode the cursor is moved past whitespace and comments first.
    pub fn peek_char(&mut self) -> Option<char> {
        if self.flags.contains(Flags::COMMENTS) {
            self.skip_whitespace_and_comments();
        }
        self.chars.get(self.cursor).copied()
    }

    /// Peek a character relative to the cursor, ignoring the comments mode.
    pub fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.cursor + offset).copied()
    }

    /// Consume and return the current character.
    pub fn next_char(&mut self) -> Option<char> {
        let c = self.peek_char();
        if c.is_some() {
            self.cursor += 1;
        }
        c
    }

    /// Consume and return the current character, ignoring the comments mode.
    pub fn next_char_raw(&mut self) -> Option<char> {
        let c = self.chars.get(self.cursor).copied();
        if c.is_some() {
            self.cursor += 1;
        }
        c
    }

    /// Move forward one character and peek the following one.
    pub fn advance_and_peek(&mut self) -> Option<char> {
        self.cursor += 1;
        self.peek_char()
    }

    /// Move forward one character and peek the following one,
    /// ignoring the comments mode.
    pub fn advance_and_peek_raw(&mut self) -> Option<char> {
        self.cursor += 1;
        self.chars.get(self.cursor).copied()
    }

    /// Consume the current character and the following one,
    /// return the following one. Used after a backslash or `(?`.
    pub fn skip(&mut self) -> Option<char> {
        let c = self.chars.get(self.cursor + 1).copied();
        self.cursor = (self.cursor + 2).min(self.chars.len());
        c
    }

    pub fn unread(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Consume the expected character or fail with the given message.
    pub fn expect_char(&mut self, expected: char, message: &str) -> Result<(), RegexError> {
        match self.next_char() {
            Some(c) if c == expected => Ok(()),
            _ => Err(self.error(message)),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.get(self.cursor) {
                Some(c) if is_ascii_space(*c) => {
                    self.cursor += 1;
                }
                Some('#') => {
                    self.cursor += 1;
                    while let Some(c) = self.chars.get(self.cursor) {
                        if self.is_line_separator(*c) {
                            break;
                        }
                        self.cursor += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn is_line_separator(&self, c: char) -> bool {
        if self.flags.contains(Flags::UNIX_LINES) {
            c == '\n'
        } else {
            matches!(c, '\n' | '\r' | '\u{0085}' | '\u{2028}' | '\u{2029}')
        }
    }

    /// `\cX`
    pub fn read_control(&mut self) -> Result<char, RegexError> {
        match self.next_char() {
            Some(c) => char::from_u32(c as u32 ^ 64)
                .ok_or_else(|| self.error("Illegal control escape sequence")),
            None => Err(self.error("Illegal control escape sequence")),
        }
    }

    /// `\0n`, `\0nn` and `\0mnn` (m <= 3)
    pub fn read_octal(&mut self) -> Result<char, RegexError> {
        let n = match self.next_char().and_then(octal_digit) {
            Some(n) => n,
            None => return Err(self.error("Illegal octal escape sequence")),
        };

        let value = match self.peek_char().and_then(octal_digit) {
            Some(m) => {
                self.cursor += 1;
                match self.peek_char().and_then(octal_digit) {
                    Some(o) if n <= 3 => {
                        self.cursor += 1;
                        n * 64 + m * 8 + o
                    }
                    _ => n * 8 + m,
                }
            }
            None => n,
        };

        char::from_u32(value).ok_or_else(|| self.error("Illegal octal escape sequence"))
    }

    /// `\xhh` and `\x{h...h}`
    pub fn read_hex(&mut self) -> Result<char, RegexError> {
        match self.next_char() {
            Some(n) if n.is_ascii_hexdigit() => match self.next_char() {
                Some(m) if m.is_ascii_hexdigit() => {
                    let value = hex_value(n) * 16 + hex_value(m);
                    char::from_u32(value)
                        .ok_or_else(|| self.error("Illegal hexadecimal escape sequence"))
                }
                _ => Err(self.error("Illegal hexadecimal escape sequence")),
            },
            Some('{') if matches!(self.peek_char(), Some(c) if c.is_ascii_hexdigit()) => {
                let mut value: u32 = 0;
                loop {
                    match self.next_char() {
                        Some(c) if c.is_ascii_hexdigit() => {
                            value = (value << 4) + hex_value(c);
                            if value > char::MAX as u32 {
                                return Err(self.error("Hexadecimal codepoint is too big"));
                            }
                        }
                        Some('}') => break,
                        _ => return Err(self.error("Unclosed hexadecimal escape sequence")),
                    }
                }
                char::from_u32(value)
                    .ok_or_else(|| self.error("Illegal hexadecimal escape sequence"))
            }
            _ => Err(self.error("Illegal hexadecimal escape sequence")),
        }
    }

    /// `\uhhhh`, a surrogate pair `\uhhhh\uhhhh` is combined into one character.
    pub fn read_unicode(&mut self) -> Result<char, RegexError> {
        let high = self.read_four_hex_digits()?;

        if (0xD800..0xDC00).contains(&high) {
            let saved = self.cursor;
            if self.next_char() == Some('\\') && self.next_char() == Some('u') {
                let low = self.read_four_hex_digits()?;
                if (0xDC00..0xE000).contains(&low) {
                    let value = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(value)
                        .ok_or_else(|| self.error("Illegal Unicode escape sequence"));
                }
            }
            self.cursor = saved;
        }

        char::from_u32(high).ok_or_else(|| self.error("Illegal Unicode escape sequence"))
    }

    fn read_four_hex_digits(&mut self) -> Result<u32, RegexError> {
        let mut value = 0;
        for _ in 0..4 {
            match self.next_char() {
                Some(c) if c.is_ascii_hexdigit() => value = value * 16 + hex_value(c),
                _ => return Err(self.error("Illegal Unicode escape sequence")),
            }
        }
        Ok(value)
    }
}

pub fn is_ascii_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r')
}

fn octal_digit(c: char) -> Option<u32> {
    c.to_digit(8)
}

fn hex_value(c: char) -> u32 {
    c.to_digit(16).unwrap_or(0)
}

/// Rewrite `\Q...\E` sections into escaped literals.
///
/// A digit at the beginning of a quoted section is written as `\x3N`
/// so that it can not be read as a part of a preceding escape.
/// An unterminated `\Q` quotes to the end of the pattern.
fn remove_qe_quoting(chars: Vec<char>) -> Vec<char> {
    let length = chars.len();

    let mut i = 0;
    while i + 1 < length {
        if chars[i] != '\\' {
            i += 1;
        } else if chars[i + 1] != 'Q' {
            i += 2;
        } else {
            break;
        }
    }

    if i + 1 >= length {
        // no `\Q` found
        return chars;
    }

    let mut output: Vec<char> = Vec::with_capacity(length * 2);
    output.extend_from_slice(&chars[..i]);
    i += 2;

    let mut in_quote = true;
    let mut begin_quote = true;

    while i < length {
        let c = chars[i];
        i += 1;

        if !c.is_ascii() || c.is_ascii_alphabetic() {
            output.push(c);
        } else if c.is_ascii_digit() {
            if begin_quote {
                output.extend_from_slice(&['\\', 'x', '3']);
            }
            output.push(c);
        } else if c != '\\' {
            if in_quote {
                output.push('\\');
            }
            output.push(c);
        } else if in_quote {
            if chars.get(i) == Some(&'E') {
                i += 1;
                in_quote = false;
            } else {
                output.push('\\');
                output.push('\\');
            }
        } else if chars.get(i) == Some(&'Q') {
            i += 1;
            in_quote = true;
            begin_quote = true;
            continue;
        } else {
            output.push(c);
            if i < length {
                output.push(chars[i]);
                i += 1;
            }
        }

        begin_quote = false;
    }

    output
}

fn is_nonspacing_mark(c: char) -> bool {
    c.general_category() == GeneralCategory::NonspacingMark
}

/// Decompose the pattern and replace every base character with trailing
/// non-spacing marks by an alternation of its canonical equivalents.
///
/// Returns the message and the offset on error.
fn normalize_canonical(pattern: &str) -> Result<Vec<char>, (&'static str, usize)> {
    let decomposed: Vec<char> = pattern.nfd().collect();
    let length = decomposed.len();

    let mut output: Vec<char> = Vec::with_capacity(length);
    let mut last: Option<char> = None;
    let mut i = 0;

    while i < length {
        let c = decomposed[i];

        if is_nonspacing_mark(c) && last.is_some() {
            let mut sequence: Vec<char> = vec![];
            sequence.extend(last);
            while i < length && is_nonspacing_mark(decomposed[i]) {
                sequence.push(decomposed[i]);
                i += 1;
            }
            output.pop();
            output.extend("(?:".chars());
            output.extend(equivalent_alternation(&sequence).chars());
            output.push(')');
            last = None;
            continue;
        }

        if c == '[' && last != Some('\\') {
            i = normalize_char_class(&decomposed, &mut output, i)?;
            last = Some(']');
            continue;
        }

        output.push(c);
        last = Some(c);
        i += 1;
    }

    Ok(output)
}

// the `i` points to the opening '[', returns the index after the closing ']'.
fn normalize_char_class(
    chars: &[char],
    output: &mut Vec<char>,
    mut i: usize,
) -> Result<usize, (&'static str, usize)> {
    let mut class: Vec<char> = vec!['['];
    let mut alternations: Vec<String> = vec![];
    let mut last: Option<char> = None;
    i += 1;

    loop {
        let c = match chars.get(i) {
            Some(c) => *c,
            None => return Err(("Unclosed character class", i.saturating_sub(1))),
        };

        if c == ']' && last != Some('\\') && class.len() > 1 {
            class.push(']');
            i += 1;
            break;
        }

        if is_nonspacing_mark(c) && last.is_some() {
            let mut sequence: Vec<char> = vec![];
            sequence.extend(last);
            while i < chars.len() && is_nonspacing_mark(chars[i]) {
                sequence.push(chars[i]);
                i += 1;
            }
            class.pop();
            alternations.push(equivalent_alternation(&sequence));
            last = None;
            continue;
        }

        class.push(c);
        last = Some(c);
        i += 1;
    }

    if alternations.is_empty() {
        output.extend(class);
    } else {
        output.extend("(?:".chars());
        output.extend(class);
        for alternation in alternations {
            output.push('|');
            output.extend(alternation.chars());
        }
        output.push(')');
    }

    Ok(i)
}

/// Given a base character followed by combining marks, produce the
/// alternation that matches all canonical equivalents of the sequence.
fn equivalent_alternation(source: &[char]) -> String {
    if source.len() == 1 {
        return source.iter().collect();
    }

    let base = source[0];
    let marks = &source[1..];
    let mut result: String = source.iter().collect();

    for (index, permutation) in mark_permutations(marks).iter().enumerate() {
        let mut next = vec![base];
        next.extend_from_slice(permutation);

        if index > 0 {
            result.push('|');
            result.extend(next.iter());
        }

        if let Some(composed) = compose_one_step(&next) {
            result.push('|');
            result.push_str(&equivalent_alternation(&composed));
        }
    }

    result
}

/// All orderings of the marks that are canonically equivalent,
/// i.e. marks with the same combining class keep their relative order.
fn mark_permutations(marks: &[char]) -> Vec<Vec<char>> {
    if marks.len() <= 1 {
        return vec![marks.to_vec()];
    }

    let mut result = vec![];
    for x in 0..marks.len() {
        let class = canonical_combining_class(marks[x]);
        if marks[..x]
            .iter()
            .any(|c| canonical_combining_class(*c) == class)
        {
            continue;
        }

        let mut others = marks.to_vec();
        let prefix = others.remove(x);
        for sub in mark_permutations(&others) {
            let mut permutation = vec![prefix];
            permutation.extend(sub);
            result.push(permutation);
        }
    }
    result
}

/// Compose the base character with the first mark following it.
fn compose_one_step(sequence: &[char]) -> Option<Vec<char>> {
    if sequence.len() < 2 {
        return None;
    }

    compose(sequence[0], sequence[1]).map(|composed| {
        let mut result = vec![composed];
        result.extend_from_slice(&sequence[2..]);
        result
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::flags::Flags;

    use super::Tokenizer;

    fn text_of(pattern: &str, flags: Flags) -> String {
        Tokenizer::new(pattern, flags).unwrap().text()
    }

    #[test]
    fn test_remove_qe_quoting() {
        assert_eq!(text_of(r"a\Q.*\Eb", Flags::empty()), r"a\.\*b");

        // unterminated
        assert_eq!(text_of(r"\Q(a)", Flags::empty()), r"\(a\)");

        // leading digit
        assert_eq!(text_of(r"\1\Q2\E", Flags::empty()), r"\1\x32");

        // backslash inside
        assert_eq!(text_of(r"\Qa\b\E", Flags::empty()), r"a\\b");

        // escapes outside of the quote are kept
        assert_eq!(text_of(r"\d\Q+\E\w", Flags::empty()), r"\d\+\w");

        // no quote
        assert_eq!(text_of(r"a\\Qb", Flags::empty()), r"a\\Qb");

        // literal mode keeps everything
        assert_eq!(text_of(r"\Qa\E", Flags::LITERAL), r"\Qa\E");
    }

    #[test]
    fn test_comments_mode() {
        let mut tokenizer = Tokenizer::new("a b # comment\n c", Flags::COMMENTS).unwrap();
        assert_eq!(tokenizer.next_char(), Some('a'));
        assert_eq!(tokenizer.next_char(), Some('b'));
        assert_eq!(tokenizer.peek_char(), Some('c'));
        assert_eq!(tokenizer.next_char(), Some('c'));
        assert_eq!(tokenizer.next_char(), None);
        assert_eq!(tokenizer.cursor(), tokenizer.chars().len());
    }

    #[test]
    fn test_escape_readers() {
        {
            let mut tokenizer = Tokenizer::new("101x", Flags::empty()).unwrap();
            assert_eq!(tokenizer.read_octal().unwrap(), 'A');
            assert_eq!(tokenizer.next_char(), Some('x'));
        }

        {
            // the third digit is only taken when the first one is <= 3
            let mut tokenizer = Tokenizer::new("477", Flags::empty()).unwrap();
            assert_eq!(tokenizer.read_octal().unwrap(), '\u{27}');
            assert_eq!(tokenizer.next_char(), Some('7'));
        }

        {
            let mut tokenizer = Tokenizer::new("41{1F600}", Flags::empty()).unwrap();
            assert_eq!(tokenizer.read_hex().unwrap(), 'A');
            tokenizer.set_cursor(2);
            tokenizer.unread();
            tokenizer.unread();
            assert_eq!(tokenizer.cursor(), 0);
        }

        {
            let mut tokenizer = Tokenizer::new("{1F600}", Flags::empty()).unwrap();
            assert_eq!(tokenizer.read_hex().unwrap(), '😀');
        }

        {
            let mut tokenizer = Tokenizer::new(r"D83D\uDE00", Flags::empty()).unwrap();
            assert_eq!(tokenizer.read_unicode().unwrap(), '😀');
        }

        {
            let mut tokenizer = Tokenizer::new("0041", Flags::empty()).unwrap();
            assert_eq!(tokenizer.read_unicode().unwrap(), 'A');
        }

        {
            // a lone surrogate is not a character
            let mut tokenizer = Tokenizer::new("D800", Flags::empty()).unwrap();
            assert!(tokenizer.read_unicode().is_err());
        }

        {
            let mut tokenizer = Tokenizer::new("J", Flags::empty()).unwrap();
            assert_eq!(tokenizer.read_control().unwrap(), '\n');
        }
    }

    #[test]
    fn test_canonical_equivalence() {
        // "e" + COMBINING ACUTE ACCENT
        assert_eq!(
            text_of("e\u{301}", Flags::CANON_EQ),
            "(?:e\u{301}|\u{e9})"
        );

        // the precomposed form is decomposed first
        assert_eq!(text_of("\u{e9}", Flags::CANON_EQ), "(?:e\u{301}|\u{e9})");

        // characters without marks are kept
        assert_eq!(text_of("abc", Flags::CANON_EQ), "abc");

        // inside a class
        assert_eq!(
            text_of("[a\u{e9}]", Flags::CANON_EQ),
            "(?:[a]|e\u{301}|\u{e9})"
        );

        assert!(Tokenizer::new("[a", Flags::CANON_EQ).is_err());
    }
}
