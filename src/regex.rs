// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::{
    fmt::Display,
    ops::{Index, Range},
};

use memchr::memmem;

use crate::{
    compiler::compile,
    context::ContextConfig,
    enhanced::{compile_enhanced, Enhancement, Validator},
    error::RegexError,
    flags::Flags,
    instance::{AcceptMode, Instance, Observer},
    node::Program,
    replacement::{quote_replacement, Replacement},
};

#[derive(Debug)]
pub struct Regex {
    pattern: String,
    flags: Flags,
    program: Program,
    enhancement: Option<Enhancement>,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Self, RegexError> {
        Regex::with_flags(pattern, Flags::empty())
    }

    /// Compile with flags, `Flags::ENHANCED_REGEX` enables the `~` assertions
    /// with the standard brackets and quotes.
    pub fn with_flags(pattern: &str, flags: Flags) -> Result<Self, RegexError> {
        if flags.contains(Flags::ENHANCED_REGEX) {
            return Regex::with_config(pattern, flags, ContextConfig::standard());
        }

        let program = compile(pattern, flags)?;
        Ok(Regex {
            pattern: pattern.to_owned(),
            flags,
            program,
            enhancement: None,
        })
    }

    /// Compile a pattern with the `~` assertions.
    pub fn with_config(
        pattern: &str,
        flags: Flags,
        config: ContextConfig,
    ) -> Result<Self, RegexError> {
        let flags = flags | Flags::ENHANCED_REGEX;
        let (program, enhancement) = compile_enhanced(pattern, flags, config)?;
        Ok(Regex {
            pattern: pattern.to_owned(),
            flags,
            program,
            enhancement: Some(enhancement),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn enhancement(&self) -> Option<&Enhancement> {
        self.enhancement.as_ref()
    }

    /// The number of capturing groups, excluding the whole match.
    pub fn group_count(&self) -> usize {
        self.program.registry.group_count() - 1
    }

    pub fn matcher<'a, 't>(&'a self, text: &'t str) -> Matcher<'a, 't> {
        Matcher::new(self, text)
    }

    // the following methods are intended to
    // be compatible with the 'Regex' API of crate 'regex':
    // https://docs.rs/regex/latest/regex/struct.Regex.html

    pub fn find<'a, 't>(&'a self, text: &'t str) -> Option<Match<'a, 't>> {
        let mut matcher = self.matcher(text);
        if matcher.find() {
            matcher.current_match()
        } else {
            None
        }
    }

    pub fn find_iter<'a, 't>(&'a self, text: &'t str) -> Matches<'a, 't> {
        Matches {
            matcher: self.matcher(text),
        }
    }

    pub fn captures<'a, 't>(&'a self, text: &'t str) -> Option<Captures<'a, 't>> {
        let mut matcher = self.matcher(text);
        if matcher.find() {
            matcher.result.to_captures()
        } else {
            None
        }
    }

    pub fn captures_iter<'a, 't>(&'a self, text: &'t str) -> CaptureMatches<'a, 't> {
        CaptureMatches {
            matcher: self.matcher(text),
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.matcher(text).find()
    }

    /// Replace the first match with the expansion of the template.
    pub fn replace_first(&self, text: &str, replacement: &str) -> Result<String, RegexError> {
        let replacement = Replacement::parse(replacement, &self.program.registry)?;
        let mut matcher = self.matcher(text);
        let mut output = String::with_capacity(text.len());

        if matcher.find() {
            matcher.append_expansion(&mut output, &replacement)?;
        }
        matcher.append_tail(&mut output);
        Ok(output)
    }

    pub fn replace_all(&self, text: &str, replacement: &str) -> Result<String, RegexError> {
        let replacement = Replacement::parse(replacement, &self.program.registry)?;
        let mut matcher = self.matcher(text);
        let mut output = String::with_capacity(text.len());

        while matcher.find() {
            matcher.append_expansion(&mut output, &replacement)?;
        }
        matcher.append_tail(&mut output);
        Ok(output)
    }

    /// All the matches of the text.
    pub fn process<'a, 't>(&'a self, text: &'t str) -> Vec<Captures<'a, 't>> {
        self.captures_iter(text).collect()
    }

    /// Replace every match with the text the rewriter returns.
    pub fn process_with<F>(&self, text: &str, mut rewriter: F) -> String
    where
        F: FnMut(&Captures) -> String,
    {
        let mut output = String::with_capacity(text.len());
        let mut position = 0;

        for captures in self.captures_iter(text) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            output.push_str(&text[position..whole.start]);
            output.push_str(&rewriter(&captures));
            position = whole.end;
        }

        output.push_str(&text[position..]);
        output
    }

    /// A pattern that matches the text literally.
    pub fn quote(s: &str) -> String {
        if memmem::find(s.as_bytes(), b"\\E").is_none() {
            return format!("\\Q{}\\E", s);
        }

        let mut quoted = String::with_capacity(s.len() * 2);
        quoted.push_str("\\Q");
        let mut rest = s;
        while let Some(index) = memmem::find(rest.as_bytes(), b"\\E") {
            quoted.push_str(&rest[..index]);
            quoted.push_str("\\E\\\\E\\Q");
            rest = &rest[index + 2..];
        }
        quoted.push_str(rest);
        quoted.push_str("\\E");
        quoted
    }

    /// A replacement template that produces the text literally.
    pub fn quote_replacement(s: &str) -> String {
        quote_replacement(s)
    }
}

impl Display for Regex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.pattern)
    }
}

/// The matching state of a regex over a text.
pub struct Matcher<'a, 't> {
    regex: &'a Regex,
    instance: Instance<'t>,

    region: Range<usize>,

    // the end of the latest match, the next `find` continues here.
    last: usize,

    append_position: usize,
    result: MatchResult<'a, 't>,
}

impl<'a, 't> Matcher<'a, 't> {
    fn new(regex: &'a Regex, text: &'t str) -> Self {
        Matcher {
            regex,
            instance: Instance::new(text, &regex.program),
            region: 0..text.len(),
            last: 0,
            append_position: 0,
            result: MatchResult::new(regex, text),
        }
    }

    pub fn text(&self) -> &'t str {
        self.instance.text
    }

    /// Reset the state and the region.
    pub fn reset(&mut self) -> &mut Self {
        self.region = 0..self.instance.text_length();
        self.instance.old_last = None;
        self.instance.clear_state();
        self.last = 0;
        self.append_position = 0;
        self.result.clear();
        self
    }

    /// Limit the matching to the text between `start` and `end`.
    pub fn region(&mut self, start: usize, end: usize) -> Result<&mut Self, RegexError> {
        let text = self.instance.text;
        if start > end
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            return Err(RegexError::IllegalState(format!(
                "Illegal region {}..{}",
                start, end
            )));
        }

        self.reset();
        self.region = start..end;
        self.last = start;
        Ok(self)
    }

    pub fn region_start(&self) -> usize {
        self.region.start
    }

    pub fn region_end(&self) -> usize {
        self.region.end
    }

    /// With transparent bounds, lookaround and boundaries see the text
    /// outside of the region.
    pub fn use_transparent_bounds(&mut self, transparent: bool) -> &mut Self {
        self.instance.transparent_bounds = transparent;
        self
    }

    pub fn has_transparent_bounds(&self) -> bool {
        self.instance.transparent_bounds
    }

    /// With anchoring bounds, `^` and `$` match at the bounds of the region.
    pub fn use_anchoring_bounds(&mut self, anchoring: bool) -> &mut Self {
        self.instance.anchoring_bounds = anchoring;
        self
    }

    pub fn has_anchoring_bounds(&self) -> bool {
        self.instance.anchoring_bounds
    }

    pub fn set_observer(&mut self, observer: Observer<'t>) {
        self.instance.set_observer(Some(observer));
    }

    pub fn clear_observer(&mut self) {
        self.instance.set_observer(None);
    }

    /// Whether the end of the text was hit by the latest attempt.
    pub fn hit_end(&self) -> bool {
        self.instance.hit_end
    }

    /// Whether more input could turn the latest match into a mismatch.
    pub fn require_end(&self) -> bool {
        self.instance.require_end
    }

    /// Find the next match, after the end of the previous match or
    /// one char further when the previous match is empty.
    pub fn find(&mut self) -> bool {
        let mut next = self.last;
        if self.result.span.as_ref().map(|span| span.start) == Some(next) {
            next = self.instance.next_position(next);
        }

        if next < self.region.start {
            next = self.region.start;
        }

        if next > self.region.end {
            self.result.clear();
            return false;
        }

        self.search(next)
    }

    /// Reset the matcher and find a match starting at or after `position`.
    pub fn find_from(&mut self, position: usize) -> Result<bool, RegexError> {
        let text = self.instance.text;
        if position > text.len() || !text.is_char_boundary(position) {
            return Err(RegexError::IllegalState(format!(
                "Illegal start index {}",
                position
            )));
        }

        self.reset();
        Ok(self.search(position))
    }

    /// Match the whole region.
    pub fn matches(&mut self) -> bool {
        self.match_from(self.region.start, AcceptMode::EndAnchor)
    }

    /// Match a prefix of the region.
    pub fn looking_at(&mut self) -> bool {
        self.match_from(self.region.start, AcceptMode::NoAnchor)
    }

    /// Match a text starting exactly at `position`.
    pub fn match_at(&mut self, position: usize) -> Result<bool, RegexError> {
        if position < self.region.start
            || position > self.region.end
            || !self.instance.text.is_char_boundary(position)
        {
            return Err(RegexError::IllegalState(format!(
                "Illegal start index {}",
                position
            )));
        }

        Ok(self.match_from(position, AcceptMode::NoAnchor))
    }

    /// Whether the pattern has enhanced assertions, the structure of
    /// the text is built on the first call.
    fn prepare_assertions(&mut self) -> bool {
        let Some(enhancement) = self.regex.enhancement.as_ref().filter(|e| !e.is_empty()) else {
            return false;
        };

        if self.instance.validator.is_none() {
            self.instance.validator = Some(Validator::new(enhancement, self.instance.text));
        }
        true
    }

    fn search(&mut self, from: usize) -> bool {
        let regex = self.regex;
        self.instance.from = self.region.start;
        self.instance.to = self.region.end;

        let found = if self.prepare_assertions() {
            self.instance
                .find_validated(&regex.program, self.region.clone(), from)
        } else {
            self.instance.search(&regex.program, from)
        };

        self.update(found)
    }

    fn match_from(&mut self, from: usize, accept_mode: AcceptMode) -> bool {
        let regex = self.regex;
        self.instance.from = self.region.start;
        self.instance.to = self.region.end;

        let found = if self.prepare_assertions() {
            self.instance.match_validated(&regex.program, from, accept_mode)
        } else {
            self.instance.match_at(&regex.program, from, accept_mode)
        };

        self.update(found)
    }

    fn update(&mut self, found: bool) -> bool {
        if found {
            self.last = self.instance.last;
            self.result.span = Some(self.instance.first..self.instance.last);
            self.result.captures.clone_from(&self.instance.captures);
        } else {
            self.result.clear();
        }
        found
    }

    /// A snapshot of the latest match.
    pub fn to_match_result(&self) -> MatchResult<'a, 't> {
        self.result.clone()
    }

    fn current_match(&self) -> Option<Match<'a, 't>> {
        let span = self.result.span.clone()?;
        Some(Match::new(
            span.start,
            span.end,
            None,
            &self.instance.text[span],
        ))
    }

    pub fn start(&self) -> Result<usize, RegexError> {
        self.result.start()
    }

    pub fn end(&self) -> Result<usize, RegexError> {
        self.result.end()
    }

    pub fn group(&self, index: usize) -> Result<Option<&'t str>, RegexError> {
        self.result.group(index)
    }

    pub fn name(&self, name: &str) -> Result<Option<&'t str>, RegexError> {
        self.result.name(name)
    }

    pub fn index_of(&self, name: &str) -> Result<usize, RegexError> {
        self.result.index_of(name)
    }

    pub fn group_count(&self) -> usize {
        self.regex.group_count()
    }

    pub fn iterations(&self, index: usize) -> Result<usize, RegexError> {
        self.result.iterations(index)
    }

    pub fn range(&self, index: usize, iteration: usize) -> Result<Option<Range<usize>>, RegexError> {
        self.result.range(index, iteration)
    }

    pub fn iteration_str(
        &self,
        index: usize,
        iteration: usize,
    ) -> Result<Option<&'t str>, RegexError> {
        self.result.iteration_str(index, iteration)
    }

    /// Append the text between the previous append position and the current
    /// match, and then the expansion of the template.
    pub fn append_replacement(
        &mut self,
        output: &mut String,
        replacement: &str,
    ) -> Result<&mut Self, RegexError> {
        let replacement = Replacement::parse(replacement, &self.regex.program.registry)?;
        self.append_expansion(output, &replacement)?;
        Ok(self)
    }

    fn append_expansion(
        &mut self,
        output: &mut String,
        replacement: &Replacement,
    ) -> Result<(), RegexError> {
        let start = self.result.start()?;
        let end = self.result.end()?;
        let text = self.instance.text;

        output.push_str(&text[self.append_position..start]);
        replacement.expand(output, |index| self.result.group(index).ok().flatten());
        self.append_position = end;
        Ok(())
    }

    /// Append the text after the last appended match.
    pub fn append_tail(&self, output: &mut String) {
        output.push_str(&self.instance.text[self.append_position..]);
    }
}

/// The groups of a match.
#[derive(Debug, Clone)]
pub struct MatchResult<'a, 't> {
    regex: &'a Regex,
    text: &'t str,
    span: Option<Range<usize>>,

    // all the ranges captured by each group, the entry of group 0 is unused.
    captures: Vec<Vec<Range<usize>>>,
}

impl<'a, 't> MatchResult<'a, 't> {
    fn new(regex: &'a Regex, text: &'t str) -> Self {
        MatchResult {
            regex,
            text,
            span: None,
            captures: vec![],
        }
    }

    fn clear(&mut self) {
        self.span = None;
        self.captures.clear();
    }

    fn span(&self) -> Result<&Range<usize>, RegexError> {
        self.span.as_ref().ok_or_else(RegexError::no_match)
    }

    fn check_index(&self, index: usize) -> Result<&Range<usize>, RegexError> {
        let span = self.span()?;
        if index > self.regex.group_count() {
            return Err(RegexError::GroupIndexOutOfRange(index));
        }
        Ok(span)
    }

    pub fn is_matched(&self) -> bool {
        self.span.is_some()
    }

    pub fn start(&self) -> Result<usize, RegexError> {
        self.span().map(|span| span.start)
    }

    pub fn end(&self) -> Result<usize, RegexError> {
        self.span().map(|span| span.end)
    }

    pub fn group_count(&self) -> usize {
        self.regex.group_count()
    }

    pub fn index_of(&self, name: &str) -> Result<usize, RegexError> {
        self.regex
            .program
            .registry
            .index_of(name)
            .ok_or_else(|| RegexError::NoSuchGroupName(name.to_owned()))
    }

    /// The range of the last capture of the group, `None` when the
    /// group did not participate in the match.
    pub fn range_of(&self, index: usize) -> Result<Option<Range<usize>>, RegexError> {
        let span = self.check_index(index)?;
        if index == 0 {
            Ok(Some(span.clone()))
        } else {
            Ok(self
                .captures
                .get(index)
                .and_then(|ranges| ranges.last())
                .cloned())
        }
    }

    pub fn start_of(&self, index: usize) -> Result<Option<usize>, RegexError> {
        Ok(self.range_of(index)?.map(|range| range.start))
    }

    pub fn end_of(&self, index: usize) -> Result<Option<usize>, RegexError> {
        Ok(self.range_of(index)?.map(|range| range.end))
    }

    pub fn group(&self, index: usize) -> Result<Option<&'t str>, RegexError> {
        Ok(self.range_of(index)?.map(|range| &self.text[range]))
    }

    pub fn name(&self, name: &str) -> Result<Option<&'t str>, RegexError> {
        let index = self.index_of(name)?;
        self.group(index)
    }

    /// The number of times the group captured, the whole match counts once.
    pub fn iterations(&self, index: usize) -> Result<usize, RegexError> {
        self.check_index(index)?;
        if index == 0 {
            Ok(1)
        } else {
            Ok(self.captures.get(index).map(|ranges| ranges.len()).unwrap_or(0))
        }
    }

    pub fn range(&self, index: usize, iteration: usize) -> Result<Option<Range<usize>>, RegexError> {
        let span = self.check_index(index)?;
        if index == 0 {
            return Ok((iteration == 0).then(|| span.clone()));
        }
        Ok(self
            .captures
            .get(index)
            .and_then(|ranges| ranges.get(iteration))
            .cloned())
    }

    pub fn iteration_str(
        &self,
        index: usize,
        iteration: usize,
    ) -> Result<Option<&'t str>, RegexError> {
        Ok(self.range(index, iteration)?.map(|range| &self.text[range]))
    }

    pub fn to_captures(&self) -> Option<Captures<'a, 't>> {
        let span = self.span.clone()?;
        let regex: &'a Regex = self.regex;
        let text: &'t str = self.text;
        let registry = &regex.program.registry;

        let new_match = |index: usize, range: Range<usize>| {
            Match::new(
                range.start,
                range.end,
                registry.name_of(index),
                &text[range],
            )
        };

        let mut matches = vec![Some(new_match(0, span.clone()))];
        let mut iterations = vec![vec![new_match(0, span)]];

        for index in 1..registry.group_count() {
            let ranges = self.captures.get(index).map(|v| v.as_slice()).unwrap_or(&[]);
            matches.push(ranges.last().map(|range| new_match(index, range.clone())));
            iterations.push(
                ranges
                    .iter()
                    .map(|range| new_match(index, range.clone()))
                    .collect(),
            );
        }

        Some(Captures {
            matches,
            iterations,
        })
    }
}

pub struct CaptureMatches<'a, 't> {
    matcher: Matcher<'a, 't>,
}

impl<'a, 't> Iterator for CaptureMatches<'a, 't> {
    type Item = Captures<'a, 't>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.matcher.find() {
            return None;
        }
        self.matcher.result.to_captures()
    }
}

pub struct Matches<'a, 't> {
    matcher: Matcher<'a, 't>,
}

impl<'a, 't> Iterator for Matches<'a, 't> {
    type Item = Match<'a, 't>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.matcher.find() {
            return None;
        }
        self.matcher.current_match()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Captures<'a, 'b> {
    /// The last capture of each group, `None` for the groups that
    /// did not participate in the match.
    pub matches: Vec<Option<Match<'a, 'b>>>,

    /// All the captures of each group, one per iteration.
    pub iterations: Vec<Vec<Match<'a, 'b>>>,
}

impl<'a, 'b> Captures<'a, 'b> {
    // the following methods are intended to
    // be compatible with the 'Captures' API of crate 'regex':
    // https://docs.rs/regex/latest/regex/struct.Captures.html

    pub fn get(&self, index: usize) -> Option<&Match<'a, 'b>> {
        self.matches.get(index).and_then(|item| item.as_ref())
    }

    pub fn name(&self, name: &str) -> Option<&Match<'a, 'b>> {
        self.matches
            .iter()
            .flatten()
            .find(|item| item.name == Some(name))
    }

    // e.g.
    //
    // ```
    //   let c = re.captures("...").unwrap();
    //   let (whole, [one, two, three]) = c.extract();
    // ```
    pub fn extract<const N: usize>(&self) -> (&'b str, [&'b str; N]) {
        let mut items: [&str; N] = [""; N];
        for (idx, item) in items.iter_mut().enumerate() {
            *item = self.get(idx + 1).map(|m| m.value).unwrap_or("");
        }
        (self.get(0).map(|m| m.value).unwrap_or(""), items)
    }

    /// All the captures of the group.
    pub fn iterations(&self, index: usize) -> &[Match<'a, 'b>] {
        self.iterations
            .get(index)
            .map(|items| items.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Index<usize> for Captures<'_, '_> {
    type Output = str;

    fn index(&self, index: usize) -> &Self::Output {
        self.get(index)
            .unwrap_or_else(|| panic!(
                "Index {} is out of range of the capture group or the group did not participate, the length of capture groups is {}.",
                index, self.len()))
            .as_str()
    }
}

impl Index<&str> for Captures<'_, '_> {
    type Output = str;

    fn index(&self, name: &str) -> &Self::Output {
        self.name(name)
            .unwrap_or_else(|| panic!("Cannot find the capture group named \"{}\".", name))
            .as_str()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Match<'a, 'b> {
    pub start: usize, // the position of utf-8 byte stream (value included)
    pub end: usize,   // the position of utf-8 byte stream (value excluded)
    pub name: Option<&'a str>,
    pub value: &'b str,
}

impl<'a, 'b> Match<'a, 'b> {
    pub fn new(start: usize, end: usize, name: Option<&'a str>, value: &'b str) -> Self {
        Match {
            start,
            end,
            name,
            value,
        }
    }

    // the following methods are intended to
    // be compatible with the 'Match' API of crate 'regex':
    // https://docs.rs/regex/latest/regex/struct.Match.html

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn range(&self) -> Range<usize> {
        Range {
            start: self.start,
            end: self.end,
        }
    }

    pub fn as_str(&self) -> &'b str {
        self.value
    }
}
