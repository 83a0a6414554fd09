// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::ops::Range;

use crate::{
    enhanced::Validator,
    node::{NodeId, Program},
};

/// The state of a group head while the group is being matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSlot {
    Unset,
    GroupStart(usize),

    /// Set by a group repetition which records the captures itself,
    /// the group tail only passes through.
    NoUnsetGroupStart(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptMode {
    /// The match may end anywhere.
    NoAnchor,

    /// The match must end at the end of the region.
    EndAnchor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Visit {
        node: NodeId,
        kind: &'static str,
        position: usize,
    },
    Accept {
        start: usize,
        end: usize,
    },
    Fail {
        start: usize,
    },
}

pub type Observer<'a> = Box<dyn FnMut(&TraceEvent) + 'a>;

/// The mutable state of the matching of a text.
///
/// Positions are byte offsets of the text, always at char boundaries.
pub struct Instance<'a> {
    pub text: &'a str,
    pub bytes: &'a [u8],

    // the region, lookaround nodes relax it temporarily
    // under transparent bounds.
    pub from: usize,
    pub to: usize,

    /// The end of the region while `to` is narrowed to a search window.
    pub window_end: Option<usize>,

    pub first: usize,
    pub last: usize,

    /// The end of the previous match, for `\G`.
    pub old_last: Option<usize>,

    pub lookbehind_to: usize,
    pub accept_mode: AcceptMode,

    pub transparent_bounds: bool,
    pub anchoring_bounds: bool,

    pub hit_end: bool,
    pub require_end: bool,

    /// All the ranges a group captured, one per iteration.
    /// The entry of group 0 is unused, the whole match is `first..last`.
    pub captures: Vec<Vec<Range<usize>>>,

    // the groups of the pushed captures, in order, so that
    // the captures of an abandoned path can be dropped.
    journal: Vec<usize>,

    pub slots: Vec<GroupSlot>,
    pub counters: Vec<usize>,

    /// Checks the enhanced assertions, built once per text.
    pub validator: Option<Validator>,

    /// Check the assertions when the accept node is reached, so that a
    /// rejected path backtracks instead of ending the match.
    pub validate_on_accept: bool,

    observer: Option<Observer<'a>>,
}

impl<'a> Instance<'a> {
    pub fn new(text: &'a str, program: &Program) -> Self {
        Instance {
            text,
            bytes: text.as_bytes(),
            from: 0,
            to: text.len(),
            window_end: None,
            first: 0,
            last: 0,
            old_last: None,
            lookbehind_to: 0,
            accept_mode: AcceptMode::NoAnchor,
            transparent_bounds: false,
            anchoring_bounds: true,
            hit_end: false,
            require_end: false,
            captures: vec![vec![]; program.group_count()],
            journal: vec![],
            slots: vec![GroupSlot::Unset; program.local_count],
            counters: vec![0; program.local_count],
            validator: None,
            validate_on_accept: false,
            observer: None,
        }
    }

    pub fn text_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn region_end(&self) -> usize {
        self.window_end.unwrap_or(self.to)
    }

    pub fn passes_assertions(&self) -> bool {
        self.validator
            .as_ref()
            .map_or(true, |validator| validator.is_valid(&self.captures))
    }

    pub fn set_observer(&mut self, observer: Option<Observer<'a>>) {
        self.observer = observer;
    }

    pub fn notify(&mut self, event: TraceEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer(&event);
        }
    }

    pub fn has_observer(&self) -> bool {
        self.observer.is_some()
    }

    /// Clear the per-attempt state.
    pub fn clear_state(&mut self) {
        for ranges in self.captures.iter_mut() {
            ranges.clear();
        }
        self.journal.clear();
        self.slots.fill(GroupSlot::Unset);
        self.counters.fill(0);
    }

    pub fn push_capture(&mut self, group: usize, range: Range<usize>) {
        self.captures[group].push(range);
        self.journal.push(group);
    }

    pub fn pop_capture(&mut self) {
        if let Some(group) = self.journal.pop() {
            self.captures[group].pop();
        }
    }

    /// The current position of the capture journal.
    pub fn capture_mark(&self) -> usize {
        self.journal.len()
    }

    /// Drop the captures pushed after the mark.
    pub fn undo_captures(&mut self, mark: usize) {
        while self.journal.len() > mark {
            self.pop_capture();
        }
    }

    /// The last range captured by the group.
    pub fn last_capture(&self, group: usize) -> Option<Range<usize>> {
        self.captures.get(group).and_then(|ranges| ranges.last()).cloned()
    }

    /// The char at `i` and its length in bytes, when `i` is before `to`.
    pub fn char_at(&self, i: usize) -> Option<(char, usize)> {
        if i >= self.to {
            return None;
        }
        self.char_at_unbounded(i)
    }

    /// The char at `i` regardless of the region.
    pub fn char_at_unbounded(&self, i: usize) -> Option<(char, usize)> {
        self.text
            .get(i..)
            .and_then(|s| s.chars().next())
            .map(|c| (c, c.len_utf8()))
    }

    pub fn char_before(&self, i: usize) -> Option<char> {
        self.text.get(..i).and_then(|s| s.chars().next_back())
    }

    /// The position after the char at `i`.
    pub fn next_position(&self, i: usize) -> usize {
        match self.char_at_unbounded(i) {
            Some((_, length)) => i + length,
            None => i + 1,
        }
    }

    /// The position before the char that ends at `i`.
    pub fn previous_position(&self, i: usize) -> usize {
        match self.char_before(i) {
            Some(c) => i - c.len_utf8(),
            None => i.saturating_sub(1),
        }
    }

    /// Step back `count` chars from `i` without going below `floor`.
    pub fn retreat(&self, i: usize, count: usize, floor: usize) -> Option<usize> {
        let mut position = i;
        for _ in 0..count {
            if position <= floor {
                return None;
            }
            position = self.previous_position(position);
        }
        Some(position)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{compiler::compile, flags::Flags};

    use super::Instance;

    #[test]
    fn test_capture_journal() {
        let program = compile("(a)(b)", Flags::empty()).unwrap();
        let mut instance = Instance::new("abab", &program);

        instance.push_capture(1, 0..1);
        let mark = instance.capture_mark();
        instance.push_capture(2, 1..2);
        instance.push_capture(1, 2..3);
        assert_eq!(instance.captures[1], vec![0..1, 2..3]);

        instance.undo_captures(mark);
        assert_eq!(instance.captures[1], vec![0..1]);
        assert!(instance.captures[2].is_empty());
        assert_eq!(instance.last_capture(1), Some(0..1));
        assert_eq!(instance.last_capture(2), None);
        assert_eq!(instance.last_capture(9), None);
    }

    #[test]
    fn test_char_positions() {
        let program = compile("a", Flags::empty()).unwrap();
        let mut instance = Instance::new("a文b", &program);

        assert_eq!(instance.char_at(1), Some(('文', 3)));
        assert_eq!(instance.next_position(1), 4);
        assert_eq!(instance.previous_position(4), 1);
        assert_eq!(instance.char_before(4), Some('文'));
        assert_eq!(instance.retreat(5, 2, 0), Some(1));
        assert_eq!(instance.retreat(5, 4, 0), None);
        assert_eq!(instance.retreat(5, 2, 4), None);

        instance.to = 4;
        assert_eq!(instance.char_at(4), None);
        assert_eq!(instance.char_at_unbounded(4), Some(('b', 1)));
    }
}
