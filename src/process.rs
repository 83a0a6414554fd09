// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::{
    charproperty::{
        equals_ignore_case, fold_case, is_letter_or_digit, is_nonspacing_mark, BinaryProperty,
    },
    instance::{AcceptMode, GroupSlot, Instance, TraceEvent},
    node::{CaseFold, Greediness, NodeId, NodeKind, Program, QuesType},
};

impl Instance<'_> {
    /// Find the pattern starting at or after `from`.
    pub fn search(&mut self, program: &Program, from: usize) -> bool {
        self.start_attempt(from, AcceptMode::NoAnchor);
        let result = self.match_node(program, program.root, from);
        self.finish_attempt(from, result)
    }

    /// Match the pattern at exactly `from`.
    pub fn match_at(&mut self, program: &Program, from: usize, accept_mode: AcceptMode) -> bool {
        self.start_attempt(from, accept_mode);
        let result = self.match_node(program, program.match_root, from);
        self.finish_attempt(from, result)
    }

    fn start_attempt(&mut self, from: usize, accept_mode: AcceptMode) {
        self.hit_end = false;
        self.require_end = false;
        self.first = from;
        self.old_last = Some(self.old_last.unwrap_or(from));
        self.accept_mode = accept_mode;
        self.clear_state();
    }

    fn finish_attempt(&mut self, from: usize, result: bool) -> bool {
        if self.has_observer() {
            let event = if result {
                TraceEvent::Accept {
                    start: self.first,
                    end: self.last,
                }
            } else {
                TraceEvent::Fail { start: from }
            };
            self.notify(event);
        }

        self.old_last = Some(self.last);
        result
    }

    pub fn match_node(&mut self, program: &Program, id: NodeId, i: usize) -> bool {
        let node = program.node(id);

        if self.has_observer() {
            self.notify(TraceEvent::Visit {
                node: id,
                kind: node.kind.name(),
                position: i,
            });
        }

        let next = node.next;

        match &node.kind {
            NodeKind::Accept => {
                if self.accept_mode == AcceptMode::EndAnchor && i != self.to {
                    return false;
                }
                if self.validate_on_accept && !self.passes_assertions() {
                    return false;
                }
                self.last = i;
                true
            }
            NodeKind::Return => {
                self.last = i;
                true
            }
            NodeKind::LookbehindEnd => i == self.lookbehind_to,
            NodeKind::Start { min_length } => {
                let Some(guard) = self.retreat(self.to, *min_length, 0).filter(|g| *g >= i) else {
                    self.hit_end = true;
                    return false;
                };

                let mut position = i;
                while position <= guard {
                    if self.match_node(program, next, position) {
                        self.first = position;
                        return true;
                    }
                    position = self.next_position(position);
                }

                self.hit_end = true;
                false
            }
            NodeKind::BoyerMoore(bm) => {
                let mut position = i;
                while let Some(found) = bm.find(self.bytes, position, self.to) {
                    if self.match_node(program, next, found + bm.len()) {
                        self.first = found;
                        return true;
                    }
                    position = self.next_position(found);
                }

                self.hit_end = true;
                false
            }
            NodeKind::Begin => {
                let (from, _) = self.region_bounds();
                if i == from && self.match_node(program, next, i) {
                    self.first = i;
                    true
                } else {
                    false
                }
            }
            NodeKind::End => {
                let (_, end) = self.region_bounds();
                if i == end {
                    self.hit_end = true;
                    self.match_node(program, next, i)
                } else {
                    false
                }
            }
            NodeKind::Caret { unix_lines } => self.match_caret(program, next, i, *unix_lines),
            NodeKind::Dollar {
                multiline,
                unix_lines,
            } => {
                if *unix_lines {
                    self.match_unix_dollar(program, next, i, *multiline)
                } else {
                    self.match_dollar(program, next, i, *multiline)
                }
            }
            NodeKind::LastMatch => {
                self.old_last == Some(i) && self.match_node(program, next, i)
            }
            NodeKind::LineEnding => match self.char_at(i) {
                Some(('\r', length)) => {
                    let mut end = i + length;
                    if let Some(('\n', n)) = self.char_at(end) {
                        end += n;
                    }
                    self.match_node(program, next, end)
                }
                Some((
                    '\n' | '\u{0B}' | '\u{0C}' | '\u{85}' | '\u{2028}' | '\u{2029}',
                    length,
                )) => self.match_node(program, next, i + length),
                Some(_) => false,
                None => {
                    self.hit_end = true;
                    false
                }
            },
            NodeKind::Char(predicate) => match self.char_at(i) {
                Some((c, length)) => {
                    predicate.is_match(c) && self.match_node(program, next, i + length)
                }
                None => {
                    self.hit_end = true;
                    false
                }
            },
            NodeKind::Slice { chars, fold } => {
                let mut position = i;
                for expected in chars {
                    let Some((c, length)) = self.char_at(position) else {
                        self.hit_end = true;
                        return false;
                    };

                    let is_equal = match fold {
                        CaseFold::Sensitive => c == *expected,
                        CaseFold::Ascii => c == *expected || c.to_ascii_lowercase() == *expected,
                        CaseFold::Unicode => c == *expected || fold_case(c) == *expected,
                    };
                    if !is_equal {
                        return false;
                    }
                    position += length;
                }
                self.match_node(program, next, position)
            }
            NodeKind::Ques { atom, ques_type } => {
                self.match_ques(program, next, i, *atom, *ques_type)
            }
            NodeKind::Curly {
                atom,
                min,
                max,
                greediness,
            } => self.match_curly(program, next, i, *atom, *min, *max, *greediness),
            NodeKind::GroupCurly {
                atom,
                min,
                max,
                greediness,
                local,
                group,
            } => {
                let saved = self.slots[*local];
                self.slots[*local] = GroupSlot::NoUnsetGroupStart(i);

                let repetition = Repetition {
                    atom: *atom,
                    min: *min,
                    max: *max,
                    greediness: *greediness,
                    group: *group,
                };
                let result = self.match_repetition(program, next, i, &repetition);

                self.slots[*local] = saved;
                result
            }
            NodeKind::Branch { atoms, conn } => {
                for atom in atoms {
                    let matched = match atom {
                        Some(atom) => self.match_node(program, *atom, i),
                        None => self.match_node(program, program.next_of(*conn), i),
                    };
                    if matched {
                        return true;
                    }
                }
                false
            }
            NodeKind::BranchConn => self.match_node(program, next, i),
            NodeKind::GroupHead { local } => {
                let saved = self.slots[*local];
                self.slots[*local] = GroupSlot::GroupStart(i);
                let result = self.match_node(program, next, i);
                self.slots[*local] = saved;
                result
            }
            NodeKind::GroupTail { local, group } => match self.slots[*local] {
                GroupSlot::GroupStart(start) => match group {
                    Some(group) => {
                        self.push_capture(*group, start..i);
                        if self.match_node(program, next, i) {
                            true
                        } else {
                            self.pop_capture();
                            false
                        }
                    }
                    None => self.match_node(program, next, i),
                },
                // one iteration of a group repetition, which records the capture
                GroupSlot::NoUnsetGroupStart(_) => {
                    self.last = i;
                    true
                }
                // the group head was never passed
                GroupSlot::Unset => false,
            },
            NodeKind::Prolog { looper } => self.match_loop_init(program, *looper, i),
            NodeKind::Loop { .. } => self.match_loop(program, id, i),
            NodeKind::BackRef { group, fold } => self.match_back_ref(program, next, i, *group, *fold),
            NodeKind::Pos { cond } => {
                let saved_to = self.to;
                self.to = if self.transparent_bounds {
                    self.text_length()
                } else {
                    self.region_end()
                };

                let mark = self.capture_mark();
                let matched = self.match_node(program, *cond, i);
                self.to = saved_to;

                if matched && self.match_node(program, next, i) {
                    true
                } else {
                    self.undo_captures(mark);
                    false
                }
            }
            NodeKind::Neg { cond } => {
                let saved_to = self.to;
                self.to = if self.transparent_bounds {
                    self.text_length()
                } else {
                    self.region_end()
                };

                if i >= self.to {
                    // more input could make the condition match
                    self.require_end = true;
                }

                let mark = self.capture_mark();
                let matched = self.match_node(program, *cond, i);
                self.undo_captures(mark);
                self.to = saved_to;

                !matched && self.match_node(program, next, i)
            }
            NodeKind::Behind { cond, min, max } => {
                let mark = self.capture_mark();
                let matched = self.match_behind(program, *cond, i, *min, *max);
                if matched && self.match_node(program, next, i) {
                    true
                } else {
                    self.undo_captures(mark);
                    false
                }
            }
            NodeKind::NotBehind { cond, min, max } => {
                let mark = self.capture_mark();
                let matched = self.match_behind(program, *cond, i, *min, *max);
                self.undo_captures(mark);
                !matched && self.match_node(program, next, i)
            }
            NodeKind::Bound { negated, unicode } => {
                let is_boundary = self.is_word_boundary(i, *unicode);
                is_boundary != *negated && self.match_node(program, next, i)
            }
            NodeKind::Marker { group, .. } => {
                self.push_capture(*group, i..i);
                if self.match_node(program, next, i) {
                    true
                } else {
                    self.pop_capture();
                    false
                }
            }
        }
    }

    fn region_bounds(&self) -> (usize, usize) {
        if self.anchoring_bounds {
            (self.from, self.region_end())
        } else {
            (0, self.text_length())
        }
    }

    fn match_caret(&mut self, program: &Program, next: NodeId, i: usize, unix_lines: bool) -> bool {
        let (start, end) = self.region_bounds();

        // `^` never matches at the end, even after a line terminator
        if i == end {
            self.hit_end = true;
            return false;
        }

        if i > start {
            let previous = self.char_before(i);
            let after_terminator = if unix_lines {
                previous == Some('\n')
            } else {
                matches!(
                    previous,
                    Some('\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}')
                )
            };
            if !after_terminator {
                return false;
            }

            // `\r\n` is one terminator
            if !unix_lines
                && previous == Some('\r')
                && self.char_at_unbounded(i).map(|(c, _)| c) == Some('\n')
            {
                return false;
            }
        }

        self.match_node(program, next, i)
    }

    fn match_dollar(&mut self, program: &Program, next: NodeId, i: usize, multiline: bool) -> bool {
        let (_, end) = self.region_bounds();

        if !multiline && i < end {
            // only a final line terminator may follow
            let rest = self.text.get(i..end).unwrap_or("");
            let mut chars = rest.chars();
            let is_final_terminator = match (chars.next(), chars.next(), chars.next()) {
                (Some('\r'), Some('\n'), None) => true,
                (Some(c), None, None) => is_line_terminator(c),
                _ => false,
            };
            if !is_final_terminator {
                return false;
            }
        }

        if i < end {
            match self.char_at_unbounded(i).map(|(c, _)| c) {
                Some('\n') => {
                    // no match between `\r` and `\n`
                    if self.char_before(i) == Some('\r') {
                        return false;
                    }
                    if multiline {
                        return self.match_node(program, next, i);
                    }
                }
                Some(c) if is_line_terminator(c) => {
                    if multiline {
                        return self.match_node(program, next, i);
                    }
                }
                _ => return false,
            }
        }

        // matched at the end, more input could change it
        self.hit_end = true;
        self.require_end = true;
        self.match_node(program, next, i)
    }

    fn match_unix_dollar(
        &mut self,
        program: &Program,
        next: NodeId,
        i: usize,
        multiline: bool,
    ) -> bool {
        let (_, end) = self.region_bounds();

        if i < end {
            match self.char_at_unbounded(i) {
                Some(('\n', length)) => {
                    if !multiline && i + length != end {
                        return false;
                    }
                    if multiline {
                        return self.match_node(program, next, i);
                    }
                }
                _ => return false,
            }
        }

        self.hit_end = true;
        self.require_end = true;
        self.match_node(program, next, i)
    }

    fn match_ques(
        &mut self,
        program: &Program,
        next: NodeId,
        i: usize,
        atom: NodeId,
        ques_type: QuesType,
    ) -> bool {
        let mark = self.capture_mark();
        match ques_type {
            QuesType::Greedy => {
                if self.match_node(program, atom, i) {
                    let last = self.last;
                    if self.match_node(program, next, last) {
                        return true;
                    }
                    self.undo_captures(mark);
                }
                self.match_node(program, next, i)
            }
            QuesType::Lazy => {
                if self.match_node(program, next, i) {
                    return true;
                }
                if self.match_node(program, atom, i) {
                    let last = self.last;
                    if self.match_node(program, next, last) {
                        return true;
                    }
                    self.undo_captures(mark);
                }
                false
            }
            QuesType::Possessive => {
                let position = if self.match_node(program, atom, i) {
                    self.last
                } else {
                    i
                };
                if self.match_node(program, next, position) {
                    true
                } else {
                    self.undo_captures(mark);
                    false
                }
            }
            QuesType::Independent => {
                if self.match_node(program, atom, i) {
                    let last = self.last;
                    if self.match_node(program, next, last) {
                        return true;
                    }
                    self.undo_captures(mark);
                }
                false
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn match_curly(
        &mut self,
        program: &Program,
        next: NodeId,
        i: usize,
        atom: NodeId,
        min: usize,
        max: usize,
        greediness: Greediness,
    ) -> bool {
        let repetition = Repetition {
            atom,
            min,
            max,
            greediness,
            group: None,
        };
        self.match_repetition(program, next, i, &repetition)
    }

    /// Repeat the atom, and record each iteration as a capture of
    /// the group if there is one.
    ///
    /// A repetition stops extending when an iteration matches
    /// the empty string.
    fn match_repetition(
        &mut self,
        program: &Program,
        next: NodeId,
        i: usize,
        repetition: &Repetition,
    ) -> bool {
        let base_mark = self.capture_mark();
        let mut position = i;

        for _ in 0..repetition.min {
            if !self.match_iteration(program, position, repetition) {
                self.undo_captures(base_mark);
                return false;
            }
            position = self.last;
        }

        let mut count = repetition.min;

        match repetition.greediness {
            Greediness::Greedy => {
                // the position and the capture mark before each extra iteration
                let mut stack: Vec<(usize, usize)> = vec![];

                while count < repetition.max {
                    let mark = self.capture_mark();
                    if !self.match_iteration(program, position, repetition) {
                        break;
                    }
                    if self.last == position {
                        self.undo_captures(mark);
                        break;
                    }
                    stack.push((position, mark));
                    position = self.last;
                    count += 1;
                }

                loop {
                    if self.match_node(program, next, position) {
                        return true;
                    }
                    match stack.pop() {
                        Some((previous, mark)) => {
                            self.undo_captures(mark);
                            position = previous;
                        }
                        None => {
                            self.undo_captures(base_mark);
                            return false;
                        }
                    }
                }
            }
            Greediness::Lazy => loop {
                if self.match_node(program, next, position) {
                    return true;
                }
                if count >= repetition.max
                    || !self.match_iteration(program, position, repetition)
                    || self.last == position
                {
                    self.undo_captures(base_mark);
                    return false;
                }
                position = self.last;
                count += 1;
            },
            Greediness::Possessive => {
                while count < repetition.max {
                    let mark = self.capture_mark();
                    if !self.match_iteration(program, position, repetition) {
                        break;
                    }
                    if self.last == position {
                        self.undo_captures(mark);
                        break;
                    }
                    position = self.last;
                    count += 1;
                }

                if self.match_node(program, next, position) {
                    true
                } else {
                    self.undo_captures(base_mark);
                    false
                }
            }
        }
    }

    fn match_iteration(&mut self, program: &Program, i: usize, repetition: &Repetition) -> bool {
        if !self.match_node(program, repetition.atom, i) {
            return false;
        }
        if let Some(group) = repetition.group {
            let last = self.last;
            self.push_capture(group, i..last);
        }
        true
    }

    fn match_loop_init(&mut self, program: &Program, looper: NodeId, i: usize) -> bool {
        let NodeKind::Loop {
            body,
            count_local,
            min,
            max,
            lazy,
            ..
        } = *program.kind(looper)
        else {
            return false;
        };
        let next = program.next_of(looper);

        let saved = self.counters[count_local];
        let result = if min > 0 {
            self.counters[count_local] = 1;
            self.match_node(program, body, i)
        } else if lazy {
            if self.match_node(program, next, i) {
                true
            } else if max > 0 {
                self.counters[count_local] = 1;
                self.match_node(program, body, i)
            } else {
                false
            }
        } else if max > 0 {
            self.counters[count_local] = 1;
            self.match_node(program, body, i) || self.match_node(program, next, i)
        } else {
            self.match_node(program, next, i)
        };
        self.counters[count_local] = saved;
        result
    }

    fn match_loop(&mut self, program: &Program, looper: NodeId, i: usize) -> bool {
        let NodeKind::Loop {
            body,
            count_local,
            begin_local,
            min,
            max,
            lazy,
        } = *program.kind(looper)
        else {
            return false;
        };
        let next = program.next_of(looper);

        // an iteration of zero length ends the loop
        let has_progress = match self.slots[begin_local] {
            GroupSlot::Unset => true,
            GroupSlot::GroupStart(start) | GroupSlot::NoUnsetGroupStart(start) => i > start,
        };

        if !has_progress {
            return self.match_node(program, next, i);
        }

        let count = self.counters[count_local];

        if count < min {
            self.counters[count_local] = count + 1;
            let result = self.match_node(program, body, i);
            if !result {
                self.counters[count_local] = count;
            }
            return result;
        }

        if lazy {
            if self.match_node(program, next, i) {
                return true;
            }
            if count < max {
                self.counters[count_local] = count + 1;
                let result = self.match_node(program, body, i);
                if !result {
                    self.counters[count_local] = count;
                }
                return result;
            }
            return false;
        }

        if count < max {
            self.counters[count_local] = count + 1;
            if self.match_node(program, body, i) {
                return true;
            }
            self.counters[count_local] = count;
        }

        self.match_node(program, next, i)
    }

    fn match_back_ref(
        &mut self,
        program: &Program,
        next: NodeId,
        i: usize,
        group: usize,
        fold: CaseFold,
    ) -> bool {
        // a group that captured nothing can not be referred
        let Some(range) = self.last_capture(group) else {
            return false;
        };

        let captured = &self.text[range];

        if fold == CaseFold::Sensitive {
            let end = i + captured.len();
            if end > self.to {
                self.hit_end = true;
                return false;
            }
            return self.bytes[i..end] == *captured.as_bytes() && self.match_node(program, next, end);
        }

        let unicode = fold == CaseFold::Unicode;
        let mut position = i;
        for expected in captured.chars() {
            let Some((c, length)) = self.char_at(position) else {
                self.hit_end = true;
                return false;
            };
            if !equals_ignore_case(c, expected, unicode) {
                return false;
            }
            position += length;
        }
        self.match_node(program, next, position)
    }

    /// Try the condition at every start within the distance
    /// `min..=max` (in chars) before `i`, the nearest first.
    fn match_behind(
        &mut self,
        program: &Program,
        cond: NodeId,
        i: usize,
        min: usize,
        max: usize,
    ) -> bool {
        let saved_from = self.from;
        let saved_lookbehind_to = self.lookbehind_to;

        let start = if self.transparent_bounds { 0 } else { self.from };
        self.lookbehind_to = i;
        if self.transparent_bounds {
            self.from = 0;
        }

        let mut matched = false;
        if let Some(mut position) = self.retreat(i, min, start) {
            let mut distance = min;
            loop {
                if self.match_node(program, cond, position) {
                    matched = true;
                    break;
                }
                if distance >= max || position <= start {
                    break;
                }
                position = self.previous_position(position);
                distance += 1;
            }
        }

        self.from = saved_from;
        self.lookbehind_to = saved_lookbehind_to;
        matched
    }

    fn is_word_boundary(&mut self, i: usize, unicode: bool) -> bool {
        let (start, end) = if self.transparent_bounds {
            (0, self.text_length())
        } else {
            (self.from, self.region_end())
        };

        let mut left = false;
        if i > start {
            if let Some(c) = self.char_before(i) {
                left = is_word(c, unicode)
                    || (is_nonspacing_mark(c) && self.has_base_character(i - c.len_utf8()));
            }
        }

        let mut right = false;
        if i < end {
            if let Some((c, _)) = self.char_at_unbounded(i) {
                right = is_word(c, unicode) || (is_nonspacing_mark(c) && self.has_base_character(i));
            }
        } else {
            // another char could break the boundary
            self.hit_end = true;
            self.require_end = true;
        }

        left != right
    }

    /// Whether the non-spacing mark at `i` follows a letter or digit.
    fn has_base_character(&self, i: usize) -> bool {
        let start = if self.transparent_bounds { 0 } else { self.from };
        let mut position = i;
        loop {
            match self.char_at_unbounded(position) {
                Some((c, _)) if is_letter_or_digit(c) => return true,
                Some((c, _)) if is_nonspacing_mark(c) => {}
                _ => return false,
            }
            if position <= start {
                return false;
            }
            position = self.previous_position(position);
        }
    }
}

struct Repetition {
    atom: NodeId,
    min: usize,
    max: usize,
    greediness: Greediness,
    group: Option<usize>,
}

fn is_word(c: char, unicode: bool) -> bool {
    if unicode {
        BinaryProperty::Word.is_match(c)
    } else {
        c == '_' || is_letter_or_digit(c)
    }
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

#[cfg(test)]
mod tests {
    use std::ops::Range;

    use pretty_assertions::assert_eq;

    use crate::{
        compiler::compile,
        flags::Flags,
        instance::{AcceptMode, GroupSlot, Instance, TraceEvent},
        node::{NodeKind, Program},
    };

    /// The range of the first match.
    fn find(pattern: &str, text: &str) -> Option<Range<usize>> {
        find_with(pattern, Flags::empty(), text)
    }

    fn find_with(pattern: &str, flags: Flags, text: &str) -> Option<Range<usize>> {
        let program = compile(pattern, flags).unwrap();
        let mut instance = Instance::new(text, &program);
        if instance.search(&program, 0) {
            Some(instance.first..instance.last)
        } else {
            None
        }
    }

    fn full_match(pattern: &str, text: &str) -> bool {
        let program = compile(pattern, Flags::empty()).unwrap();
        let mut instance = Instance::new(text, &program);
        instance.match_at(&program, 0, AcceptMode::EndAnchor)
    }

    /// All the captures of the group in the first match.
    fn captures_of(pattern: &str, text: &str, group: usize) -> Vec<String> {
        let program = compile(pattern, Flags::empty()).unwrap();
        let mut instance = Instance::new(text, &program);
        assert!(instance.search(&program, 0));
        instance.captures[group]
            .iter()
            .map(|range| text[range.clone()].to_owned())
            .collect()
    }

    #[test]
    fn test_process_literal() {
        assert_eq!(find("abc", "xxabcxx"), Some(2..5));
        assert_eq!(find("abcd", "abcabcd"), Some(3..7));
        assert_eq!(find("abcd", "abcabc"), None);
        assert_eq!(find("文字", "中文字"), Some(3..9));
        assert_eq!(find_with("ABC", Flags::CASE_INSENSITIVE, "xabc"), Some(1..4));
    }

    #[test]
    fn test_process_quantifiers() {
        // greedy
        assert_eq!(find("(a){2,4}", "aaaaa"), Some(0..4));
        assert_eq!(find("a+b", "aaab"), Some(0..4));
        assert_eq!(find("a*", "bbb"), Some(0..0));

        // lazy
        assert_eq!(find("(a){2,4}?", "aaaaa"), Some(0..2));
        assert_eq!(find("a+?b", "aaab"), Some(0..4));
        assert_eq!(find("<.+?>", "<a><b>"), Some(0..3));

        // possessive
        assert_eq!(find("(a){2,4}+a", "aaaaa"), Some(0..5));
        assert_eq!(find("a{2,4}+a", "aaaa"), None);
        assert_eq!(find("a*+a", "aaaa"), None);
        assert_eq!(find("(?>a+)b", "aaab"), Some(0..4));
        assert_eq!(find("(?>a+)a", "aaa"), None);

        // optional
        assert_eq!(find("colou?r", "color colour"), Some(0..5));
        assert_eq!(find("ab??", "ab"), Some(0..1));
    }

    #[test]
    fn test_process_group_repetition() {
        // deterministic group
        assert_eq!(find("(ab)+c", "ababc"), Some(0..5));
        assert_eq!(captures_of("(ab)+c", "ababc", 1), vec!["ab", "ab"]);

        // non-deterministic group
        assert_eq!(find("(a|bc)+d", "abcad"), Some(0..5));
        assert_eq!(captures_of("(a|bc)+d", "abcad", 1), vec!["a", "bc", "a"]);
        assert_eq!(find("(a|bc)+?", "abc"), Some(0..1));
        assert_eq!(find("(a|bc){2}", "abca"), Some(0..3));

        // backtracking drops the captures of the abandoned iterations
        assert_eq!(captures_of("(a)+ab", "aaab", 1), vec!["a", "a"]);
        assert_eq!(captures_of("(a|b)+ab", "abab", 1), vec!["a", "b"]);

        // zero length iterations terminate
        assert_eq!(find("(a*)*b", "aab"), Some(0..3));
        assert_eq!(find("(a?)+", "b"), Some(0..0));
    }

    #[test]
    fn test_process_alternation() {
        assert_eq!(find("cat|dog", "hotdog"), Some(3..6));
        assert_eq!(find("a(b|c|)d", "ad"), Some(0..2));
        assert_eq!(find("a(b|c|)d", "acd"), Some(0..3));
        assert_eq!(find("(?:ab|a)c", "ac"), Some(0..2));
    }

    #[test]
    fn test_process_back_reference() {
        assert!(full_match("(a*)bc\\1", "aabcaa"));
        assert!(!full_match("(a*)bc\\1", "aabcaaa"));
        assert_eq!(find("(\\w)\\1", "abccd"), Some(2..4));
        assert_eq!(find("(?<q>['\"]).*\\k<q>", "say \"hi\""), Some(4..8));
        assert_eq!(
            find_with("(a)\\1", Flags::CASE_INSENSITIVE, "aA"),
            Some(0..2)
        );

        // a group that did not participate fails the reference
        assert_eq!(find("(a)?b\\1", "b"), None);

        // undefined group
        assert_eq!(find("a\\2", "a"), None);
    }

    #[test]
    fn test_process_lookaround() {
        assert_eq!(find("a(?=b)", "acab"), Some(2..3));
        assert_eq!(find("a(?!b)", "abac"), Some(2..3));
        assert_eq!(find("(?<=a{1,4})b", "aaaab"), Some(4..5));
        assert_eq!(find("(?<=a)b", "bab"), Some(2..3));
        assert_eq!(find("(?<!a)b", "abcb"), Some(3..4));
        assert_eq!(find("(?<=文)字", "字文字"), Some(6..9));

        // the captures of a lookahead are kept
        assert_eq!(captures_of("(?=(a+))a", "aaa", 1), vec!["aaa"]);
    }

    #[test]
    fn test_process_anchors() {
        assert_eq!(find("^a", "ba"), None);
        assert_eq!(find_with("^a", Flags::MULTILINE, "b\na"), Some(2..3));
        assert_eq!(find_with("^", Flags::MULTILINE, "a\r\n"), Some(0..0));

        assert_eq!(find("a$", "a\n"), Some(0..1));
        assert_eq!(find("a$", "a\r\n"), Some(0..1));
        assert_eq!(find("a$", "a\nb"), None);
        assert_eq!(find_with("a$", Flags::MULTILINE, "a\nb"), Some(0..1));
        assert_eq!(find_with("a$", Flags::UNIX_LINES, "a\r"), None);

        assert_eq!(find("a\\z", "a\n"), None);
        assert_eq!(find("a\\Z", "a\n"), Some(0..1));
        assert_eq!(find("\\Aa", "aa"), Some(0..1));

        assert_eq!(find("\\bcat\\b", "concat cat"), Some(7..10));
        assert_eq!(find("\\Bcat", "cat concat"), Some(7..10));
        assert_eq!(find("a\\Rb", "a\r\nb"), Some(0..4));
        assert_eq!(find("a\\Rb", "a\u{2028}b"), Some(0..5));
    }

    #[test]
    fn test_process_last_match() {
        let program = compile("\\Ga", Flags::empty()).unwrap();
        let mut instance = Instance::new("aab", &program);
        assert!(instance.search(&program, 0));
        assert_eq!(instance.first..instance.last, 0..1);
        assert!(instance.search(&program, 1));
        assert_eq!(instance.first..instance.last, 1..2);
        assert!(!instance.search(&program, 2));
    }

    #[test]
    fn test_process_hit_end() {
        let program = compile("abc", Flags::empty()).unwrap();

        let mut instance = Instance::new("xxab", &program);
        assert!(!instance.search(&program, 0));
        assert!(instance.hit_end);

        let program = compile("a$", Flags::empty()).unwrap();
        let mut instance = Instance::new("a", &program);
        assert!(instance.search(&program, 0));
        assert!(instance.hit_end);
        assert!(instance.require_end);
    }

    #[test]
    fn test_process_region_bounds() {
        // a lookahead sees the text after the region only under transparent bounds
        {
            let program = compile("b(?=c)", Flags::empty()).unwrap();
            let mut instance = Instance::new("abcd", &program);
            instance.from = 1;
            instance.to = 2;
            assert!(!instance.search(&program, 1));

            instance.transparent_bounds = true;
            assert!(instance.search(&program, 1));
            assert_eq!(instance.first..instance.last, 1..2);
        }

        // so does a word boundary
        {
            let program = compile("\\bb", Flags::empty()).unwrap();
            let mut instance = Instance::new("ab", &program);
            instance.from = 1;
            assert!(instance.search(&program, 1));

            instance.transparent_bounds = true;
            assert!(!instance.search(&program, 1));
        }

        // anchoring bounds
        {
            let program = compile("^b", Flags::empty()).unwrap();
            let mut instance = Instance::new("ab", &program);
            instance.from = 1;
            assert!(instance.search(&program, 1));

            instance.anchoring_bounds = false;
            assert!(!instance.search(&program, 1));
        }
    }

    #[test]
    fn test_process_group_tail() {
        let mut program = Program::new();
        let tail = program.add_node(NodeKind::GroupTail {
            local: 0,
            group: None,
        });
        program.local_count = 1;

        let mut instance = Instance::new("ab", &program);

        // a tail without its head
        assert!(!instance.match_node(&program, tail, 1));

        instance.slots[0] = GroupSlot::GroupStart(0);
        assert!(instance.match_node(&program, tail, 1));
        assert_eq!(instance.last, 1);

        // the iteration of a group repetition ends here
        instance.slots[0] = GroupSlot::NoUnsetGroupStart(1);
        assert!(instance.match_node(&program, tail, 2));
        assert_eq!(instance.last, 2);
    }

    #[test]
    fn test_process_observer() {
        let program = compile("ab", Flags::empty()).unwrap();
        let mut events = vec![];
        {
            let mut instance = Instance::new("xab", &program);
            instance.set_observer(Some(Box::new(|event: &TraceEvent| {
                events.push(event.clone())
            })));
            assert!(instance.search(&program, 0));
        }

        assert_eq!(events.last(), Some(&TraceEvent::Accept { start: 1, end: 3 }));
        assert!(events.contains(&TraceEvent::Visit {
            node: program.match_root,
            kind: "Slice",
            position: 1
        }));
    }
}
