// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::{
    boyermoore::{BoyerMoore, MIN_PATTERN_LENGTH},
    charproperty::{
        fold_case, resolve_property, simple_lowercase, simple_uppercase, BinaryProperty, BitClass,
        CharPredicate, Ctype,
    },
    enhanced::marker_kind,
    error::RegexError,
    flags::Flags,
    node::{
        CaseFold, Greediness, NodeId, NodeKind, Program, QuesType, TreeInfo, ACCEPT,
        LOOKBEHIND_END, MAX_REPETITIONS,
    },
    tokenizer::Tokenizer,
};

/// Compile a pattern into a node program.
pub fn compile(pattern: &str, flags: Flags) -> Result<Program, RegexError> {
    let mut flags = flags;
    if flags.contains(Flags::UNICODE_CHARACTER_CLASS) {
        flags |= Flags::UNICODE_CASE;
    }

    let tokenizer = Tokenizer::new(pattern, flags)?;
    let mut program = Program::new();
    program.flags = flags;

    let mut compiler = Compiler {
        tokenizer,
        program,
    };

    compiler.parse()?;

    log::debug!(
        "compiled pattern {:?}: {} nodes, {} groups, {} locals",
        pattern,
        compiler.program.nodes.len(),
        compiler.program.group_count(),
        compiler.program.local_count
    );

    Ok(compiler.program)
}

/// The result of an escape sequence.
enum Escape {
    Literal(char),
    Class(CharPredicate),
    Node(NodeKind),
}

/// An item of a character class.
enum ClassItem {
    /// The character was added to the bit class of the enclosing class.
    Bits,
    Predicate(CharPredicate),
}

enum Quantifier {
    Ques(Greediness),
    Curly {
        min: usize,
        max: usize,
        greediness: Greediness,
    },
}

struct Compiler {
    tokenizer: Tokenizer,
    program: Program,
}

impl Compiler {
    fn has(&self, flag: Flags) -> bool {
        self.tokenizer.flags.contains(flag)
    }

    fn add(&mut self, kind: NodeKind) -> NodeId {
        self.program.add_node(kind)
    }

    fn parse(&mut self) -> Result<(), RegexError> {
        let match_root = if self.has(Flags::LITERAL) {
            let chars = self.tokenizer.chars().to_vec();
            let node = self.new_slice(chars);
            self.program.set_next(node, ACCEPT);
            node
        } else {
            let node = self.expr(ACCEPT)?;
            self.confirm_ending()?;
            node
        };

        let boyer_moore = match self.program.kind(match_root) {
            NodeKind::Slice {
                chars,
                fold: CaseFold::Sensitive,
            } if chars.len() >= MIN_PATTERN_LENGTH => BoyerMoore::new(chars),
            _ => None,
        };

        let root = if let Some(bm) = boyer_moore {
            let next = self.program.next_of(match_root);
            let node = self.add(NodeKind::BoyerMoore(bm));
            self.program.set_next(node, next);
            node
        } else if *self.program.kind(match_root) == NodeKind::Begin {
            match_root
        } else {
            self.new_start(match_root)
        };

        self.program.root = root;
        self.program.match_root = match_root;
        Ok(())
    }

    fn new_start(&mut self, match_root: NodeId) -> NodeId {
        let mut info = TreeInfo::new();
        self.program.study(match_root, &mut info);
        let node = self.add(NodeKind::Start {
            min_length: info.min_length,
        });
        self.program.set_next(node, match_root);
        node
    }

    fn confirm_ending(&mut self) -> Result<(), RegexError> {
        match self.tokenizer.peek_char() {
            None => Ok(()),
            Some(')') => {
                self.tokenizer.next_char();
                Err(self.tokenizer.error("Unmatched closing ')'"))
            }
            Some(_) => {
                self.tokenizer.next_char();
                Err(self.tokenizer.error("Unexpected internal error"))
            }
        }
    }

    /// Alternation.
    ///
    /// Every alternative ends at `end`, or at a shared `BranchConn`
    /// whose next is `end` when there is more than one alternative.
    fn expr(&mut self, end: NodeId) -> Result<NodeId, RegexError> {
        let mut prev: Option<NodeId> = None;
        let mut first_tail = end;
        let mut branch: Option<NodeId> = None;
        let mut conn: Option<NodeId> = None;

        loop {
            let (node, node_tail) = self.sequence(end)?;

            match prev {
                None => {
                    prev = Some(node);
                    first_tail = node_tail;
                }
                Some(prev_node) => {
                    let conn_node = match conn {
                        Some(c) => c,
                        None => {
                            let c = self.add(NodeKind::BranchConn);
                            self.program.set_next(c, end);
                            conn = Some(c);
                            c
                        }
                    };

                    // an empty alternative goes to the continuation directly
                    let atom = if node == end {
                        None
                    } else {
                        self.program.set_next(node_tail, conn_node);
                        Some(node)
                    };

                    match branch {
                        Some(b) if b == prev_node => {
                            if let NodeKind::Branch { atoms, .. } = &mut self.program.nodes[b].kind {
                                atoms.push(atom);
                            }
                        }
                        _ => {
                            let first = if prev_node == end {
                                None
                            } else {
                                self.program.set_next(first_tail, conn_node);
                                Some(prev_node)
                            };

                            let b = self.add(NodeKind::Branch {
                                atoms: vec![first, atom],
                                conn: conn_node,
                            });
                            branch = Some(b);
                            prev = Some(b);
                        }
                    }
                }
            }

            if self.tokenizer.peek_char() != Some('|') {
                return Ok(prev.unwrap_or(end));
            }
            self.tokenizer.next_char();
        }
    }

    /// A chain of atoms between alternations.
    ///
    /// Returns `(head, tail)`, or `(end, end)` for an empty sequence.
    fn sequence(&mut self, end: NodeId) -> Result<(NodeId, NodeId), RegexError> {
        let mut head: Option<NodeId> = None;
        let mut tail = end;

        loop {
            let node = match self.tokenizer.peek_char() {
                None | Some('|') | Some(')') => break,
                Some('(') => {
                    // groups handle their own quantifiers
                    if let Some((group_head, group_tail)) = self.group0()? {
                        match head {
                            None => head = Some(group_head),
                            Some(_) => self.program.set_next(tail, group_head),
                        }
                        tail = group_tail;
                    }
                    continue;
                }
                Some('[') => {
                    let predicate = self.class(true)?;
                    self.add(NodeKind::Char(predicate))
                }
                Some('\\') => match self.tokenizer.advance_and_peek_raw() {
                    Some(c @ ('p' | 'P')) => {
                        let predicate = self.family(c == 'P')?;
                        self.add(NodeKind::Char(predicate))
                    }
                    _ => {
                        self.tokenizer.unread();
                        self.atom()?
                    }
                },
                Some('^') => {
                    self.tokenizer.next_char();
                    if self.has(Flags::MULTILINE) {
                        self.add(NodeKind::Caret {
                            unix_lines: self.has(Flags::UNIX_LINES),
                        })
                    } else {
                        self.add(NodeKind::Begin)
                    }
                }
                Some('$') => {
                    self.tokenizer.next_char();
                    self.add(NodeKind::Dollar {
                        multiline: self.has(Flags::MULTILINE),
                        unix_lines: self.has(Flags::UNIX_LINES),
                    })
                }
                Some('.') => {
                    self.tokenizer.next_char();
                    let predicate = if self.has(Flags::DOTALL) {
                        CharPredicate::All
                    } else if self.has(Flags::UNIX_LINES) {
                        CharPredicate::UnixDot
                    } else {
                        CharPredicate::Dot
                    };
                    self.add(NodeKind::Char(predicate))
                }
                Some(c @ ('?' | '*' | '+')) => {
                    self.tokenizer.next_char();
                    return Err(self
                        .tokenizer
                        .error(&format!("Dangling meta character '{}'", c)));
                }
                Some(_) => self.atom()?,
            };

            let node = self.closure(node)?;
            match head {
                None => head = Some(node),
                Some(_) => self.program.set_next(tail, node),
            }
            tail = node;
        }

        match head {
            None => Ok((end, end)),
            Some(h) => {
                self.program.set_next(tail, end);
                Ok((h, tail))
            }
        }
    }

    /// A literal run, a single character, or a node produced by an escape.
    fn atom(&mut self) -> Result<NodeId, RegexError> {
        let mut buffer: Vec<char> = vec![];
        let mut prev_cursor = self.tokenizer.cursor();
        let mut ch = self.tokenizer.peek_char();

        loop {
            match ch {
                None => break,
                Some('*' | '+' | '?' | '{') => {
                    // the quantifier applies to the last character only
                    if buffer.len() > 1 {
                        self.tokenizer.set_cursor(prev_cursor);
                        buffer.pop();
                    }
                    break;
                }
                Some('$' | '.' | '^' | '(' | '[' | '|' | ')') => break,
                Some('\\') => {
                    let escaped = self.tokenizer.advance_and_peek_raw();
                    if let Some(p @ ('p' | 'P')) = escaped {
                        if !buffer.is_empty() {
                            self.tokenizer.unread();
                            break;
                        }
                        let predicate = self.family(p == 'P')?;
                        return Ok(self.add(NodeKind::Char(predicate)));
                    }

                    self.tokenizer.unread();
                    prev_cursor = self.tokenizer.cursor();
                    match self.escape(false, false)? {
                        Escape::Literal(c) => {
                            buffer.push(c);
                            ch = self.tokenizer.peek_char();
                            continue;
                        }
                        Escape::Class(predicate) if buffer.is_empty() => {
                            return Ok(self.add(NodeKind::Char(predicate)));
                        }
                        Escape::Node(kind) if buffer.is_empty() => {
                            return Ok(self.add(kind));
                        }
                        _ => {
                            // handle the pending literal first
                            self.tokenizer.set_cursor(prev_cursor);
                            break;
                        }
                    }
                }
                Some(c) => {
                    prev_cursor = self.tokenizer.cursor();
                    buffer.push(c);
                    ch = self.tokenizer.advance_and_peek();
                }
            }
        }

        if buffer.len() == 1 {
            let predicate = self.new_single(buffer[0]);
            Ok(self.add(NodeKind::Char(predicate)))
        } else {
            Ok(self.new_slice(buffer))
        }
    }

    /// A back reference `\N`, the digits are taken greedily while
    /// the number is a group that has been opened already.
    fn back_reference(&mut self, first_digit: usize) -> NodeKind {
        let mut group = first_digit;
        while let Some(c) = self.tokenizer.peek_char() {
            let Some(digit) = c.to_digit(10) else {
                break;
            };
            let candidate = group * 10 + digit as usize;
            if self.program.group_count() - 1 < candidate {
                break;
            }
            group = candidate;
            self.tokenizer.next_char();
        }

        NodeKind::BackRef {
            group,
            fold: self.case_fold(),
        }
    }

    fn case_fold(&self) -> CaseFold {
        if !self.has(Flags::CASE_INSENSITIVE) {
            CaseFold::Sensitive
        } else if self.has(Flags::UNICODE_CASE) {
            CaseFold::Unicode
        } else {
            CaseFold::Ascii
        }
    }

    /// The cursor is at the backslash.
    ///
    /// `is_range` is set when the escape is the bound of a class range,
    /// in which case `\v` means U+000B.
    fn escape(&mut self, in_class: bool, is_range: bool) -> Result<Escape, RegexError> {
        let unicode_class = self.has(Flags::UNICODE_CHARACTER_CLASS);

        let escape = match self.tokenizer.skip() {
            Some('0') => Escape::Literal(self.tokenizer.read_octal()?),
            Some(c @ '1'..='9') if !in_class => {
                Escape::Node(self.back_reference(c as usize - '0' as usize))
            }
            Some('A') if !in_class => Escape::Node(NodeKind::Begin),
            Some('B') if !in_class => Escape::Node(NodeKind::Bound {
                negated: true,
                unicode: unicode_class,
            }),
            Some('D') => Escape::Class(self.predefined_class(Ctype::Digit).complement()),
            Some('G') if !in_class => Escape::Node(NodeKind::LastMatch),
            Some('H') => Escape::Class(CharPredicate::HorizWs.complement()),
            Some('R') if !in_class => Escape::Node(NodeKind::LineEnding),
            Some('S') => Escape::Class(self.predefined_class(Ctype::Space).complement()),
            Some('V') => Escape::Class(CharPredicate::VertWs.complement()),
            Some('W') => Escape::Class(self.predefined_class(Ctype::Word).complement()),
            Some('Z') if !in_class => Escape::Node(NodeKind::Dollar {
                multiline: false,
                unix_lines: self.has(Flags::UNIX_LINES),
            }),
            Some('a') => Escape::Literal('\u{07}'),
            Some('b') if !in_class => Escape::Node(NodeKind::Bound {
                negated: false,
                unicode: unicode_class,
            }),
            Some('c') => Escape::Literal(self.tokenizer.read_control()?),
            Some('d') => Escape::Class(self.predefined_class(Ctype::Digit)),
            Some('e') => Escape::Literal('\u{1B}'),
            Some('f') => Escape::Literal('\u{0C}'),
            Some('h') => Escape::Class(CharPredicate::HorizWs),
            Some('k') if !in_class => {
                if self.tokenizer.next_char() != Some('<') {
                    return Err(self
                        .tokenizer
                        .error("\\k is not followed by '<' for named capturing group"));
                }
                let name = self.group_name()?;
                let Some(group) = self.program.registry.index_of(&name) else {
                    return Err(self.tokenizer.error(&format!(
                        "named capturing group <{}> does not exist",
                        name
                    )));
                };
                Escape::Node(NodeKind::BackRef {
                    group,
                    fold: self.case_fold(),
                })
            }
            Some('n') => Escape::Literal('\n'),
            Some('r') => Escape::Literal('\r'),
            Some('s') => Escape::Class(self.predefined_class(Ctype::Space)),
            Some('t') => Escape::Literal('\t'),
            Some('u') => Escape::Literal(self.tokenizer.read_unicode()?),
            Some('v') if is_range => Escape::Literal('\u{0B}'),
            Some('v') => Escape::Class(CharPredicate::VertWs),
            Some('w') => Escape::Class(self.predefined_class(Ctype::Word)),
            Some('x') => Escape::Literal(self.tokenizer.read_hex()?),
            Some('z') if !in_class => Escape::Node(NodeKind::End),
            Some(c) if !c.is_ascii_alphanumeric() => Escape::Literal(c),
            _ => return Err(self.tokenizer.error("Illegal/unsupported escape sequence")),
        };

        Ok(escape)
    }

    /// `\d`, `\s` and `\w`
    fn predefined_class(&self, ctype: Ctype) -> CharPredicate {
        if self.has(Flags::UNICODE_CHARACTER_CLASS) {
            let property = match ctype {
                Ctype::Digit => BinaryProperty::Digit,
                Ctype::Space => BinaryProperty::WhiteSpace,
                _ => BinaryProperty::Word,
            };
            CharPredicate::Binary(property)
        } else {
            CharPredicate::Ctype(ctype)
        }
    }

    fn parse_quantifier(&mut self) -> Result<Option<Quantifier>, RegexError> {
        let quantifier = match self.tokenizer.peek_char() {
            Some('?') => {
                self.tokenizer.next_char();
                Quantifier::Ques(self.greediness())
            }
            Some('*') => {
                self.tokenizer.next_char();
                Quantifier::Curly {
                    min: 0,
                    max: MAX_REPETITIONS,
                    greediness: self.greediness(),
                }
            }
            Some('+') => {
                self.tokenizer.next_char();
                Quantifier::Curly {
                    min: 1,
                    max: MAX_REPETITIONS,
                    greediness: self.greediness(),
                }
            }
            Some('{') => {
                let Some(first_digit) = self.tokenizer.peek_char_at(1).and_then(|c| c.to_digit(10))
                else {
                    self.tokenizer.next_char();
                    return Err(self.tokenizer.error("Illegal repetition"));
                };

                // consume the '{' and the first digit
                self.tokenizer.skip();

                let mut min = first_digit as usize;
                let mut ch = self.tokenizer.next_char();
                while let Some(digit) = ch.and_then(|c| c.to_digit(10)) {
                    min = min
                        .checked_mul(10)
                        .and_then(|n| n.checked_add(digit as usize))
                        .ok_or_else(|| self.tokenizer.error("Illegal repetition range"))?;
                    ch = self.tokenizer.next_char();
                }

                let mut max = min;
                if ch == Some(',') {
                    ch = self.tokenizer.next_char();
                    max = MAX_REPETITIONS;
                    if ch != Some('}') {
                        max = 0;
                        while let Some(digit) = ch.and_then(|c| c.to_digit(10)) {
                            max = max
                                .checked_mul(10)
                                .and_then(|n| n.checked_add(digit as usize))
                                .ok_or_else(|| self.tokenizer.error("Illegal repetition range"))?;
                            ch = self.tokenizer.next_char();
                        }
                    }
                }

                if ch != Some('}') {
                    return Err(self.tokenizer.error("Unclosed counted closure"));
                }

                if max < min {
                    return Err(self.tokenizer.error("Illegal repetition range"));
                }

                Quantifier::Curly {
                    min,
                    max,
                    greediness: self.greediness(),
                }
            }
            _ => return Ok(None),
        };

        Ok(Some(quantifier))
    }

    /// The optional `?` (lazy) or `+` (possessive) suffix of a quantifier.
    fn greediness(&mut self) -> Greediness {
        match self.tokenizer.peek_char() {
            Some('?') => {
                self.tokenizer.next_char();
                Greediness::Lazy
            }
            Some('+') => {
                self.tokenizer.next_char();
                Greediness::Possessive
            }
            _ => Greediness::Greedy,
        }
    }

    fn apply_quantifier(&mut self, atom: NodeId, quantifier: Quantifier) -> NodeId {
        match quantifier {
            Quantifier::Ques(greediness) => {
                let ques_type = match greediness {
                    Greediness::Greedy => QuesType::Greedy,
                    Greediness::Lazy => QuesType::Lazy,
                    Greediness::Possessive => QuesType::Possessive,
                };
                self.add(NodeKind::Ques { atom, ques_type })
            }
            Quantifier::Curly {
                min,
                max,
                greediness,
            } => self.add(NodeKind::Curly {
                atom,
                min,
                max,
                greediness,
            }),
        }
    }

    /// Wrap a single node with the trailing quantifier if there is one.
    fn closure(&mut self, node: NodeId) -> Result<NodeId, RegexError> {
        match self.parse_quantifier()? {
            Some(quantifier) => Ok(self.apply_quantifier(node, quantifier)),
            None => Ok(node),
        }
    }

    /// A character class, the cursor is at the `[`, or, for the right hand
    /// side of `&&` without brackets, one character before the first member.
    ///
    /// The closing `]` is consumed only when `consume` is set.
    fn class(&mut self, consume: bool) -> Result<CharPredicate, RegexError> {
        let mut prev: Option<CharPredicate> = None;
        let mut bits = BitClass::new();
        let mut bits_placed = false;
        let mut include = true;
        let mut first_in_class = true;
        let mut ch = self.tokenizer.advance_and_peek();

        loop {
            match ch {
                None => return Err(self.tokenizer.error("Unclosed character class")),
                Some('^')
                    if first_in_class
                        && self.tokenizer.cursor() > 0
                        && self.tokenizer.chars()[self.tokenizer.cursor() - 1] == '[' =>
                {
                    ch = self.tokenizer.advance_and_peek();
                    include = !include;
                    continue;
                }
                Some('[') => {
                    first_in_class = false;
                    let node = self.class(true)?;
                    prev = Some(match prev {
                        None => node,
                        Some(p) => p.union(node),
                    });
                    ch = self.tokenizer.peek_char();
                    continue;
                }
                Some('&') => {
                    first_in_class = false;
                    ch = self.tokenizer.advance_and_peek();
                    if ch == Some('&') {
                        ch = self.tokenizer.advance_and_peek();
                        let mut right: Option<CharPredicate> = None;
                        while ch != Some(']') && ch != Some('&') {
                            match ch {
                                None => {
                                    return Err(self.tokenizer.error("Unclosed character class"))
                                }
                                Some('[') => {
                                    let node = self.class(true)?;
                                    right = Some(match right {
                                        None => node,
                                        Some(r) => r.union(node),
                                    });
                                }
                                Some(_) => {
                                    // abc&&def
                                    self.tokenizer.unread();
                                    right = Some(self.class(false)?);
                                }
                            }
                            ch = self.tokenizer.peek_char();
                        }

                        prev = match (prev, right) {
                            (None, None) => return Err(self.tokenizer.error("Bad class syntax")),
                            (None, Some(r)) => Some(r),
                            (Some(p), None) => Some(p),
                            (Some(mut p), Some(r)) => {
                                p.fill_bits(&bits);
                                Some(p.intersection(r))
                            }
                        };

                        // the bits on the left hand side are settled
                        bits = BitClass::new();
                        bits_placed = false;
                        continue;
                    }

                    // a literal '&'
                    self.tokenizer.unread();
                }
                Some(']') => {
                    first_in_class = false;
                    if let Some(mut p) = prev {
                        if consume {
                            self.tokenizer.advance_and_peek();
                        }
                        p.fill_bits(&bits);
                        return Ok(p);
                    }
                    // `]` right after `[` is a literal
                }
                Some(_) => {
                    first_in_class = false;
                }
            }

            let node = match self.class_item(&mut bits)? {
                ClassItem::Bits if bits_placed => None,
                ClassItem::Bits => {
                    bits_placed = true;
                    Some(CharPredicate::Bits(BitClass::new()))
                }
                ClassItem::Predicate(p) => Some(p),
            };

            if let Some(node) = node {
                prev = Some(match (prev, include) {
                    (None, true) => node,
                    (None, false) => node.complement(),
                    (Some(p), true) => p.union(node),
                    (Some(p), false) => p.difference(node),
                });
            }

            ch = self.tokenizer.peek_char();
        }
    }

    /// A single character, a range, an escape or a property inside a class.
    fn class_item(&mut self, bits: &mut BitClass) -> Result<ClassItem, RegexError> {
        let c = match self.tokenizer.peek_char() {
            Some('\\') => {
                let escaped = self.tokenizer.advance_and_peek_raw();
                if let Some(p @ ('p' | 'P')) = escaped {
                    return Ok(ClassItem::Predicate(self.family(p == 'P')?));
                }

                let is_range = self.tokenizer.peek_char_at(1) == Some('-');
                self.tokenizer.unread();
                match self.escape(true, is_range)? {
                    Escape::Literal(c) => c,
                    Escape::Class(predicate) => return Ok(ClassItem::Predicate(predicate)),
                    Escape::Node(_) => {
                        return Err(self.tokenizer.error("Illegal/unsupported escape sequence"))
                    }
                }
            }
            Some(c) => {
                self.tokenizer.next_char();
                c
            }
            None => return Err(self.tokenizer.error("Unclosed character class")),
        };

        if self.tokenizer.peek_char() == Some('-') {
            match self.tokenizer.peek_char_at(1) {
                Some('[') => return Ok(self.bits_or_single(bits, c)),
                Some(']') => {}
                _ => {
                    self.tokenizer.advance_and_peek();
                    let upper = match self.tokenizer.peek_char() {
                        Some('\\') => match self.escape(true, true)? {
                            Escape::Literal(u) => Some(u),
                            _ => None,
                        },
                        Some(u) => {
                            self.tokenizer.next_char();
                            Some(u)
                        }
                        None => None,
                    };

                    let upper = match upper {
                        Some(u) if u >= c => u,
                        _ => return Err(self.tokenizer.error("Illegal character range")),
                    };

                    let predicate = if !self.has(Flags::CASE_INSENSITIVE) {
                        CharPredicate::Range(c, upper)
                    } else if self.has(Flags::UNICODE_CASE) {
                        CharPredicate::RangeU(c, upper)
                    } else {
                        CharPredicate::RangeI(c, upper)
                    };
                    return Ok(ClassItem::Predicate(predicate));
                }
            }
        }

        Ok(self.bits_or_single(bits, c))
    }

    fn bits_or_single(&mut self, bits: &mut BitClass, c: char) -> ClassItem {
        // these characters have case variants above U+00FF
        let has_wide_case_variant = self.has(Flags::CASE_INSENSITIVE)
            && self.has(Flags::UNICODE_CASE)
            && matches!(
                c,
                '\u{FF}' | '\u{B5}' | 'I' | 'i' | 'S' | 's' | 'K' | 'k' | '\u{C5}' | '\u{E5}'
            );

        if (c as u32) < 256 && !has_wide_case_variant {
            bits.add(c, self.tokenizer.flags);
            ClassItem::Bits
        } else {
            ClassItem::Predicate(self.new_single(c))
        }
    }

    /// `\pX`, `\p{Name}` and the complements `\PX`, `\P{Name}`.
    /// The cursor is at the `p` or `P`.
    fn family(&mut self, complement: bool) -> Result<CharPredicate, RegexError> {
        let name: String = if self.tokenizer.peek_char_at(1) == Some('{') {
            self.tokenizer.set_cursor(self.tokenizer.cursor() + 2);
            let start = self.tokenizer.cursor();
            loop {
                match self.tokenizer.next_char_raw() {
                    Some('}') => break,
                    Some(_) => {}
                    None => return Err(self.tokenizer.error("Unclosed character family")),
                }
            }
            let end = self.tokenizer.cursor() - 1;
            if start == end {
                return Err(self.tokenizer.error("Empty character family"));
            }
            self.tokenizer.chars()[start..end].iter().collect()
        } else {
            self.tokenizer.set_cursor(self.tokenizer.cursor() + 1);
            self.tokenizer
                .next_char_raw()
                .map(|c| c.to_string())
                .unwrap_or_default()
        };

        let predicate = resolve_property(&name, self.tokenizer.flags)
            .map_err(|message| self.tokenizer.error(&message))?;

        Ok(if complement {
            predicate.complement()
        } else {
            predicate
        })
    }

    /// The name of a named group or a named back reference,
    /// the trailing `>` is consumed.
    fn group_name(&mut self) -> Result<String, RegexError> {
        let mut name = String::new();
        let mut ch = self.tokenizer.next_char();
        while let Some(c) = ch.filter(|c| c.is_ascii_alphanumeric()) {
            name.push(c);
            ch = self.tokenizer.next_char();
        }

        if name.is_empty() {
            return Err(self
                .tokenizer
                .error("named capturing group has 0 length name"));
        }

        if ch != Some('>') {
            return Err(self
                .tokenizer
                .error("named capturing group is missing trailing '>'"));
        }

        Ok(name)
    }

    /// Returns `(head, tail)`.
    fn create_group(&mut self, capturing: bool, name: Option<&str>) -> (NodeId, NodeId) {
        let local = self.program.local_count;
        self.program.local_count += 1;

        let group = if capturing {
            Some(self.program.registry.register(name))
        } else {
            None
        };

        let head = self.add(NodeKind::GroupHead { local });
        let tail = self.add(NodeKind::GroupTail { local, group });
        (head, tail)
    }

    /// Parse the body of a group into the chain `head -> body -> tail`.
    fn group_body(&mut self, head: NodeId, tail: NodeId) -> Result<(), RegexError> {
        let body = self.expr(tail)?;
        self.program.set_next(head, body);
        Ok(())
    }

    /// A group and its quantifier, the cursor is at the `(`.
    ///
    /// Returns `None` for a pure inline modifier group such as `(?i)`,
    /// otherwise `(head, tail)`.
    fn group0(&mut self) -> Result<Option<(NodeId, NodeId)>, RegexError> {
        let saved_flags = self.tokenizer.flags;

        let head: NodeId;
        let tail: NodeId;

        if self.tokenizer.advance_and_peek() == Some('?') {
            match self.tokenizer.skip() {
                Some(':') => {
                    let group = self.create_group(false, None);
                    head = group.0;
                    tail = group.1;
                    self.group_body(head, tail)?;
                }
                Some(c @ ('=' | '!')) => {
                    let (cond, cond_tail) = self.create_group(false, None);
                    self.group_body(cond, cond_tail)?;
                    let kind = if c == '=' {
                        NodeKind::Pos { cond }
                    } else {
                        NodeKind::Neg { cond }
                    };
                    head = self.add(kind);
                    tail = head;
                }
                Some('>') => {
                    let (atom, atom_tail) = self.create_group(false, None);
                    self.group_body(atom, atom_tail)?;
                    head = self.add(NodeKind::Ques {
                        atom,
                        ques_type: QuesType::Independent,
                    });
                    tail = head;
                }
                Some('<') => {
                    if matches!(self.tokenizer.peek_char(), Some(c) if c.is_ascii_alphabetic()) {
                        let name = self.group_name()?;
                        if self.program.registry.is_defined(&name) {
                            return Err(self.tokenizer.error(&format!(
                                "Named capturing group <{}> is already defined",
                                name
                            )));
                        }

                        let is_marker = self.tokenizer.peek_char() == Some(')');
                        match marker_kind(&name) {
                            Some(kind) if is_marker => {
                                let group = self.program.registry.register(Some(&name));
                                head = self.add(NodeKind::Marker { kind, group });
                                tail = head;
                            }
                            _ => {
                                let group = self.create_group(true, Some(&name));
                                head = group.0;
                                tail = group.1;
                                self.group_body(head, tail)?;
                            }
                        }
                    } else {
                        let c = self.tokenizer.next_char();
                        let (cond, cond_tail) = self.create_group(false, None);
                        self.group_body(cond, cond_tail)?;
                        self.program.set_next(cond_tail, LOOKBEHIND_END);

                        let mut info = TreeInfo::new();
                        self.program.study(cond, &mut info);
                        if !info.max_valid {
                            return Err(self.tokenizer.error(
                                "Look-behind group does not have an obvious maximum length",
                            ));
                        }

                        let (min, max) = (info.min_length, info.max_length);
                        let kind = match c {
                            Some('=') => NodeKind::Behind { cond, min, max },
                            Some('!') => NodeKind::NotBehind { cond, min, max },
                            _ => return Err(self.tokenizer.error("Unknown look-behind group")),
                        };
                        head = self.add(kind);
                        tail = head;
                    }
                }
                Some('$' | '@') => return Err(self.tokenizer.error("Unknown group type")),
                _ => {
                    // inline modifiers, e.g. `(?i)` and `(?i-m:...)`
                    self.tokenizer.unread();
                    self.add_flags();
                    match self.tokenizer.next_char() {
                        Some(')') => return Ok(None),
                        Some(':') => {}
                        _ => return Err(self.tokenizer.error("Unknown inline modifier")),
                    }
                    let group = self.create_group(false, None);
                    head = group.0;
                    tail = group.1;
                    self.group_body(head, tail)?;
                }
            }
        } else {
            let group = self.create_group(true, None);
            head = group.0;
            tail = group.1;
            self.group_body(head, tail)?;
        }

        self.tokenizer.expect_char(')', "Unclosed group")?;
        self.tokenizer.flags = saved_flags;

        let Some(quantifier) = self.parse_quantifier()? else {
            return Ok(Some((head, tail)));
        };

        // a zero length assertion
        if head == tail {
            let node = self.apply_quantifier(head, quantifier);
            return Ok(Some((node, node)));
        }

        match quantifier {
            Quantifier::Ques(Greediness::Possessive)
            | Quantifier::Curly {
                greediness: Greediness::Possessive,
                ..
            } => {
                let node = self.apply_quantifier(head, quantifier);
                Ok(Some((node, node)))
            }
            Quantifier::Ques(greediness) => {
                let conn = self.add(NodeKind::BranchConn);
                self.program.set_next(tail, conn);
                let atoms = if greediness == Greediness::Greedy {
                    vec![Some(head), None]
                } else {
                    vec![None, Some(head)]
                };
                let branch = self.add(NodeKind::Branch { atoms, conn });
                Ok(Some((branch, conn)))
            }
            Quantifier::Curly {
                min,
                max,
                greediness,
            } => {
                let mut info = TreeInfo::new();
                if self.program.study(head, &mut info) {
                    // every iteration has the same length
                    let NodeKind::GroupTail { local, group } = *self.program.kind(tail) else {
                        return Err(self.tokenizer.error("Internal logic error"));
                    };
                    let atom = self.program.next_of(head);
                    let node = self.add(NodeKind::GroupCurly {
                        atom,
                        min,
                        max,
                        greediness,
                        local,
                        group,
                    });
                    Ok(Some((node, node)))
                } else {
                    let NodeKind::GroupHead { local: begin_local } = *self.program.kind(head)
                    else {
                        return Err(self.tokenizer.error("Internal logic error"));
                    };

                    let count_local = self.program.local_count;
                    self.program.local_count += 1;

                    let looper = self.add(NodeKind::Loop {
                        body: head,
                        count_local,
                        begin_local,
                        min,
                        max,
                        lazy: greediness == Greediness::Lazy,
                    });
                    self.program.set_next(tail, looper);
                    let prolog = self.add(NodeKind::Prolog { looper });
                    Ok(Some((prolog, looper)))
                }
            }
        }
    }

    fn add_flags(&mut self) {
        while let Some(c) = self.tokenizer.peek_char() {
            if c == '-' {
                self.tokenizer.advance_and_peek();
                self.sub_flags();
                return;
            }
            match Flags::from_letter(c) {
                Some(flag) => {
                    self.tokenizer.flags |= flag;
                    self.tokenizer.advance_and_peek();
                }
                None => return,
            }
        }
    }

    fn sub_flags(&mut self) {
        while let Some(flag) = self.tokenizer.peek_char().and_then(Flags::from_letter) {
            self.tokenizer.flags &= !flag;
            self.tokenizer.advance_and_peek();
        }
    }

    fn new_single(&self, c: char) -> CharPredicate {
        if self.has(Flags::CASE_INSENSITIVE) {
            if self.has(Flags::UNICODE_CASE) {
                let upper = simple_uppercase(c);
                let lower = simple_lowercase(upper);
                if upper != lower {
                    return CharPredicate::SingleU(lower);
                }
            } else if c.is_ascii_alphabetic() {
                return CharPredicate::SingleI(c.to_ascii_lowercase());
            }
        }
        CharPredicate::Single(c)
    }

    fn new_slice(&mut self, chars: Vec<char>) -> NodeId {
        let (chars, fold) = if !self.has(Flags::CASE_INSENSITIVE) {
            (chars, CaseFold::Sensitive)
        } else if self.has(Flags::UNICODE_CASE) {
            (
                chars.into_iter().map(fold_case).collect(),
                CaseFold::Unicode,
            )
        } else {
            (
                chars.into_iter().map(|c| c.to_ascii_lowercase()).collect(),
                CaseFold::Ascii,
            )
        };
        self.add(NodeKind::Slice { chars, fold })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        charproperty::CharPredicate,
        error::RegexError,
        flags::Flags,
        node::{CaseFold, Greediness, NodeKind, QuesType, ACCEPT},
    };

    use super::compile;

    fn error_message(pattern: &str) -> String {
        match compile(pattern, Flags::empty()) {
            Err(RegexError::Syntax { message, .. }) => message,
            Err(e) => panic!("unexpected error {:?}", e),
            Ok(_) => panic!("pattern {:?} should not compile", pattern),
        }
    }

    #[test]
    fn test_compile_literal() {
        // a short literal is searched with `Start`
        {
            let program = compile("abc", Flags::empty()).unwrap();
            assert_eq!(
                program.kind(program.match_root),
                &NodeKind::Slice {
                    chars: vec!['a', 'b', 'c'],
                    fold: CaseFold::Sensitive
                }
            );
            assert_eq!(program.next_of(program.match_root), ACCEPT);
            assert_eq!(
                program.kind(program.root),
                &NodeKind::Start { min_length: 3 }
            );
        }

        // a long literal is searched with Boyer-Moore
        {
            let program = compile("hello", Flags::empty()).unwrap();
            assert_eq!(program.kind(program.root).name(), "BoyerMoore");
            assert_eq!(program.next_of(program.root), ACCEPT);
        }

        // case-insensitive literals are stored in lower case
        {
            let program = compile("HeLLo", Flags::CASE_INSENSITIVE).unwrap();
            assert_eq!(
                program.kind(program.match_root),
                &NodeKind::Slice {
                    chars: "hello".chars().collect(),
                    fold: CaseFold::Ascii
                }
            );
            assert_eq!(program.kind(program.root).name(), "Start");
        }

        // literal mode
        {
            let program = compile("a.b*", Flags::LITERAL).unwrap();
            assert_eq!(
                program.kind(program.match_root),
                &NodeKind::Slice {
                    chars: "a.b*".chars().collect(),
                    fold: CaseFold::Sensitive
                }
            );
        }

        // the quantifier applies to the last character
        {
            let program = compile("abc+", Flags::empty()).unwrap();
            let root = program.match_root;
            assert_eq!(
                program.kind(root),
                &NodeKind::Slice {
                    chars: vec!['a', 'b'],
                    fold: CaseFold::Sensitive
                }
            );
            let curly = program.next_of(root);
            match program.kind(curly) {
                NodeKind::Curly {
                    atom,
                    min: 1,
                    greediness: Greediness::Greedy,
                    ..
                } => {
                    assert_eq!(
                        program.kind(*atom),
                        &NodeKind::Char(CharPredicate::Single('c'))
                    );
                }
                other => panic!("unexpected node {:?}", other),
            }
        }
    }

    #[test]
    fn test_compile_anchors() {
        let program = compile("^a", Flags::empty()).unwrap();
        assert_eq!(program.kind(program.match_root), &NodeKind::Begin);
        assert_eq!(program.root, program.match_root);

        let program = compile("^a", Flags::MULTILINE).unwrap();
        assert_eq!(
            program.kind(program.match_root),
            &NodeKind::Caret { unix_lines: false }
        );
        assert_eq!(program.kind(program.root).name(), "Start");
    }

    #[test]
    fn test_compile_groups() {
        // capturing and named groups are numbered by their open parenthesis
        {
            let program = compile("(a)(?<year>b)(?:c)((d))", Flags::empty()).unwrap();
            assert_eq!(program.group_count(), 5);
            assert_eq!(program.registry.index_of("year"), Some(2));
        }

        // a deterministic group repetition
        {
            let program = compile("(ab)+", Flags::empty()).unwrap();
            assert_eq!(program.kind(program.match_root).name(), "GroupCurly");
        }

        // a group with alternatives needs the general loop
        {
            let program = compile("(a|bc)+", Flags::empty()).unwrap();
            assert_eq!(program.kind(program.match_root).name(), "Prolog");
        }

        // an optional group becomes a branch
        {
            let program = compile("(a)??", Flags::empty()).unwrap();
            match program.kind(program.match_root) {
                NodeKind::Branch { atoms, .. } => {
                    assert_eq!(atoms.len(), 2);
                    assert!(atoms[0].is_none());
                }
                other => panic!("unexpected node {:?}", other),
            }
        }

        // atomic group
        {
            let program = compile("(?>ab)", Flags::empty()).unwrap();
            match program.kind(program.match_root) {
                NodeKind::Ques { ques_type, .. } => {
                    assert_eq!(*ques_type, QuesType::Independent)
                }
                other => panic!("unexpected node {:?}", other),
            }
        }

        // lookbehind records its length bounds
        {
            let program = compile("(?<=a{1,4})b", Flags::empty()).unwrap();
            match program.kind(program.match_root) {
                NodeKind::Behind { min, max, .. } => {
                    assert_eq!((*min, *max), (1, 4));
                }
                other => panic!("unexpected node {:?}", other),
            }
        }
    }

    #[test]
    fn test_compile_alternation() {
        let program = compile("a|bc|", Flags::empty()).unwrap();
        match program.kind(program.match_root) {
            NodeKind::Branch { atoms, conn } => {
                assert_eq!(atoms.len(), 3);
                assert!(atoms[0].is_some());
                assert!(atoms[1].is_some());
                assert!(atoms[2].is_none());
                assert_eq!(program.next_of(*conn), ACCEPT);
            }
            other => panic!("unexpected node {:?}", other),
        }
    }

    #[test]
    fn test_compile_back_references() {
        let back_ref_of = |pattern: &str, flags: Flags| {
            let program = compile(pattern, flags).unwrap();
            let mut id = program.match_root;
            while id != ACCEPT {
                if let NodeKind::BackRef { group, fold } = program.kind(id) {
                    return Some((*group, *fold));
                }
                id = program.next_of(id);
            }
            None
        };

        // the digits are taken while the number is a defined group
        assert_eq!(
            back_ref_of("(a)\\11", Flags::empty()),
            Some((1, CaseFold::Sensitive))
        );

        // named back reference
        assert_eq!(
            back_ref_of("(?<x>a)\\k<x>", Flags::CASE_INSENSITIVE),
            Some((1, CaseFold::Ascii))
        );

        assert_eq!(
            back_ref_of("(a)\\1", Flags::CASE_INSENSITIVE | Flags::UNICODE_CASE),
            Some((1, CaseFold::Unicode))
        );
    }

    #[test]
    fn test_compile_classes() {
        let class_of = |pattern: &str, flags: Flags| -> CharPredicate {
            let program = compile(pattern, flags).unwrap();
            match program.kind(program.match_root) {
                NodeKind::Char(predicate) => predicate.clone(),
                other => panic!("unexpected node {:?}", other),
            }
        };

        // union, ranges and negation
        {
            let p = class_of("[a-cx]", Flags::empty());
            assert!(p.is_match('b'));
            assert!(p.is_match('x'));
            assert!(!p.is_match('d'));

            let p = class_of("[^a-cx]", Flags::empty());
            assert!(!p.is_match('b'));
            assert!(!p.is_match('x'));
            assert!(p.is_match('d'));
        }

        // intersection and nested classes
        {
            let p = class_of("[a-z&&[^aeiou]]", Flags::empty());
            assert!(p.is_match('b'));
            assert!(!p.is_match('e'));
            assert!(!p.is_match('B'));

            let p = class_of("[a-d&&c-f]", Flags::empty());
            assert!(p.is_match('c'));
            assert!(p.is_match('d'));
            assert!(!p.is_match('a'));
            assert!(!p.is_match('f'));

            let p = class_of("[ab[xy]]", Flags::empty());
            assert!(p.is_match('a'));
            assert!(p.is_match('y'));
            assert!(!p.is_match('c'));
        }

        // literal ']' and '&' and '^'
        {
            let p = class_of("[]a]", Flags::empty());
            assert!(p.is_match(']'));
            assert!(p.is_match('a'));

            let p = class_of("[a&b^]", Flags::empty());
            assert!(p.is_match('&'));
            assert!(p.is_match('^'));
        }

        // escapes and properties
        {
            let p = class_of("[\\d\\p{Lu}_]", Flags::empty());
            assert!(p.is_match('7'));
            assert!(p.is_match('Q'));
            assert!(p.is_match('_'));
            assert!(!p.is_match('q'));

            let p = class_of("[\\v-\\x0D]", Flags::empty());
            assert!(p.is_match('\u{0C}'));
            assert!(!p.is_match('\n'));
        }

        // case-insensitive
        {
            let p = class_of("[a-c]", Flags::CASE_INSENSITIVE);
            assert!(p.is_match('B'));

            let p = class_of("[k]", Flags::CASE_INSENSITIVE | Flags::UNICODE_CASE);
            assert!(p.is_match('K'));
            assert!(p.is_match('\u{212A}'));
        }

        // predefined classes switch to Unicode
        {
            let p = class_of("\\w", Flags::empty());
            assert!(!p.is_match('é'));
            let p = class_of("\\w", Flags::UNICODE_CHARACTER_CLASS);
            assert!(p.is_match('é'));
        }
    }

    #[test]
    fn test_compile_inline_flags() {
        // the flags apply to the rest of the enclosing group
        {
            let program = compile("a(?i)b", Flags::empty()).unwrap();
            let second = program.next_of(program.match_root);
            assert_eq!(
                program.kind(second),
                &NodeKind::Char(CharPredicate::SingleI('b'))
            );
        }

        // the flags are restored after a group
        {
            let program = compile("(?i:a)b", Flags::empty()).unwrap();
            let mut id = program.match_root;
            let mut singles = vec![];
            while id != ACCEPT {
                if let NodeKind::Char(p) = program.kind(id) {
                    singles.push(p.clone());
                }
                id = program.next_of(id);
            }
            assert_eq!(singles.last(), Some(&CharPredicate::Single('b')));
        }

        // comments mode
        {
            let program = compile("a b # comment\n c", Flags::COMMENTS).unwrap();
            assert_eq!(
                program.kind(program.match_root),
                &NodeKind::Slice {
                    chars: vec!['a', 'b', 'c'],
                    fold: CaseFold::Sensitive
                }
            );
        }
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(error_message("*a"), "Dangling meta character '*'");
        assert_eq!(error_message("a(b"), "Unclosed group");
        assert_eq!(error_message("a)b"), "Unmatched closing ')'");
        assert_eq!(error_message("[ab"), "Unclosed character class");
        assert_eq!(error_message("[z-a]"), "Illegal character range");
        assert_eq!(error_message("a{2"), "Unclosed counted closure");
        assert_eq!(error_message("a{3,2}"), "Illegal repetition range");
        assert_eq!(error_message("a{x}"), "Illegal repetition");
        assert_eq!(error_message("\\y"), "Illegal/unsupported escape sequence");
        assert_eq!(error_message("[\\b]"), "Illegal/unsupported escape sequence");
        assert_eq!(
            error_message("\\p{Foo}"),
            "Unknown character property name {Foo}"
        );
        assert_eq!(error_message("\\p{IsFoo}"), "Unknown character script name {Foo}");
        assert_eq!(error_message("\\p{InFoo}"), "Unknown character block name {Foo}");
        assert_eq!(error_message("\\p{L"), "Unclosed character family");
        assert_eq!(error_message("\\p{}"), "Empty character family");
        assert_eq!(
            error_message("(?<a>x)(?<a>y)"),
            "Named capturing group <a> is already defined"
        );
        assert_eq!(
            error_message("(?<a x)"),
            "named capturing group is missing trailing '>'"
        );
        assert_eq!(
            error_message("\\k<b>"),
            "named capturing group <b> does not exist"
        );
        assert_eq!(
            error_message("\\kb"),
            "\\k is not followed by '<' for named capturing group"
        );
        assert_eq!(
            error_message("(?<=a+)b"),
            "Look-behind group does not have an obvious maximum length"
        );
        assert_eq!(error_message("(?$a)"), "Unknown group type");
        assert_eq!(error_message("(?q)"), "Unknown inline modifier");
    }

    #[test]
    fn test_compile_error_offset() {
        let e = compile("ab(c", Flags::empty()).unwrap_err();
        assert_eq!(
            e,
            RegexError::Syntax {
                message: "Unclosed group".to_owned(),
                pattern: "ab(c".to_owned(),
                offset: 3
            }
        );
    }
}
