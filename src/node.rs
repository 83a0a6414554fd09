// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::{
    boyermoore::BoyerMoore, charproperty::CharPredicate, flags::Flags, registry::GroupRegistry,
};

/// Index of a node in `Program::nodes`.
pub type NodeId = usize;

/// The accepting node of the whole pattern.
pub const ACCEPT: NodeId = 0;

/// The terminator of a sub-chain, e.g. the atom of a quantifier or
/// the condition of a lookahead. It records the end position and succeeds.
pub const RETURN: NodeId = 1;

/// The terminator of a lookbehind condition, it succeeds only
/// at the position where the lookbehind was encountered.
pub const LOOKBEHIND_END: NodeId = 2;

/// The upper bound of the unbounded quantifiers.
pub const MAX_REPETITIONS: usize = usize::MAX;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub next: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Greediness {
    Greedy,
    Lazy,
    Possessive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuesType {
    Greedy,
    Lazy,
    Possessive,

    /// `(?>...)`, the atom is matched once and never backtracked into.
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseFold {
    Sensitive,
    Ascii,
    Unicode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    OpenParen,
    CloseParen,
    Quote,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Accept,
    Return,
    LookbehindEnd,

    /// Tries the next node at every position, used when the
    /// pattern can start anywhere.
    Start {
        min_length: usize,
    },

    /// Like `Start`, but searches the leading literal with Boyer-Moore.
    /// The next node is the one following the literal.
    BoyerMoore(BoyerMoore),

    /// `\A`, and `^` without `MULTILINE`
    Begin,

    /// `\z`
    End,

    /// `^` with `MULTILINE`
    Caret {
        unix_lines: bool,
    },

    /// `$`, and `\Z` (never multiline)
    Dollar {
        multiline: bool,
        unix_lines: bool,
    },

    /// `\G`
    LastMatch,

    /// `\R`
    LineEnding,

    Char(CharPredicate),

    /// A literal string.
    /// The chars are stored in lower case (or folded) when case-insensitive.
    Slice {
        chars: Vec<char>,
        fold: CaseFold,
    },

    /// `?` and atomic groups
    Ques {
        atom: NodeId,
        ques_type: QuesType,
    },

    /// Repetition of a single node, or of a possessive group.
    Curly {
        atom: NodeId,
        min: usize,
        max: usize,
        greediness: Greediness,
    },

    /// Repetition of a deterministic group, i.e. a group whose iterations
    /// all have the same length.
    GroupCurly {
        atom: NodeId,
        min: usize,
        max: usize,
        greediness: Greediness,
        local: usize,
        group: Option<usize>,
    },

    /// Alternation. A `None` atom goes to the continuation directly.
    Branch {
        atoms: Vec<Option<NodeId>>,
        conn: NodeId,
    },

    /// The join point of the atoms of a branch.
    BranchConn,

    GroupHead {
        local: usize,
    },

    GroupTail {
        local: usize,
        group: Option<usize>,
    },

    /// The entry of a non-deterministic group repetition.
    Prolog {
        looper: NodeId,
    },

    /// The repetition count of a non-deterministic group repetition,
    /// the tail of the body goes back to this node.
    Loop {
        body: NodeId,
        count_local: usize,
        begin_local: usize,
        min: usize,
        max: usize,
        lazy: bool,
    },

    BackRef {
        group: usize,
        fold: CaseFold,
    },

    /// `(?=...)`
    Pos {
        cond: NodeId,
    },

    /// `(?!...)`
    Neg {
        cond: NodeId,
    },

    /// `(?<=...)`, `min` and `max` are the lengths (in characters) of the condition.
    Behind {
        cond: NodeId,
        min: usize,
        max: usize,
    },

    /// `(?<!...)`
    NotBehind {
        cond: NodeId,
        min: usize,
        max: usize,
    },

    /// `\b` and `\B`
    Bound {
        negated: bool,
        unicode: bool,
    },

    /// The enhanced assertions. A marker records the position it is
    /// passed at in the capture list of its group.
    Marker {
        kind: MarkerKind,
        group: usize,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Accept => "Accept",
            NodeKind::Return => "Return",
            NodeKind::LookbehindEnd => "LookbehindEnd",
            NodeKind::Start { .. } => "Start",
            NodeKind::BoyerMoore(_) => "BoyerMoore",
            NodeKind::Begin => "Begin",
            NodeKind::End => "End",
            NodeKind::Caret { .. } => "Caret",
            NodeKind::Dollar { .. } => "Dollar",
            NodeKind::LastMatch => "LastMatch",
            NodeKind::LineEnding => "LineEnding",
            NodeKind::Char(_) => "Char",
            NodeKind::Slice { .. } => "Slice",
            NodeKind::Ques { .. } => "Ques",
            NodeKind::Curly { .. } => "Curly",
            NodeKind::GroupCurly { .. } => "GroupCurly",
            NodeKind::Branch { .. } => "Branch",
            NodeKind::BranchConn => "BranchConn",
            NodeKind::GroupHead { .. } => "GroupHead",
            NodeKind::GroupTail { .. } => "GroupTail",
            NodeKind::Prolog { .. } => "Prolog",
            NodeKind::Loop { .. } => "Loop",
            NodeKind::BackRef { .. } => "BackRef",
            NodeKind::Pos { .. } => "Pos",
            NodeKind::Neg { .. } => "Neg",
            NodeKind::Behind { .. } => "Behind",
            NodeKind::NotBehind { .. } => "NotBehind",
            NodeKind::Bound { .. } => "Bound",
            NodeKind::Marker { .. } => "Marker",
        }
    }
}

/// The result of the static length study of a chain of nodes.
///
/// Lengths are counted in characters.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeInfo {
    pub min_length: usize,
    pub max_length: usize,
    pub max_valid: bool,

    /// All nodes of the chain have a fixed length.
    pub deterministic: bool,
}

impl Default for TreeInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeInfo {
    pub fn new() -> Self {
        TreeInfo {
            min_length: 0,
            max_length: 0,
            max_valid: true,
            deterministic: true,
        }
    }

    pub fn reset(&mut self) {
        *self = TreeInfo::new();
    }
}

/// A compiled pattern.
///
/// The nodes form a chain with branch points, every node has exactly one
/// `next` but a node may be the `next` of several nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub nodes: Vec<Node>,

    /// The entry used for searching.
    pub root: NodeId,

    /// The entry used for matching at a fixed position.
    pub match_root: NodeId,

    pub registry: GroupRegistry,

    /// The number of local slots (group starts and loop counters)
    /// a matcher has to allocate.
    pub local_count: usize,

    pub flags: Flags,
}

impl Program {
    pub fn new() -> Self {
        let mut program = Program {
            nodes: vec![],
            root: ACCEPT,
            match_root: ACCEPT,
            registry: GroupRegistry::new(),
            local_count: 0,
            flags: Flags::empty(),
        };

        // the three shared terminal nodes
        program.add_node(NodeKind::Accept);
        program.add_node(NodeKind::Return);
        program.add_node(NodeKind::LookbehindEnd);
        program
    }

    /// Add a node, its `next` defaults to `RETURN`.
    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node { kind, next: RETURN });
        self.nodes.len() - 1
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn next_of(&self, id: NodeId) -> NodeId {
        self.nodes[id].next
    }

    pub fn set_next(&mut self, id: NodeId, next: NodeId) {
        self.nodes[id].next = next;
    }

    pub fn group_count(&self) -> usize {
        self.registry.group_count()
    }

    /// Walk the chain from `id` accumulating the length information into `info`.
    ///
    /// Returns whether the chain is deterministic.
    pub fn study(&self, id: NodeId, info: &mut TreeInfo) -> bool {
        let node = &self.nodes[id];
        match &node.kind {
            NodeKind::Accept | NodeKind::Return | NodeKind::LookbehindEnd | NodeKind::BranchConn => {
                info.deterministic
            }
            NodeKind::Start { .. } => {
                self.study(node.next, info);
                info.max_valid = false;
                info.deterministic = false;
                false
            }
            NodeKind::BoyerMoore(bm) => {
                info.min_length = info.min_length.saturating_add(bm.char_count());
                info.max_valid = false;
                self.study(node.next, info)
            }
            NodeKind::Char(_) => {
                info.min_length = info.min_length.saturating_add(1);
                info.max_length = info.max_length.saturating_add(1);
                self.study(node.next, info)
            }
            NodeKind::Slice { chars, .. } => {
                info.min_length = info.min_length.saturating_add(chars.len());
                info.max_length = info.max_length.saturating_add(chars.len());
                self.study(node.next, info)
            }
            NodeKind::LineEnding => {
                info.min_length = info.min_length.saturating_add(1);
                info.max_length = info.max_length.saturating_add(2);
                self.study(node.next, info)
            }
            NodeKind::Ques { atom, ques_type } => {
                if *ques_type == QuesType::Independent {
                    self.study(*atom, info);
                } else {
                    let min_length = info.min_length;
                    self.study(*atom, info);
                    info.min_length = min_length;
                    info.deterministic = false;
                }
                self.study(node.next, info)
            }
            NodeKind::Curly { atom, min, max, .. }
            | NodeKind::GroupCurly { atom, min, max, .. } => {
                self.study_repetition(*atom, *min, *max, info);
                self.study(node.next, info)
            }
            NodeKind::Branch { atoms, conn } => {
                let mut min_length = info.min_length;
                let mut max_length = info.max_length;
                let mut max_valid = info.max_valid;

                let mut branch_min = usize::MAX;
                let mut branch_max = 0;
                for atom in atoms {
                    info.reset();
                    if let Some(id) = atom {
                        self.study(*id, info);
                    }
                    branch_min = branch_min.min(info.min_length);
                    branch_max = branch_max.max(info.max_length);
                    max_valid &= info.max_valid;
                }

                min_length = min_length.saturating_add(branch_min);
                max_length = max_length.saturating_add(branch_max);

                info.reset();
                self.study(self.nodes[*conn].next, info);
                info.min_length = info.min_length.saturating_add(min_length);
                info.max_length = info.max_length.saturating_add(max_length);
                info.max_valid &= max_valid;
                info.deterministic = false;
                false
            }
            NodeKind::Prolog { .. } | NodeKind::Loop { .. } => {
                info.max_valid = false;
                info.deterministic = false;
                false
            }
            NodeKind::BackRef { .. } => {
                info.max_valid = false;
                self.study(node.next, info)
            }
            // zero-length nodes
            NodeKind::Begin
            | NodeKind::End
            | NodeKind::Caret { .. }
            | NodeKind::Dollar { .. }
            | NodeKind::LastMatch
            | NodeKind::GroupHead { .. }
            | NodeKind::GroupTail { .. }
            | NodeKind::Pos { .. }
            | NodeKind::Neg { .. }
            | NodeKind::Behind { .. }
            | NodeKind::NotBehind { .. }
            | NodeKind::Bound { .. }
            | NodeKind::Marker { .. } => self.study(node.next, info),
        }
    }

    fn study_repetition(&self, atom: NodeId, min: usize, max: usize, info: &mut TreeInfo) {
        let min_length = info.min_length;
        let max_length = info.max_length;
        let max_valid = info.max_valid;
        let deterministic = info.deterministic;

        info.reset();
        self.study(atom, info);

        info.min_length = info
            .min_length
            .saturating_mul(min)
            .saturating_add(min_length);

        if max_valid && info.max_valid {
            match info
                .max_length
                .checked_mul(max)
                .and_then(|n| n.checked_add(max_length))
            {
                Some(n) => info.max_length = n,
                None => info.max_valid = false,
            }
        } else {
            info.max_valid = false;
        }

        if info.deterministic && min == max {
            info.deterministic = deterministic;
        } else {
            info.deterministic = false;
        }
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::charproperty::CharPredicate;

    use super::{Greediness, NodeKind, Program, TreeInfo, RETURN};

    #[test]
    fn test_study_chain() {
        // 'a' "bcd"
        let mut program = Program::new();
        let a = program.add_node(NodeKind::Char(CharPredicate::Single('a')));
        let bcd = program.add_node(NodeKind::Slice {
            chars: vec!['b', 'c', 'd'],
            fold: super::CaseFold::Sensitive,
        });
        program.set_next(a, bcd);
        program.set_next(bcd, RETURN);

        let mut info = TreeInfo::new();
        assert!(program.study(a, &mut info));
        assert_eq!(
            info,
            TreeInfo {
                min_length: 4,
                max_length: 4,
                max_valid: true,
                deterministic: true
            }
        );
    }

    #[test]
    fn test_study_repetition() {
        // a{2,3}
        {
            let mut program = Program::new();
            let a = program.add_node(NodeKind::Char(CharPredicate::Single('a')));
            let curly = program.add_node(NodeKind::Curly {
                atom: a,
                min: 2,
                max: 3,
                greediness: Greediness::Greedy,
            });

            let mut info = TreeInfo::new();
            assert!(!program.study(curly, &mut info));
            assert_eq!(info.min_length, 2);
            assert_eq!(info.max_length, 3);
            assert!(info.max_valid);
        }

        // a{2}
        {
            let mut program = Program::new();
            let a = program.add_node(NodeKind::Char(CharPredicate::Single('a')));
            let curly = program.add_node(NodeKind::Curly {
                atom: a,
                min: 2,
                max: 2,
                greediness: Greediness::Greedy,
            });

            let mut info = TreeInfo::new();
            assert!(program.study(curly, &mut info));
            assert_eq!(info.min_length, 2);
            assert_eq!(info.max_length, 2);
        }

        // a*
        {
            let mut program = Program::new();
            let a = program.add_node(NodeKind::Char(CharPredicate::Single('a')));
            let curly = program.add_node(NodeKind::Curly {
                atom: a,
                min: 0,
                max: super::MAX_REPETITIONS,
                greediness: Greediness::Greedy,
            });

            let mut info = TreeInfo::new();
            program.study(curly, &mut info);
            assert_eq!(info.min_length, 0);
            assert!(!info.max_valid);
        }
    }

    #[test]
    fn test_study_branch() {
        // a|bcd
        let mut program = Program::new();
        let conn = program.add_node(NodeKind::BranchConn);
        let a = program.add_node(NodeKind::Char(CharPredicate::Single('a')));
        let bcd = program.add_node(NodeKind::Slice {
            chars: vec!['b', 'c', 'd'],
            fold: super::CaseFold::Sensitive,
        });
        program.set_next(a, conn);
        program.set_next(bcd, conn);
        let branch = program.add_node(NodeKind::Branch {
            atoms: vec![Some(a), Some(bcd)],
            conn,
        });
        program.set_next(conn, RETURN);

        let mut info = TreeInfo::new();
        assert!(!program.study(branch, &mut info));
        assert_eq!(info.min_length, 1);
        assert_eq!(info.max_length, 3);
        assert!(info.max_valid);
        assert!(!info.deterministic);
    }
}
