// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::Display;

use crate::node::{
    CaseFold, Greediness, MarkerKind, Node, NodeKind, Program, QuesType, MAX_REPETITIONS,
};

impl Display for Greediness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Greediness::Greedy => f.write_str("greedy"),
            Greediness::Lazy => f.write_str("lazy"),
            Greediness::Possessive => f.write_str("possessive"),
        }
    }
}

impl Display for QuesType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuesType::Greedy => f.write_str("greedy"),
            QuesType::Lazy => f.write_str("lazy"),
            QuesType::Possessive => f.write_str("possessive"),
            QuesType::Independent => f.write_str("independent"),
        }
    }
}

impl Display for CaseFold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseFold::Sensitive => f.write_str("sensitive"),
            CaseFold::Ascii => f.write_str("ascii"),
            CaseFold::Unicode => f.write_str("unicode"),
        }
    }
}

impl Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerKind::OpenParen => f.write_str("open_paren"),
            MarkerKind::CloseParen => f.write_str("close_paren"),
            MarkerKind::Quote => f.write_str("quote"),
        }
    }
}

fn range_to_string(min: usize, max: usize) -> String {
    if max == MAX_REPETITIONS {
        format!("{{{},}}", min)
    } else {
        format!("{{{},{}}}", min, max)
    }
}

fn group_to_string(group: Option<usize>) -> String {
    match group {
        Some(index) => format!(" #{}", index),
        None => String::new(),
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = self.name();
        match self {
            NodeKind::Start { min_length } => write!(f, "{} min={}", name, min_length),
            NodeKind::BoyerMoore(bm) => write!(f, "{} {:?}", name, bm),
            NodeKind::Caret { unix_lines } => write!(f, "{} unix_lines={}", name, unix_lines),
            NodeKind::Dollar {
                multiline,
                unix_lines,
            } => write!(
                f,
                "{} multiline={} unix_lines={}",
                name, multiline, unix_lines
            ),
            NodeKind::Char(predicate) => write!(f, "{} {:?}", name, predicate),
            NodeKind::Slice { chars, fold } => {
                let s: String = chars.iter().collect();
                write!(f, "{} \"{}\" {}", name, s, fold)
            }
            NodeKind::Ques { atom, ques_type } => {
                write!(f, "{} atom={} {}", name, atom, ques_type)
            }
            NodeKind::Curly {
                atom,
                min,
                max,
                greediness,
            } => write!(
                f,
                "{} atom={} {} {}",
                name,
                atom,
                range_to_string(*min, *max),
                greediness
            ),
            NodeKind::GroupCurly {
                atom,
                min,
                max,
                greediness,
                local,
                group,
            } => write!(
                f,
                "{} atom={} {} {} local={}{}",
                name,
                atom,
                range_to_string(*min, *max),
                greediness,
                local,
                group_to_string(*group)
            ),
            NodeKind::Branch { atoms, conn } => {
                let s: Vec<String> = atoms
                    .iter()
                    .map(|atom| match atom {
                        Some(id) => id.to_string(),
                        None => "-".to_owned(),
                    })
                    .collect();
                write!(f, "{} [{}] conn={}", name, s.join(", "), conn)
            }
            NodeKind::GroupHead { local } => write!(f, "{} local={}", name, local),
            NodeKind::GroupTail { local, group } => {
                write!(f, "{} local={}{}", name, local, group_to_string(*group))
            }
            NodeKind::Prolog { looper } => write!(f, "{} loop={}", name, looper),
            NodeKind::Loop {
                body,
                count_local,
                begin_local,
                min,
                max,
                lazy,
            } => write!(
                f,
                "{} body={} {}{} count={} begin={}",
                name,
                body,
                range_to_string(*min, *max),
                if *lazy { " lazy" } else { "" },
                count_local,
                begin_local
            ),
            NodeKind::BackRef { group, fold } => write!(f, "{} #{} {}", name, group, fold),
            NodeKind::Pos { cond } | NodeKind::Neg { cond } => {
                write!(f, "{} cond={}", name, cond)
            }
            NodeKind::Behind { cond, min, max } | NodeKind::NotBehind { cond, min, max } => {
                write!(f, "{} cond={} {}", name, cond, range_to_string(*min, *max))
            }
            NodeKind::Bound { negated, unicode } => {
                write!(f, "{} negated={} unicode={}", name, negated, unicode)
            }
            NodeKind::Marker { kind, group } => write!(f, "{} {} #{}", name, kind, group),
            NodeKind::Accept
            | NodeKind::Return
            | NodeKind::LookbehindEnd
            | NodeKind::Begin
            | NodeKind::End
            | NodeKind::LastMatch
            | NodeKind::LineEnding
            | NodeKind::BranchConn => f.write_str(name),
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            NodeKind::Accept | NodeKind::Return | NodeKind::LookbehindEnd => {
                write!(f, "{}", self.kind)
            }
            _ => write!(f, "{} -> {}", self.kind, self.next),
        }
    }
}

/// One line per node, e.g.
///
/// ```text
/// root: 5, match root: 4
/// 0: Accept
/// 1: Return
/// 2: LookbehindEnd
/// 3: Slice "ab" sensitive -> 0
/// ...
/// ```
impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "root: {}, match root: {}", self.root, self.match_root)?;
        for (id, node) in self.nodes.iter().enumerate() {
            writeln!(f, "{}: {}", id, node)?;
        }
        Ok(())
    }
}
