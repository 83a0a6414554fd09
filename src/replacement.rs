// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use memchr::memchr2;

use crate::{error::RegexError, registry::GroupRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementPart {
    Literal(String),
    Group(usize),
}

/// A parsed replacement template.
///
/// - `$n` refers to group n, digits are taken as long as the number is
///   still a group of the pattern, e.g. `$12` is group 1 followed by `2` when
///   the pattern has fewer than 12 groups.
/// - `${name}` refers to a named group.
/// - `\x` is the char x, e.g. `\$` and `\\`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub parts: Vec<ReplacementPart>,
}

impl Replacement {
    pub fn parse(template: &str, registry: &GroupRegistry) -> Result<Self, RegexError> {
        // the number of groups, excluding the whole match.
        let group_count = registry.group_count().saturating_sub(1);

        let chars: Vec<char> = template.chars().collect();
        let mut parts = vec![];
        let mut literal = String::new();
        let mut index = 0;

        while index < chars.len() {
            match chars[index] {
                '\\' => {
                    index += 1;
                    let Some(c) = chars.get(index) else {
                        return Err(RegexError::Replacement(
                            "character to be escaped is missing".to_owned(),
                        ));
                    };
                    literal.push(*c);
                    index += 1;
                }
                '$' => {
                    index += 1;
                    let group = match chars.get(index) {
                        None => {
                            return Err(RegexError::Replacement(
                                "group index is missing".to_owned(),
                            ))
                        }
                        Some('{') => {
                            index += 1;
                            let start = index;
                            while index < chars.len() && chars[index].is_ascii_alphanumeric() {
                                index += 1;
                            }
                            let name: String = chars[start..index].iter().collect();

                            if chars.get(index) != Some(&'}') {
                                return Err(RegexError::Replacement(
                                    "named capturing group is missing trailing '}'".to_owned(),
                                ));
                            }
                            index += 1;

                            if name.is_empty() {
                                return Err(RegexError::Replacement(
                                    "named capturing group has 0 length name".to_owned(),
                                ));
                            }
                            if name.starts_with(|c: char| c.is_ascii_digit()) {
                                return Err(RegexError::Replacement(format!(
                                    "capturing group name {{{}}} starts with digit character",
                                    name
                                )));
                            }

                            registry
                                .index_of(&name)
                                .ok_or(RegexError::NoSuchGroupName(name))?
                        }
                        Some(c) => {
                            let Some(first) = c.to_digit(10) else {
                                return Err(RegexError::Replacement(
                                    "Illegal group reference".to_owned(),
                                ));
                            };
                            index += 1;

                            let mut number = first as usize;
                            while let Some(digit) = chars.get(index).and_then(|c| c.to_digit(10)) {
                                let extended = number * 10 + digit as usize;
                                if extended > group_count {
                                    break;
                                }
                                number = extended;
                                index += 1;
                            }

                            if number > group_count {
                                return Err(RegexError::GroupIndexOutOfRange(number));
                            }
                            number
                        }
                    };

                    if !literal.is_empty() {
                        parts.push(ReplacementPart::Literal(std::mem::take(&mut literal)));
                    }
                    parts.push(ReplacementPart::Group(group));
                }
                c => {
                    literal.push(c);
                    index += 1;
                }
            }
        }

        if !literal.is_empty() {
            parts.push(ReplacementPart::Literal(literal));
        }

        Ok(Replacement { parts })
    }

    /// Append the expansion to `output`, `group_text` gives the text of a group,
    /// `None` for a group that did not participate in the match.
    pub fn expand<'t, F>(&self, output: &mut String, group_text: F)
    where
        F: Fn(usize) -> Option<&'t str>,
    {
        for part in &self.parts {
            match part {
                ReplacementPart::Literal(s) => output.push_str(s),
                ReplacementPart::Group(index) => {
                    if let Some(s) = group_text(*index) {
                        output.push_str(s);
                    }
                }
            }
        }
    }
}

/// Escape `\` and `$` so that the text is replaced literally.
pub fn quote_replacement(s: &str) -> String {
    if memchr2(b'\\', b'$', s.as_bytes()).is_none() {
        return s.to_owned();
    }

    let mut quoted = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if c == '\\' || c == '$' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{error::RegexError, registry::GroupRegistry};

    use super::{quote_replacement, Replacement, ReplacementPart};

    fn new_registry(names: &[Option<&str>]) -> GroupRegistry {
        let mut registry = GroupRegistry::new();
        for name in names {
            registry.register(*name);
        }
        registry
    }

    fn literal(s: &str) -> ReplacementPart {
        ReplacementPart::Literal(s.to_owned())
    }

    #[test]
    fn test_parse() {
        let registry = new_registry(&[None, Some("year"), None]);

        assert_eq!(
            Replacement::parse("a$1b${year}c", &registry).unwrap().parts,
            vec![
                literal("a"),
                ReplacementPart::Group(1),
                literal("b"),
                ReplacementPart::Group(2),
                literal("c")
            ]
        );

        // escapes
        assert_eq!(
            Replacement::parse("\\$1\\\\", &registry).unwrap().parts,
            vec![literal("$1\\")]
        );

        // digits are taken while the number is a group
        assert_eq!(
            Replacement::parse("$12$30", &registry).unwrap().parts,
            vec![
                ReplacementPart::Group(1),
                literal("2"),
                ReplacementPart::Group(3),
                literal("0")
            ]
        );
    }

    #[test]
    fn test_parse_many_groups() {
        let names: Vec<Option<&str>> = vec![None; 12];
        let registry = new_registry(&names);
        assert_eq!(
            Replacement::parse("$12", &registry).unwrap().parts,
            vec![ReplacementPart::Group(12)]
        );
    }

    #[test]
    fn test_parse_errors() {
        let registry = new_registry(&[Some("name")]);

        assert_eq!(
            Replacement::parse("a\\", &registry),
            Err(RegexError::Replacement(
                "character to be escaped is missing".to_owned()
            ))
        );
        assert_eq!(
            Replacement::parse("a$", &registry),
            Err(RegexError::Replacement("group index is missing".to_owned()))
        );
        assert_eq!(
            Replacement::parse("$x", &registry),
            Err(RegexError::Replacement("Illegal group reference".to_owned()))
        );
        assert_eq!(
            Replacement::parse("$2", &registry),
            Err(RegexError::GroupIndexOutOfRange(2))
        );
        assert_eq!(
            Replacement::parse("${name", &registry),
            Err(RegexError::Replacement(
                "named capturing group is missing trailing '}'".to_owned()
            ))
        );
        assert_eq!(
            Replacement::parse("${}", &registry),
            Err(RegexError::Replacement(
                "named capturing group has 0 length name".to_owned()
            ))
        );
        assert_eq!(
            Replacement::parse("${1a}", &registry),
            Err(RegexError::Replacement(
                "capturing group name {1a} starts with digit character".to_owned()
            ))
        );
        assert_eq!(
            Replacement::parse("${other}", &registry),
            Err(RegexError::NoSuchGroupName("other".to_owned()))
        );
    }

    #[test]
    fn test_expand() {
        let registry = new_registry(&[None, None]);
        let replacement = Replacement::parse("[$2-$1]", &registry).unwrap();

        let groups = ["ab", "a"];
        let mut output = String::new();
        replacement.expand(&mut output, |index| match index {
            0 => Some(groups[0]),
            1 => Some(groups[1]),
            _ => None,
        });
        assert_eq!(output, "[-a]");
    }

    #[test]
    fn test_quote_replacement() {
        assert_eq!(quote_replacement("abc"), "abc");
        assert_eq!(quote_replacement("a$1\\b"), "a\\$1\\\\b");
    }
}
