// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

/// Capturing group numbers and names.
///
/// Group 0 is the whole match, user groups are numbered from 1
/// in the order of their opening parenthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRegistry {
    // index 0 is always `None`
    names: Vec<Option<String>>,
}

impl Default for GroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupRegistry {
    pub fn new() -> Self {
        GroupRegistry { names: vec![None] }
    }

    /// Allocate the next group number.
    pub fn register(&mut self, name: Option<&str>) -> usize {
        self.names.push(name.map(|s| s.to_owned()));
        self.names.len() - 1
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|item| matches!(item, Some(s) if s == name))
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).and_then(|item| item.as_deref())
    }

    /// The number of groups including group 0.
    pub fn group_count(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> impl Iterator<Item = (usize, &str)> {
        self.names
            .iter()
            .enumerate()
            .filter_map(|(index, name)| name.as_deref().map(|s| (index, s)))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::GroupRegistry;

    #[test]
    fn test_register() {
        let mut registry = GroupRegistry::new();
        assert_eq!(registry.group_count(), 1);

        assert_eq!(registry.register(None), 1);
        assert_eq!(registry.register(Some("year")), 2);
        assert_eq!(registry.register(Some("month")), 3);

        assert_eq!(registry.group_count(), 4);
        assert_eq!(registry.index_of("month"), Some(3));
        assert_eq!(registry.index_of("day"), None);
        assert!(registry.is_defined("year"));

        assert_eq!(registry.name_of(0), None);
        assert_eq!(registry.name_of(1), None);
        assert_eq!(registry.name_of(2), Some("year"));
        assert_eq!(registry.name_of(9), None);

        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec![(2, "year"), (3, "month")]
        );
    }
}
