// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

/// Literals shorter than this are searched character by character.
pub const MIN_PATTERN_LENGTH: usize = 4;

/// Boyer-Moore search of a literal over the UTF-8 bytes of the text.
///
/// The literal is compared right to left. On a mismatch it is shifted by the
/// larger of the bad character shift and the good suffix shift.
///
/// The bad character table only has 128 entries and is indexed by the
/// lower 7 bits of a byte, so non-ASCII bytes alias each other. This only
/// makes some shifts shorter than they could be.
#[derive(Debug, Clone, PartialEq)]
pub struct BoyerMoore {
    pattern: Vec<u8>,
    last_occurrence: [usize; 128],
    good_suffix_shift: Vec<usize>,
    char_count: usize,
}

impl BoyerMoore {
    /// Returns `None` when the literal is too short to benefit from the tables.
    pub fn new(chars: &[char]) -> Option<Self> {
        if chars.len() < MIN_PATTERN_LENGTH {
            return None;
        }

        let pattern: Vec<u8> = chars.iter().collect::<String>().into_bytes();
        let length = pattern.len();

        // where in the pattern each lower 7-bit value occurs last (1-based)
        let mut last_occurrence = [0usize; 128];
        for (i, b) in pattern.iter().enumerate() {
            last_occurrence[(b & 0x7F) as usize] = i + 1;
        }

        // `shift` is the shift amount being considered,
        // `j` is the beginning index of the suffix being considered.
        let mut good_suffix_shift = vec![0usize; length];
        'next: for shift in (1..=length).rev() {
            let mut j = length - 1;
            while j >= shift {
                if pattern[j] == pattern[j - shift] {
                    // pattern[j..] is a good suffix
                    good_suffix_shift[j - 1] = shift;
                } else {
                    continue 'next;
                }
                j -= 1;
            }

            // a suffix can not have a larger shift than its sub-suffix
            while j > 0 {
                j -= 1;
                good_suffix_shift[j] = shift;
            }
        }
        good_suffix_shift[length - 1] = 1;

        Some(BoyerMoore {
            pattern,
            last_occurrence,
            good_suffix_shift,
            char_count: chars.len(),
        })
    }

    /// Length of the literal in bytes.
    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    /// Length of the literal in characters.
    pub fn char_count(&self) -> usize {
        self.char_count
    }

    /// Find the first occurrence that starts at or after `start`
    /// and ends at or before `end`.
    pub fn find(&self, text: &[u8], start: usize, end: usize) -> Option<usize> {
        let length = self.pattern.len();
        if end < length {
            return None;
        }

        let last = end - length;
        let mut i = start;

        'next: while i <= last {
            for j in (0..length).rev() {
                let b = text[i + j];
                if b != self.pattern[j] {
                    let bad_character_shift =
                        (j + 1) as isize - self.last_occurrence[(b & 0x7F) as usize] as isize;
                    let shift = bad_character_shift.max(self.good_suffix_shift[j] as isize);
                    i += shift as usize;
                    continue 'next;
                }
            }
            return Some(i);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::BoyerMoore;

    fn new_boyer_moore(s: &str) -> BoyerMoore {
        let chars: Vec<char> = s.chars().collect();
        BoyerMoore::new(&chars).unwrap()
    }

    #[test]
    fn test_short_literal() {
        assert!(BoyerMoore::new(&['a', 'b', 'c']).is_none());
    }

    #[test]
    fn test_find() {
        {
            let bm = new_boyer_moore("abcd");
            let text = b"xxabcabcdyyabcd";
            assert_eq!(bm.find(text, 0, text.len()), Some(5));
            assert_eq!(bm.find(text, 6, text.len()), Some(11));
            assert_eq!(bm.find(text, 12, text.len()), None);

            // the occurrence must end before the end bound
            assert_eq!(bm.find(text, 6, 14), None);
        }

        {
            // repeated suffixes
            let bm = new_boyer_moore("abab");
            let text = b"aabaabababab";
            assert_eq!(bm.find(text, 0, text.len()), Some(4));
            assert_eq!(bm.find(text, 5, text.len()), Some(6));
        }

        {
            // multibyte characters alias in the bad character table
            let bm = new_boyer_moore("文字文字");
            let text = "中文字中文字文字文字".as_bytes();
            assert_eq!(bm.find(text, 0, text.len()), Some(12));
            assert_eq!(bm.char_count(), 4);
            assert_eq!(bm.len(), 12);
        }

        {
            // text shorter than the literal
            let bm = new_boyer_moore("hello");
            assert_eq!(bm.find(b"hell", 0, 4), None);
        }
    }
}
