// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::{fmt::Display, sync::OnceLock};

use unicode_blocks::UnicodeBlock;
use unicode_properties::{GeneralCategory, GeneralCategoryGroup, UnicodeGeneralCategory};
use unicode_script::{Script, UnicodeScript};

use crate::flags::Flags;

/// A predicate over a single character.
///
/// Character classes, escapes such as `\d` and properties such as `\p{Lu}`
/// are all compiled into a tree of predicates.
#[derive(Debug, Clone, PartialEq)]
pub enum CharPredicate {
    Single(char),

    /// ASCII case-insensitive, the char is stored in lower case.
    SingleI(char),

    /// Unicode case-insensitive, the char is stored folded.
    SingleU(char),

    /// Characters below U+0100.
    Bits(BitClass),

    Range(char, char),
    RangeI(char, char),
    RangeU(char, char),

    Ctype(Ctype),

    /// A set of general categories, see `category_bit`.
    Category(u32),

    Script(Script),
    Block(BlockRange),
    Binary(BinaryProperty),
    Java(JavaProperty),

    HorizWs,
    VertWs,

    /// `.` without `DOTALL`
    Dot,

    /// `.` with `UNIX_LINES`
    UnixDot,

    /// `.` with `DOTALL`, and `\p{all}`
    All,

    Not(Box<CharPredicate>),
    Union(Box<CharPredicate>, Box<CharPredicate>),
    Intersection(Box<CharPredicate>, Box<CharPredicate>),
    Difference(Box<CharPredicate>, Box<CharPredicate>),
}

impl CharPredicate {
    pub fn is_match(&self, c: char) -> bool {
        match self {
            CharPredicate::Single(s) => c == *s,
            CharPredicate::SingleI(s) => c == *s || c.to_ascii_lowercase() == *s,
            CharPredicate::SingleU(s) => c == *s || fold_case(c) == *s,
            CharPredicate::Bits(bits) => bits.contains(c),
            CharPredicate::Range(lower, upper) => (*lower..=*upper).contains(&c),
            CharPredicate::RangeI(lower, upper) => {
                let range = *lower..=*upper;
                range.contains(&c)
                    || c.is_ascii()
                        && (range.contains(&c.to_ascii_uppercase())
                            || range.contains(&c.to_ascii_lowercase()))
            }
            CharPredicate::RangeU(lower, upper) => {
                let range = *lower..=*upper;
                if range.contains(&c) {
                    return true;
                }
                let upper_case = simple_uppercase(c);
                range.contains(&upper_case) || range.contains(&simple_lowercase(upper_case))
            }
            CharPredicate::Ctype(ctype) => ctype.is_match(c),
            CharPredicate::Category(mask) => mask & category_bit(c.general_category()) != 0,
            CharPredicate::Script(script) => c.script() == *script,
            CharPredicate::Block(block) => (block.start..=block.end).contains(&(c as u32)),
            CharPredicate::Binary(property) => property.is_match(c),
            CharPredicate::Java(property) => property.is_match(c),
            CharPredicate::HorizWs => is_horizontal_whitespace(c),
            CharPredicate::VertWs => is_vertical_whitespace(c),
            CharPredicate::Dot => !matches!(c, '\n' | '\r' | '\u{85}' | '\u{2028}' | '\u{2029}'),
            CharPredicate::UnixDot => c != '\n',
            CharPredicate::All => true,
            CharPredicate::Not(inner) => !inner.is_match(c),
            CharPredicate::Union(lhs, rhs) => lhs.is_match(c) || rhs.is_match(c),
            CharPredicate::Intersection(lhs, rhs) => lhs.is_match(c) && rhs.is_match(c),
            CharPredicate::Difference(lhs, rhs) => !rhs.is_match(c) && lhs.is_match(c),
        }
    }

    pub fn complement(self) -> CharPredicate {
        match self {
            CharPredicate::Not(inner) => *inner,
            _ => CharPredicate::Not(Box::new(self)),
        }
    }

    pub fn union(self, other: CharPredicate) -> CharPredicate {
        CharPredicate::Union(Box::new(self), Box::new(other))
    }

    pub fn intersection(self, other: CharPredicate) -> CharPredicate {
        CharPredicate::Intersection(Box::new(self), Box::new(other))
    }

    pub fn difference(self, other: CharPredicate) -> CharPredicate {
        CharPredicate::Difference(Box::new(self), Box::new(other))
    }

    /// Fill the empty bit class placeholders in this tree with the given one.
    ///
    /// A character class collects its single characters below U+0100 into one
    /// bit class while it is being parsed, the placeholder that was inserted
    /// when the first of them was seen is filled in at the end. The bit classes
    /// of nested classes are never empty so they are left alone.
    pub fn fill_bits(&mut self, bits: &BitClass) {
        match self {
            CharPredicate::Bits(b) if b.is_empty() => *b = bits.clone(),
            CharPredicate::Not(inner) => inner.fill_bits(bits),
            CharPredicate::Union(lhs, rhs)
            | CharPredicate::Intersection(lhs, rhs)
            | CharPredicate::Difference(lhs, rhs) => {
                lhs.fill_bits(bits);
                rhs.fill_bits(bits);
            }
            _ => {}
        }
    }
}

impl Display for CharPredicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CharPredicate::Single(c) => write!(f, "{:?}", c),
            CharPredicate::SingleI(c) => write!(f, "{:?}i", c),
            CharPredicate::SingleU(c) => write!(f, "{:?}u", c),
            CharPredicate::Bits(bits) => write!(f, "{}", bits),
            CharPredicate::Range(a, b) => write!(f, "[{:?}-{:?}]", a, b),
            CharPredicate::RangeI(a, b) => write!(f, "[{:?}-{:?}]i", a, b),
            CharPredicate::RangeU(a, b) => write!(f, "[{:?}-{:?}]u", a, b),
            CharPredicate::Ctype(ctype) => write!(f, "{:?}", ctype),
            CharPredicate::Category(mask) => write!(f, "Category(0x{:x})", mask),
            CharPredicate::Script(script) => write!(f, "Script({})", script.full_name()),
            CharPredicate::Block(block) => write!(f, "Block({})", block.name),
            CharPredicate::Binary(property) => write!(f, "{:?}", property),
            CharPredicate::Java(property) => write!(f, "{:?}", property),
            CharPredicate::HorizWs => f.write_str("\\h"),
            CharPredicate::VertWs => f.write_str("\\v"),
            CharPredicate::Dot => f.write_str("."),
            CharPredicate::UnixDot => f.write_str(".d"),
            CharPredicate::All => f.write_str("All"),
            CharPredicate::Not(inner) => write!(f, "!{}", inner),
            CharPredicate::Union(lhs, rhs) => write!(f, "({} | {})", lhs, rhs),
            CharPredicate::Intersection(lhs, rhs) => write!(f, "({} && {})", lhs, rhs),
            CharPredicate::Difference(lhs, rhs) => write!(f, "({} - {})", lhs, rhs),
        }
    }
}

/// A set of characters below U+0100.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BitClass {
    bits: [u64; 4],
}

impl BitClass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Latin-1 character, with its case variants when
    /// `CASE_INSENSITIVE` is in effect.
    pub fn add(&mut self, c: char, flags: Flags) {
        if flags.contains(Flags::CASE_INSENSITIVE) {
            if c.is_ascii() {
                self.set(c.to_ascii_uppercase());
                self.set(c.to_ascii_lowercase());
            } else if flags.contains(Flags::UNICODE_CASE) {
                self.set(simple_lowercase(c));
                self.set(simple_uppercase(c));
            }
        }
        self.set(c);
    }

    fn set(&mut self, c: char) {
        let n = c as u32;
        if n < 256 {
            self.bits[(n / 64) as usize] |= 1 << (n % 64);
        }
    }

    pub fn contains(&self, c: char) -> bool {
        let n = c as u32;
        n < 256 && self.bits[(n / 64) as usize] & (1 << (n % 64)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|b| *b == 0)
    }
}

impl Display for BitClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for n in 0..256u32 {
            if let Some(c) = char::from_u32(n).filter(|c| self.contains(*c)) {
                write!(f, "{}", c.escape_debug())?;
            }
        }
        f.write_str("]")
    }
}

/// The POSIX character types, ASCII only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ctype {
    Alnum,
    Alpha,
    Blank,
    Cntrl,
    Digit,
    Graph,
    Lower,
    Print,
    Punct,
    Space,
    Upper,
    XDigit,
    Word,
}

impl Ctype {
    pub fn is_match(&self, c: char) -> bool {
        if !c.is_ascii() {
            return false;
        }

        match self {
            Ctype::Alnum => c.is_ascii_alphanumeric(),
            Ctype::Alpha => c.is_ascii_alphabetic(),
            Ctype::Blank => c == ' ' || c == '\t',
            Ctype::Cntrl => c.is_ascii_control(),
            Ctype::Digit => c.is_ascii_digit(),
            Ctype::Graph => c.is_ascii_graphic(),
            Ctype::Lower => c.is_ascii_lowercase(),
            Ctype::Print => (' '..='~').contains(&c),
            Ctype::Punct => c.is_ascii_punctuation(),
            Ctype::Space => matches!(c, ' ' | '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r'),
            Ctype::Upper => c.is_ascii_uppercase(),
            Ctype::XDigit => c.is_ascii_hexdigit(),
            Ctype::Word => c.is_ascii_alphanumeric() || c == '_',
        }
    }
}

/// Unicode binary properties, used by `\p{IsXxx}` and by the
/// Unicode versions of the predefined and POSIX classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryProperty {
    Alphabetic,
    Letter,
    Ideographic,
    Lowercase,
    Uppercase,
    Titlecase,
    WhiteSpace,
    Control,
    Punctuation,
    HexDigit,
    Assigned,
    NoncharacterCodePoint,
    Digit,
    Alnum,
    Blank,
    Graph,
    Print,
    Word,
    JoinControl,
}

impl BinaryProperty {
    /// The name is matched case-insensitively, e.g. "Alphabetic", "WHITE_SPACE" or "WhiteSpace".
    pub fn from_name(name: &str) -> Option<Self> {
        let property = match name.to_ascii_uppercase().as_str() {
            "ALPHABETIC" => BinaryProperty::Alphabetic,
            "LETTER" => BinaryProperty::Letter,
            "IDEOGRAPHIC" => BinaryProperty::Ideographic,
            "LOWERCASE" => BinaryProperty::Lowercase,
            "UPPERCASE" => BinaryProperty::Uppercase,
            "TITLECASE" => BinaryProperty::Titlecase,
            "WHITE_SPACE" | "WHITESPACE" => BinaryProperty::WhiteSpace,
            "CONTROL" => BinaryProperty::Control,
            "PUNCTUATION" => BinaryProperty::Punctuation,
            "HEX_DIGIT" | "HEXDIGIT" => BinaryProperty::HexDigit,
            "ASSIGNED" => BinaryProperty::Assigned,
            "NONCHARACTER_CODE_POINT" | "NONCHARACTERCODEPOINT" => {
                BinaryProperty::NoncharacterCodePoint
            }
            "DIGIT" => BinaryProperty::Digit,
            "ALNUM" => BinaryProperty::Alnum,
            "BLANK" => BinaryProperty::Blank,
            "GRAPH" => BinaryProperty::Graph,
            "PRINT" => BinaryProperty::Print,
            "WORD" => BinaryProperty::Word,
            "JOIN_CONTROL" | "JOINCONTROL" => BinaryProperty::JoinControl,
            _ => return None,
        };
        Some(property)
    }

    /// The Unicode definitions of the POSIX names, used when
    /// `UNICODE_CHARACTER_CLASS` is set.
    pub fn from_posix_name(name: &str) -> Option<Self> {
        let property = match name.to_ascii_uppercase().as_str() {
            "ALPHA" => BinaryProperty::Alphabetic,
            "LOWER" => BinaryProperty::Lowercase,
            "UPPER" => BinaryProperty::Uppercase,
            "SPACE" => BinaryProperty::WhiteSpace,
            "PUNCT" => BinaryProperty::Punctuation,
            "XDIGIT" => BinaryProperty::HexDigit,
            "ALNUM" => BinaryProperty::Alnum,
            "CNTRL" => BinaryProperty::Control,
            "DIGIT" => BinaryProperty::Digit,
            "BLANK" => BinaryProperty::Blank,
            "GRAPH" => BinaryProperty::Graph,
            "PRINT" => BinaryProperty::Print,
            _ => return None,
        };
        Some(property)
    }

    pub fn is_match(&self, c: char) -> bool {
        let category = c.general_category();
        match self {
            BinaryProperty::Alphabetic => c.is_alphabetic(),
            BinaryProperty::Letter => c.general_category_group() == GeneralCategoryGroup::Letter,
            BinaryProperty::Ideographic => is_ideographic(c),
            BinaryProperty::Lowercase => c.is_lowercase(),
            BinaryProperty::Uppercase => c.is_uppercase(),
            BinaryProperty::Titlecase => category == GeneralCategory::TitlecaseLetter,
            BinaryProperty::WhiteSpace => c.is_whitespace(),
            BinaryProperty::Control => category == GeneralCategory::Control,
            BinaryProperty::Punctuation => {
                c.general_category_group() == GeneralCategoryGroup::Punctuation
            }
            BinaryProperty::HexDigit => {
                category == GeneralCategory::DecimalNumber
                    || matches!(c,
                        '0'..='9' | 'A'..='F' | 'a'..='f'
                        | '\u{FF10}'..='\u{FF19}' | '\u{FF21}'..='\u{FF26}' | '\u{FF41}'..='\u{FF46}')
            }
            BinaryProperty::Assigned => category != GeneralCategory::Unassigned,
            BinaryProperty::NoncharacterCodePoint => {
                let n = c as u32;
                n & 0xFFFE == 0xFFFE || (0xFDD0..=0xFDEF).contains(&n)
            }
            BinaryProperty::Digit => category == GeneralCategory::DecimalNumber,
            BinaryProperty::Alnum => c.is_alphabetic() || category == GeneralCategory::DecimalNumber,
            BinaryProperty::Blank => category == GeneralCategory::SpaceSeparator || c == '\t',
            BinaryProperty::Graph => !matches!(
                category,
                GeneralCategory::SpaceSeparator
                    | GeneralCategory::LineSeparator
                    | GeneralCategory::ParagraphSeparator
                    | GeneralCategory::Control
                    | GeneralCategory::Surrogate
                    | GeneralCategory::Unassigned
            ),
            BinaryProperty::Print => {
                (BinaryProperty::Graph.is_match(c) || BinaryProperty::Blank.is_match(c))
                    && category != GeneralCategory::Control
            }
            BinaryProperty::Word => {
                c.is_alphabetic()
                    || matches!(
                        category,
                        GeneralCategory::NonspacingMark
                            | GeneralCategory::EnclosingMark
                            | GeneralCategory::SpacingMark
                            | GeneralCategory::DecimalNumber
                            | GeneralCategory::ConnectorPunctuation
                    )
                    || BinaryProperty::JoinControl.is_match(c)
            }
            BinaryProperty::JoinControl => matches!(c, '\u{200C}' | '\u{200D}'),
        }
    }
}

/// The `javaXxx` properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaProperty {
    LowerCase,
    UpperCase,
    Alphabetic,
    Ideographic,
    TitleCase,
    Digit,
    Defined,
    Letter,
    LetterOrDigit,
    JavaIdentifierStart,
    JavaIdentifierPart,
    UnicodeIdentifierStart,
    UnicodeIdentifierPart,
    IdentifierIgnorable,
    SpaceChar,
    Whitespace,
    IsoControl,
    Mirrored,
}

impl JavaProperty {
    pub fn from_name(name: &str) -> Option<Self> {
        let property = match name {
            "javaLowerCase" => JavaProperty::LowerCase,
            "javaUpperCase" => JavaProperty::UpperCase,
            "javaAlphabetic" => JavaProperty::Alphabetic,
            "javaIdeographic" => JavaProperty::Ideographic,
            "javaTitleCase" => JavaProperty::TitleCase,
            "javaDigit" => JavaProperty::Digit,
            "javaDefined" => JavaProperty::Defined,
            "javaLetter" => JavaProperty::Letter,
            "javaLetterOrDigit" => JavaProperty::LetterOrDigit,
            "javaJavaIdentifierStart" => JavaProperty::JavaIdentifierStart,
            "javaJavaIdentifierPart" => JavaProperty::JavaIdentifierPart,
            "javaUnicodeIdentifierStart" => JavaProperty::UnicodeIdentifierStart,
            "javaUnicodeIdentifierPart" => JavaProperty::UnicodeIdentifierPart,
            "javaIdentifierIgnorable" => JavaProperty::IdentifierIgnorable,
            "javaSpaceChar" => JavaProperty::SpaceChar,
            "javaWhitespace" => JavaProperty::Whitespace,
            "javaISOControl" => JavaProperty::IsoControl,
            "javaMirrored" => JavaProperty::Mirrored,
            _ => return None,
        };
        Some(property)
    }

    pub fn is_match(&self, c: char) -> bool {
        let category = c.general_category();
        let group = c.general_category_group();
        match self {
            JavaProperty::LowerCase => c.is_lowercase(),
            JavaProperty::UpperCase => c.is_uppercase(),
            JavaProperty::Alphabetic => c.is_alphabetic(),
            JavaProperty::Ideographic => is_ideographic(c),
            JavaProperty::TitleCase => category == GeneralCategory::TitlecaseLetter,
            JavaProperty::Digit => category == GeneralCategory::DecimalNumber,
            JavaProperty::Defined => category != GeneralCategory::Unassigned,
            JavaProperty::Letter => group == GeneralCategoryGroup::Letter,
            JavaProperty::LetterOrDigit => is_letter_or_digit(c),
            JavaProperty::JavaIdentifierStart => {
                group == GeneralCategoryGroup::Letter
                    || matches!(
                        category,
                        GeneralCategory::LetterNumber
                            | GeneralCategory::CurrencySymbol
                            | GeneralCategory::ConnectorPunctuation
                    )
            }
            JavaProperty::JavaIdentifierPart => {
                group == GeneralCategoryGroup::Letter
                    || matches!(
                        category,
                        GeneralCategory::CurrencySymbol
                            | GeneralCategory::ConnectorPunctuation
                            | GeneralCategory::DecimalNumber
                            | GeneralCategory::LetterNumber
                            | GeneralCategory::SpacingMark
                            | GeneralCategory::NonspacingMark
                    )
                    || JavaProperty::IdentifierIgnorable.is_match(c)
            }
            JavaProperty::UnicodeIdentifierStart => {
                group == GeneralCategoryGroup::Letter || category == GeneralCategory::LetterNumber
            }
            JavaProperty::UnicodeIdentifierPart => {
                group == GeneralCategoryGroup::Letter
                    || matches!(
                        category,
                        GeneralCategory::ConnectorPunctuation
                            | GeneralCategory::DecimalNumber
                            | GeneralCategory::LetterNumber
                            | GeneralCategory::SpacingMark
                            | GeneralCategory::NonspacingMark
                    )
                    || JavaProperty::IdentifierIgnorable.is_match(c)
            }
            JavaProperty::IdentifierIgnorable => {
                matches!(c, '\u{0}'..='\u{8}' | '\u{E}'..='\u{1B}' | '\u{7F}'..='\u{9F}')
                    || category == GeneralCategory::Format
            }
            JavaProperty::SpaceChar => group == GeneralCategoryGroup::Separator,
            JavaProperty::Whitespace => {
                (group == GeneralCategoryGroup::Separator
                    && !matches!(c, '\u{A0}' | '\u{2007}' | '\u{202F}'))
                    || matches!(c, '\u{9}'..='\u{D}' | '\u{1C}'..='\u{1F}')
            }
            JavaProperty::IsoControl => matches!(c, '\u{0}'..='\u{1F}' | '\u{7F}'..='\u{9F}'),
            JavaProperty::Mirrored => is_mirrored(c),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockRange {
    pub name: &'static str,
    pub start: u32,
    pub end: u32,
}

/// Map a general category to its bit in a category mask.
pub fn category_bit(category: GeneralCategory) -> u32 {
    #[allow(unreachable_patterns)]
    let index = match category {
        GeneralCategory::Unassigned => 0,
        GeneralCategory::UppercaseLetter => 1,
        GeneralCategory::LowercaseLetter => 2,
        GeneralCategory::TitlecaseLetter => 3,
        GeneralCategory::ModifierLetter => 4,
        GeneralCategory::OtherLetter => 5,
        GeneralCategory::NonspacingMark => 6,
        GeneralCategory::EnclosingMark => 7,
        GeneralCategory::SpacingMark => 8,
        GeneralCategory::DecimalNumber => 9,
        GeneralCategory::LetterNumber => 10,
        GeneralCategory::OtherNumber => 11,
        GeneralCategory::SpaceSeparator => 12,
        GeneralCategory::LineSeparator => 13,
        GeneralCategory::ParagraphSeparator => 14,
        GeneralCategory::Control => 15,
        GeneralCategory::Format => 16,
        GeneralCategory::PrivateUse => 18,
        GeneralCategory::Surrogate => 19,
        GeneralCategory::DashPunctuation => 20,
        GeneralCategory::OpenPunctuation => 21,
        GeneralCategory::ClosePunctuation => 22,
        GeneralCategory::ConnectorPunctuation => 23,
        GeneralCategory::OtherPunctuation => 24,
        GeneralCategory::MathSymbol => 25,
        GeneralCategory::CurrencySymbol => 26,
        GeneralCategory::ModifierSymbol => 27,
        GeneralCategory::OtherSymbol => 28,
        GeneralCategory::InitialPunctuation => 29,
        GeneralCategory::FinalPunctuation => 30,
        _ => 0,
    };
    1 << index
}

fn category_mask(name: &str) -> Option<u32> {
    use GeneralCategory::*;

    let categories: &[GeneralCategory] = match name {
        "Cn" => &[Unassigned],
        "Lu" => &[UppercaseLetter],
        "Ll" => &[LowercaseLetter],
        "Lt" => &[TitlecaseLetter],
        "Lm" => &[ModifierLetter],
        "Lo" => &[OtherLetter],
        "Mn" => &[NonspacingMark],
        "Me" => &[EnclosingMark],
        "Mc" => &[SpacingMark],
        "Nd" => &[DecimalNumber],
        "Nl" => &[LetterNumber],
        "No" => &[OtherNumber],
        "Zs" => &[SpaceSeparator],
        "Zl" => &[LineSeparator],
        "Zp" => &[ParagraphSeparator],
        "Cc" => &[Control],
        "Cf" => &[Format],
        "Co" => &[PrivateUse],
        "Cs" => &[Surrogate],
        "Pd" => &[DashPunctuation],
        "Ps" => &[OpenPunctuation],
        "Pe" => &[ClosePunctuation],
        "Pc" => &[ConnectorPunctuation],
        "Po" => &[OtherPunctuation],
        "Sm" => &[MathSymbol],
        "Sc" => &[CurrencySymbol],
        "Sk" => &[ModifierSymbol],
        "So" => &[OtherSymbol],
        "Pi" => &[InitialPunctuation],
        "Pf" => &[FinalPunctuation],
        "L" => &[
            UppercaseLetter,
            LowercaseLetter,
            TitlecaseLetter,
            ModifierLetter,
            OtherLetter,
        ],
        "M" => &[NonspacingMark, EnclosingMark, SpacingMark],
        "N" => &[DecimalNumber, LetterNumber, OtherNumber],
        "Z" => &[SpaceSeparator, LineSeparator, ParagraphSeparator],
        "C" => &[Control, Format, PrivateUse, Surrogate],
        "P" => &[
            DashPunctuation,
            OpenPunctuation,
            ClosePunctuation,
            ConnectorPunctuation,
            OtherPunctuation,
            InitialPunctuation,
            FinalPunctuation,
        ],
        "S" => &[MathSymbol, CurrencySymbol, ModifierSymbol, OtherSymbol],
        "LC" => &[UppercaseLetter, LowercaseLetter, TitlecaseLetter],
        "LD" => &[
            UppercaseLetter,
            LowercaseLetter,
            TitlecaseLetter,
            ModifierLetter,
            OtherLetter,
            DecimalNumber,
        ],
        _ => return None,
    };

    Some(
        categories
            .iter()
            .fold(0, |mask, category| mask | category_bit(*category)),
    )
}

/// Look up the named properties: general categories, POSIX names and `javaXxx` names.
///
/// The names are case-sensitive.
pub fn named_property(name: &str) -> Option<CharPredicate> {
    if let Some(mask) = category_mask(name) {
        return Some(CharPredicate::Category(mask));
    }

    let predicate = match name {
        "L1" => CharPredicate::Range('\u{0}', '\u{FF}'),
        "all" => CharPredicate::All,
        "ASCII" => CharPredicate::Range('\u{0}', '\u{7F}'),
        "Alnum" => CharPredicate::Ctype(Ctype::Alnum),
        "Alpha" => CharPredicate::Ctype(Ctype::Alpha),
        "Blank" => CharPredicate::Ctype(Ctype::Blank),
        "Cntrl" => CharPredicate::Ctype(Ctype::Cntrl),
        "Digit" => CharPredicate::Range('0', '9'),
        "Graph" => CharPredicate::Ctype(Ctype::Graph),
        "Lower" => CharPredicate::Range('a', 'z'),
        "Print" => CharPredicate::Range('\u{20}', '\u{7E}'),
        "Punct" => CharPredicate::Ctype(Ctype::Punct),
        "Space" => CharPredicate::Ctype(Ctype::Space),
        "Upper" => CharPredicate::Range('A', 'Z'),
        "XDigit" => CharPredicate::Ctype(Ctype::XDigit),
        _ => CharPredicate::Java(JavaProperty::from_name(name)?),
    };
    Some(predicate)
}

/// Resolve the name inside `\p{...}`.
///
/// Supported forms:
/// - `sc=Name`, `script=Name`
/// - `blk=Name`, `block=Name`
/// - `gc=Name`, `general_category=Name`
/// - `InBlockName`
/// - `IsBinaryProperty`, `IsCategory`, `IsScriptName`
/// - a category, POSIX or `javaXxx` name
///
/// Returns the error message when the name is unknown.
pub fn resolve_property(name: &str, flags: Flags) -> Result<CharPredicate, String> {
    if let Some((key, value)) = name.split_once('=') {
        return match key.to_ascii_lowercase().as_str() {
            "sc" | "script" => script_property(value),
            "blk" | "block" => block_property(value),
            "gc" | "general_category" => named_property_or_error(value),
            _ => Err(format!(
                "Unknown Unicode property {{name=<{}>, value=<{}>}}",
                key, value
            )),
        };
    }

    if let Some(block_name) = name.strip_prefix("In") {
        return block_property(block_name);
    }

    if let Some(is_name) = name.strip_prefix("Is") {
        if let Some(property) = BinaryProperty::from_name(is_name) {
            return Ok(CharPredicate::Binary(property));
        }
        if let Some(predicate) = named_property(is_name) {
            return Ok(predicate);
        }
        return script_property(is_name);
    }

    if flags.contains(Flags::UNICODE_CHARACTER_CLASS) {
        if let Some(property) = BinaryProperty::from_posix_name(name) {
            return Ok(CharPredicate::Binary(property));
        }
    }

    named_property_or_error(name)
}

fn named_property_or_error(name: &str) -> Result<CharPredicate, String> {
    named_property(name).ok_or_else(|| format!("Unknown character property name {{{}}}", name))
}

fn script_property(name: &str) -> Result<CharPredicate, String> {
    find_script(name)
        .map(CharPredicate::Script)
        .ok_or_else(|| format!("Unknown character script name {{{}}}", name))
}

fn block_property(name: &str) -> Result<CharPredicate, String> {
    find_block(name)
        .map(CharPredicate::Block)
        .ok_or_else(|| format!("Unknown character block name {{{}}}", name))
}

/// Scripts are matched case-insensitively by full name ("Old_Italic", "GREEK")
/// or short name ("Latn").
fn find_script(name: &str) -> Option<Script> {
    if let Some(script) = Script::from_full_name(name).or_else(|| Script::from_short_name(name)) {
        return Some(script);
    }

    // "OLD_ITALIC" -> "Old_Italic"
    let title_case = name
        .split(|c| c == '_' || c == ' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("_");

    Script::from_full_name(&title_case).or_else(|| Script::from_short_name(&title_case))
}

fn normalize_block_name(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn all_blocks() -> &'static [UnicodeBlock] {
    static BLOCKS: OnceLock<Vec<UnicodeBlock>> = OnceLock::new();
    BLOCKS.get_or_init(|| {
        let mut blocks = vec![];
        let mut n: u32 = 0;
        while n <= char::MAX as u32 {
            match char::from_u32(n).and_then(unicode_blocks::find_unicode_block) {
                Some(block) => {
                    n = block.end() + 1;
                    blocks.push(block);
                }
                None => {
                    // blocks always start at a multiple of 16
                    n = (n | 0xF) + 1;
                }
            }
        }
        blocks
    })
}

/// Blocks are matched by name ignoring case, spaces, underscores and hyphens,
/// e.g. "Basic Latin", "BasicLatin" and "BASIC_LATIN" are the same block.
fn find_block(name: &str) -> Option<BlockRange> {
    let normalized = normalize_block_name(name);
    all_blocks()
        .iter()
        .find(|block| normalize_block_name(block.name()) == normalized)
        .map(|block| BlockRange {
            name: block.name(),
            start: block.start(),
            end: block.end(),
        })
}

pub fn is_horizontal_whitespace(c: char) -> bool {
    matches!(c,
        '\u{09}' | '\u{20}' | '\u{A0}' | '\u{1680}' | '\u{180E}'
        | '\u{2000}'..='\u{200A}' | '\u{202F}' | '\u{205F}' | '\u{3000}')
}

pub fn is_vertical_whitespace(c: char) -> bool {
    matches!(c, '\u{0A}'..='\u{0D}' | '\u{85}' | '\u{2028}' | '\u{2029}')
}

pub fn is_letter_or_digit(c: char) -> bool {
    c.general_category_group() == GeneralCategoryGroup::Letter
        || c.general_category() == GeneralCategory::DecimalNumber
}

pub fn is_nonspacing_mark(c: char) -> bool {
    c.general_category() == GeneralCategory::NonspacingMark
}

fn is_ideographic(c: char) -> bool {
    matches!(
        c.general_category(),
        GeneralCategory::OtherLetter | GeneralCategory::LetterNumber
    ) && matches!(c.script(), Script::Han | Script::Tangut | Script::Nushu)
}

fn is_mirrored(c: char) -> bool {
    matches!(c,
        '(' | ')' | '<' | '>' | '[' | ']' | '{' | '}' | '\u{AB}' | '\u{BB}'
        | '\u{2039}' | '\u{203A}' | '\u{2045}' | '\u{2046}' | '\u{207D}' | '\u{207E}'
        | '\u{208D}' | '\u{208E}' | '\u{2208}'..='\u{220D}' | '\u{2215}'
        | '\u{223C}' | '\u{223D}' | '\u{2243}' | '\u{2252}'..='\u{2255}'
        | '\u{2264}'..='\u{226B}' | '\u{226E}'..='\u{228C}' | '\u{228F}'..='\u{2292}'
        | '\u{2298}' | '\u{22A2}' | '\u{22A3}' | '\u{22A6}'..='\u{22B8}'
        | '\u{22BE}' | '\u{22BF}' | '\u{22C9}'..='\u{22CD}' | '\u{22D0}' | '\u{22D1}'
        | '\u{22D6}'..='\u{22ED}' | '\u{22F0}'..='\u{22FF}' | '\u{2308}'..='\u{230B}'
        | '\u{2320}' | '\u{2321}' | '\u{2329}' | '\u{232A}' | '\u{27E6}'..='\u{27EF}'
        | '\u{2983}'..='\u{2998}' | '\u{3008}'..='\u{3011}' | '\u{3014}'..='\u{301B}'
        | '\u{FF08}' | '\u{FF09}' | '\u{FF1C}' | '\u{FF1E}' | '\u{FF3B}' | '\u{FF3D}'
        | '\u{FF5B}' | '\u{FF5D}' | '\u{FF5F}' | '\u{FF60}' | '\u{FF62}' | '\u{FF63}')
}

/// The simple (one to one) upper case mapping.
pub fn simple_uppercase(c: char) -> char {
    let mut upper = c.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) => u,
        _ => c,
    }
}

/// The simple (one to one) lower case mapping.
pub fn simple_lowercase(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

/// Unicode case folding used by case-insensitive matching,
/// i.e. `lower(upper(c))`.
pub fn fold_case(c: char) -> char {
    simple_lowercase(simple_uppercase(c))
}

/// Whether two characters are equal ignoring case.
pub fn equals_ignore_case(a: char, b: char, unicode: bool) -> bool {
    if a == b {
        return true;
    }

    if unicode {
        let upper_a = simple_uppercase(a);
        let upper_b = simple_uppercase(b);
        upper_a == upper_b || simple_lowercase(upper_a) == simple_lowercase(upper_b)
    } else {
        a.to_ascii_lowercase() == b.to_ascii_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::flags::Flags;

    use super::{resolve_property, BitClass, CharPredicate, Ctype};

    fn check(name: &str, flags: Flags, yes: &str, no: &str) {
        let predicate = resolve_property(name, flags).unwrap();
        for c in yes.chars() {
            assert!(predicate.is_match(c), "{} should match {:?}", name, c);
        }
        for c in no.chars() {
            assert!(!predicate.is_match(c), "{} should not match {:?}", name, c);
        }
    }

    #[test]
    fn test_categories() {
        check("Lu", Flags::empty(), "AZÀΣ", "az1 ");
        check("L", Flags::empty(), "aZé中", "1 _");
        check("IsL", Flags::empty(), "aZ", "1");
        check("gc=Nd", Flags::empty(), "09٣", "a");
        check("P", Flags::empty(), ".,!-(", "a1");
    }

    #[test]
    fn test_posix_and_java_names() {
        check("Lower", Flags::empty(), "az", "AZé");
        check("Alnum", Flags::empty(), "a1Z", "_é");
        check("Space", Flags::empty(), " \t\n\u{0B}", "a\u{A0}");
        check("XDigit", Flags::empty(), "09afAF", "gG");
        check("javaLowerCase", Flags::empty(), "aé", "A1");
        check("javaWhitespace", Flags::empty(), " \t\u{2028}", "\u{A0}a");
        check("javaMirrored", Flags::empty(), "()<>", "ab");

        // the Unicode definition
        check("Lower", Flags::UNICODE_CHARACTER_CLASS, "azé", "AZ");
        check("Alpha", Flags::UNICODE_CHARACTER_CLASS, "aé中", "1_");
    }

    #[test]
    fn test_binary_properties() {
        check("IsAlphabetic", Flags::empty(), "aé中", "1 ");
        check("IsWhite_Space", Flags::empty(), " \u{A0}\u{2028}", "a");
        check("IsWhiteSpace", Flags::empty(), " ", "a");
        check("IsIdeographic", Flags::empty(), "中文", "aア");
        check("IsJoin_Control", Flags::empty(), "\u{200C}", "a");
    }

    #[test]
    fn test_scripts_and_blocks() {
        check("IsLatin", Flags::empty(), "aZé", "αя中");
        check("IsGreek", Flags::empty(), "αΩ", "a");
        check("sc=Cyrillic", Flags::empty(), "я", "a");
        check("script=HAN", Flags::empty(), "中", "a");

        check("InBasic_Latin", Flags::empty(), "a~\u{0}", "é");
        check("blk=Basic Latin", Flags::empty(), "a", "é");
        check("InGreek and Coptic", Flags::empty(), "α", "a");
        check("InCJKUnifiedIdeographs", Flags::empty(), "中", "a");
    }

    #[test]
    fn test_unknown_names() {
        assert_eq!(
            resolve_property("Foo", Flags::empty()),
            Err("Unknown character property name {Foo}".to_owned())
        );
        assert_eq!(
            resolve_property("IsFoo", Flags::empty()),
            Err("Unknown character script name {Foo}".to_owned())
        );
        assert_eq!(
            resolve_property("InFoo", Flags::empty()),
            Err("Unknown character block name {Foo}".to_owned())
        );
        assert_eq!(
            resolve_property("foo=bar", Flags::empty()),
            Err("Unknown Unicode property {name=<foo>, value=<bar>}".to_owned())
        );
    }

    #[test]
    fn test_combinators() {
        let letters = CharPredicate::Range('a', 'z');
        let vowels = CharPredicate::Ctype(Ctype::Alpha)
            .intersection(CharPredicate::Single('a').union(CharPredicate::Single('e')));

        let consonants = letters.clone().difference(vowels.clone());
        assert!(consonants.is_match('b'));
        assert!(!consonants.is_match('a'));

        let not_vowels = vowels.complement();
        assert!(not_vowels.is_match('x'));
        assert!(!not_vowels.is_match('e'));

        // double complement collapses
        assert_eq!(letters.clone().complement().complement(), letters);
    }

    #[test]
    fn test_bit_class() {
        let mut bits = BitClass::new();
        bits.add('a', Flags::CASE_INSENSITIVE);
        bits.add('é', Flags::CASE_INSENSITIVE);
        bits.add('ü', Flags::CASE_INSENSITIVE | Flags::UNICODE_CASE);

        assert!(bits.contains('a'));
        assert!(bits.contains('A'));
        assert!(bits.contains('é'));
        assert!(!bits.contains('É'));
        assert!(bits.contains('Ü'));
        assert!(!bits.contains('b'));

        // placeholders are filled in
        let mut predicate = CharPredicate::Bits(BitClass::new()).complement();
        predicate.fill_bits(&bits);
        assert!(!predicate.is_match('a'));
        assert!(predicate.is_match('b'));
    }

    #[test]
    fn test_case_insensitive_ranges() {
        let ascii = CharPredicate::RangeI('a', 'f');
        assert!(ascii.is_match('C'));
        assert!(!ascii.is_match('G'));

        let unicode = CharPredicate::RangeU('α', 'ω');
        assert!(unicode.is_match('Σ'));
        assert!(!CharPredicate::RangeI('α', 'ω').is_match('Σ'));
    }
}
