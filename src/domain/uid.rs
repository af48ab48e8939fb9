//! Item identifiers.
//!
//! A [`Uid`] is the identity of an item: a document [`Prefix`], an optional
//! [`Separator`], and either a number or a name. `REQ001` and `REQ-001` are
//! the same identifier; the separator is cosmetic.

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    str::FromStr,
};

use non_empty_string::NonEmptyString;

/// Characters accepted as a prefix/number separator.
pub const SEP_CHARS: [char; 3] = ['-', '_', '.'];

/// Words that cannot be used as document prefixes.
const RESERVED_WORDS: [&str; 1] = ["all"];

/// A validated document prefix.
///
/// Prefixes are non-empty, contain only word characters plus `.`, `-` and
/// `_`, and must not end with a digit (the trailing digit run of a UID is
/// its number). Comparison is case-insensitive.
#[derive(Debug, Clone)]
pub struct Prefix(NonEmptyString);

impl Prefix {
    /// Creates a new `Prefix` from a string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Prefix`] if the string is empty, ends with a digit,
    /// contains characters outside `[A-Za-z0-9._-]`, or is a reserved word.
    pub fn new(s: &str) -> Result<Self, Error> {
        let non_empty = NonEmptyString::new(s.to_string())
            .map_err(|_| Error::Prefix(s.to_string()))?;

        if RESERVED_WORDS.contains(&s.to_lowercase().as_str()) {
            return Err(Error::Reserved(s.to_string()));
        }
        if s.ends_with(|c: char| c.is_ascii_digit()) {
            return Err(Error::Prefix(s.to_string()));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || SEP_CHARS.contains(&c))
        {
            return Err(Error::Prefix(s.to_string()));
        }

        Ok(Self(non_empty))
    }

    /// Returns the prefix as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the case-normalised form used for comparison and lookup.
    #[must_use]
    pub fn key(&self) -> String {
        self.0.as_str().to_lowercase()
    }
}

impl PartialEq for Prefix {
    fn eq(&self, other: &Self) -> bool {
        self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for Prefix {}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for Prefix {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// The separator between a UID's prefix and its number or name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum Separator {
    /// No separator: `REQ001`.
    #[default]
    None,
    /// Hyphen: `REQ-001`.
    Hyphen,
    /// Underscore: `REQ_001`.
    Underscore,
    /// Dot: `REQ.001`.
    Dot,
}

impl Separator {
    /// Returns the separator as a string slice.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Hyphen => "-",
            Self::Underscore => "_",
            Self::Dot => ".",
        }
    }

    /// Parses a separator from a configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Separator`] for anything other than `""`, `"-"`,
    /// `"_"` or `"."`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "" => Ok(Self::None),
            "-" => Ok(Self::Hyphen),
            "_" => Ok(Self::Underscore),
            "." => Ok(Self::Dot),
            other => Err(Error::Separator(other.to_string())),
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '-' => Some(Self::Hyphen),
            '_' => Some(Self::Underscore),
            '.' => Some(Self::Dot),
            _ => None,
        }
    }
}

/// The discriminating part of a UID: a number or a name.
///
/// Numbers order before names; names order alphabetically among themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tail {
    /// A numeric item, zero-padded for display per the document's digits.
    Number(u32),
    /// A named item. Contains no separator characters.
    Name(String),
}

impl PartialOrd for Tail {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tail {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Number(_), Self::Name(_)) => Ordering::Less,
            (Self::Name(_), Self::Number(_)) => Ordering::Greater,
            (Self::Name(a), Self::Name(b)) => a.cmp(b),
        }
    }
}

/// A unique item identifier.
///
/// Constructed from a filename stem or user input, immutable afterwards.
/// Display renders the value exactly as constructed; equality, ordering and
/// hashing use the normalised `(prefix, tail)` pair, so `REQ001 == REQ-001`.
#[derive(Debug, Clone)]
pub struct Uid {
    value: String,
    prefix: Prefix,
    separator: Separator,
    tail: Tail,
}

impl Uid {
    /// Builds a numeric UID from parts, zero-padding the number to `digits`.
    #[must_use]
    pub fn from_parts(prefix: Prefix, separator: Separator, number: u32, digits: usize) -> Self {
        let value = format!("{prefix}{}{number:0digits$}", separator.as_str());
        Self {
            value,
            prefix,
            separator,
            tail: Tail::Number(number),
        }
    }

    /// Builds a named UID from parts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Name`] if the name is empty, all digits, or
    /// contains a separator character.
    pub fn from_name(prefix: Prefix, separator: Separator, name: &str) -> Result<Self, Error> {
        if name.is_empty()
            || name.chars().all(|c| c.is_ascii_digit())
            || name.contains(SEP_CHARS)
        {
            return Err(Error::Name(name.to_string()));
        }
        let value = format!("{prefix}{}{name}", separator.as_str());
        Ok(Self {
            value,
            prefix,
            separator,
            tail: Tail::Name(name.to_string()),
        })
    }

    /// The document prefix.
    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// The separator between prefix and tail.
    #[must_use]
    pub const fn separator(&self) -> Separator {
        self.separator
    }

    /// The number or name.
    #[must_use]
    pub const fn tail(&self) -> &Tail {
        &self.tail
    }

    /// The number, if this is a numeric UID.
    #[must_use]
    pub const fn number(&self) -> Option<u32> {
        match self.tail {
            Tail::Number(n) => Some(n),
            Tail::Name(_) => None,
        }
    }

    /// Parses a UID from free text, inferring the prefix.
    ///
    /// The text is split at its trailing digit run; trailing separator
    /// characters are stripped from the prefix. Text without a trailing
    /// digit run is treated as a named UID split at its last separator.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix or number/name part is empty or
    /// invalid.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let digit_start = text
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i);

        if let Some(start) = digit_start {
            if start == 0 {
                return Err(Error::Syntax(text.to_string()));
            }
            let (head, digits) = text.split_at(start);
            let (prefix_str, separator) = strip_trailing_separator(head);
            let prefix = Prefix::new(prefix_str)
                .map_err(|_| Error::Syntax(text.to_string()))?;
            let number: u32 = digits
                .parse()
                .map_err(|_| Error::Number(text.to_string(), digits.to_string()))?;
            return Ok(Self {
                value: text.to_string(),
                prefix,
                separator,
                tail: Tail::Number(number),
            });
        }

        // No trailing digits: a named UID, split at the last separator.
        let split = text
            .char_indices()
            .rev()
            .find(|(_, c)| SEP_CHARS.contains(c))
            .map(|(i, _)| i)
            .ok_or_else(|| Error::Syntax(text.to_string()))?;
        let prefix = Prefix::new(&text[..split])
            .map_err(|_| Error::Syntax(text.to_string()))?;
        let sep_char = text[split..].chars().next().unwrap_or('-');
        let separator = Separator::from_char(sep_char).unwrap_or(Separator::Hyphen);
        let name = &text[split + 1..];
        if name.is_empty() {
            return Err(Error::Syntax(text.to_string()));
        }
        Self::from_name(prefix, separator, name)
    }

    /// Parses a UID against a set of known document prefixes.
    ///
    /// The embedded separator (or lack of one) is ignored when matching,
    /// so `REQ001` resolves against a document configured with `REQ` + `-`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ambiguous`] when the text matches more than one
    /// known prefix, and falls back to [`Self::parse`] when it matches
    /// none.
    pub fn parse_known<'a, I>(text: &str, known: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = &'a Prefix>,
    {
        let lower = text.to_lowercase();
        let mut candidates: Vec<Self> = Vec::new();

        for prefix in known {
            let key = prefix.key();
            if !lower.starts_with(&key) {
                continue;
            }
            let mut rest = &text[key.len()..];
            let mut separator = Separator::None;
            if let Some(c) = rest.chars().next() {
                if let Some(sep) = Separator::from_char(c) {
                    separator = sep;
                    rest = &rest[c.len_utf8()..];
                }
            }
            if rest.is_empty() {
                continue;
            }
            let uid = if rest.chars().all(|c| c.is_ascii_digit()) {
                let number: u32 = rest
                    .parse()
                    .map_err(|_| Error::Number(text.to_string(), rest.to_string()))?;
                Self {
                    value: text.to_string(),
                    prefix: prefix.clone(),
                    separator,
                    tail: Tail::Number(number),
                }
            } else {
                match Self::from_name(prefix.clone(), separator, rest) {
                    Ok(uid) => uid,
                    Err(_) => continue,
                }
            };
            candidates.push(uid);
        }

        match candidates.len() {
            0 => Self::parse(text),
            1 => Ok(candidates.remove(0)),
            _ => Err(Error::Ambiguous(
                text.to_string(),
                candidates
                    .iter()
                    .map(|c| c.prefix.as_str().to_string())
                    .collect(),
            )),
        }
    }
}

fn strip_trailing_separator(head: &str) -> (&str, Separator) {
    let mut separator = Separator::None;
    let mut end = head.len();
    for c in head.chars().rev() {
        match Separator::from_char(c) {
            Some(sep) => {
                separator = sep;
                end -= c.len_utf8();
            }
            None => break,
        }
    }
    (&head[..end], separator)
}

impl PartialEq for Uid {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix && self.tail == other.tail
    }
}

impl Eq for Uid {}

impl PartialOrd for Uid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Uid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.prefix
            .cmp(&other.prefix)
            .then_with(|| self.tail.cmp(&other.tail))
    }
}

impl Hash for Uid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.prefix.hash(state);
        self.tail.hash(state);
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Errors that can occur during UID parsing or construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// The text is not a recognisable UID.
    #[error("invalid UID: {0}")]
    Syntax(String),

    /// The prefix part is empty or malformed.
    #[error("invalid prefix: '{0}'")]
    Prefix(String),

    /// The prefix is a reserved word.
    #[error("cannot use reserved word: {0}")]
    Reserved(String),

    /// The number part could not be parsed.
    #[error("invalid number in UID '{0}': {1}")]
    Number(String, String),

    /// The name part is empty or contains separator characters.
    #[error("invalid name: '{0}'")]
    Name(String),

    /// The separator is not one of `''`, `-`, `_`, `.`.
    #[error("invalid separator: '{0}'")]
    Separator(String),

    /// The text matched multiple known document prefixes.
    #[error("ambiguous UID '{0}': matches prefixes {list}", list = .1.join(", "))]
    Ambiguous(String, Vec<String>),
}
