//! Outline levels.
//!
//! A [`Level`] is a dotted sequence of positive integers (`1.2.3`) plus a
//! heading flag. The flag is stored on disk as a trailing zero component:
//! `2.0` is the heading above `2.1`. Equality and ordering ignore the flag.

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

/// An item's position in the document outline.
#[derive(Debug, Clone)]
pub struct Level {
    parts: Vec<u32>,
    heading: bool,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            parts: vec![1],
            heading: true,
        }
    }
}

impl Level {
    /// Creates a level from its components.
    ///
    /// Interior zeros are normalised to 1 and an empty sequence becomes
    /// `[1]`. A single trailing zero sets the heading flag instead of
    /// being kept as a component.
    #[must_use]
    pub fn new(parts: &[u32], heading: bool) -> Self {
        let mut parts: Vec<u32> = parts.to_vec();
        let mut heading = heading;

        // Collapse trailing zeros into the heading flag.
        while parts.len() > 1 && parts.last() == Some(&0) {
            parts.pop();
            heading = true;
        }
        if parts.last() == Some(&0) {
            // A bare zero is the heading form of level 1.
            parts = vec![1];
            heading = true;
        }
        for part in &mut parts {
            if *part == 0 {
                *part = 1;
            }
        }
        if parts.is_empty() {
            parts.push(1);
        }

        Self { parts, heading }
    }

    /// The level components, without the heading zero.
    #[must_use]
    pub fn parts(&self) -> &[u32] {
        &self.parts
    }

    /// Whether this level marks a heading.
    #[must_use]
    pub const fn heading(&self) -> bool {
        self.heading
    }

    /// Sets or clears the heading flag.
    pub fn set_heading(&mut self, heading: bool) {
        self.heading = heading;
    }

    /// The outline depth (number of components).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.parts.len()
    }

    /// The components as rendered on disk, heading zero included.
    #[must_use]
    pub fn value(&self) -> Vec<u32> {
        let mut value = self.parts.clone();
        if self.heading {
            value.push(0);
        }
        value
    }

    /// Returns this level with its last component incremented.
    #[must_use]
    pub fn incremented(&self) -> Self {
        let mut parts = self.parts.clone();
        if let Some(last) = parts.last_mut() {
            *last += 1;
        }
        Self {
            parts,
            heading: self.heading,
        }
    }

    /// Returns this level indented by one (a new `1` component appended).
    #[must_use]
    pub fn indented(&self) -> Self {
        let mut parts = self.parts.clone();
        parts.push(1);
        Self {
            parts,
            heading: self.heading,
        }
    }

    /// Returns this level dedented by one component.
    ///
    /// Dedenting a top-level level is a no-op.
    #[must_use]
    pub fn dedented(&self) -> Self {
        let mut parts = self.parts.clone();
        if parts.len() > 1 {
            parts.pop();
        }
        Self {
            parts,
            heading: self.heading,
        }
    }
}

impl PartialEq for Level {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for Level {}

impl PartialOrd for Level {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Level {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl std::hash::Hash for Level {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rendered: Vec<String> = self.value().iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("."))
    }
}

impl FromStr for Level {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError(s.to_string()));
        }
        let parts: Vec<u32> = s
            .split('.')
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| ParseError(s.to_string()))?;
        Ok(Self::new(&parts, false))
    }
}

/// The level text could not be parsed as dotted integers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid level: '{0}'")]
pub struct ParseError(String);

// On disk a level is the most compact YAML scalar that round-trips:
// one component saves as an integer, two as a float unless the text
// form would lose a trailing zero ("1.10"), and anything deeper as a
// string.
impl Serialize for Level {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = self.value();
        match value.len() {
            1 => serializer.serialize_u64(u64::from(value[0])),
            2 => {
                let text = format!("{}.{}", value[0], value[1]);
                if value[1] != 0 && text.ends_with('0') {
                    serializer.serialize_str(&text)
                } else {
                    serializer.serialize_f64(
                        text.parse().map_err(serde::ser::Error::custom)?,
                    )
                }
            }
            _ => serializer.serialize_str(&self.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl de::Visitor<'_> for Visitor {
            type Value = Level;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an outline level (integer, float or dotted string)")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Level, E> {
                let part = u32::try_from(v).map_err(E::custom)?;
                Ok(Level::new(&[part], false))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Level, E> {
                let part = u32::try_from(v).map_err(E::custom)?;
                Ok(Level::new(&[part], false))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Level, E> {
                let mut text = format!("{v}");
                if !text.contains('.') {
                    text.push_str(".0");
                }
                text.parse().map_err(E::custom)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Level, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}
