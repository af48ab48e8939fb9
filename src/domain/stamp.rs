//! Review fingerprints.
//!
//! A [`Stamp`] records the content an item (or link target) looked like
//! when it was last reviewed. Stamps are computed by serialising the
//! reviewed fields with a canonical binary encoding, hashing with SHA-256
//! and rendering as unpadded URL-safe base64.

use base64::Engine as _;
use borsh::BorshSerialize;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A recorded fingerprint, or the absence of one.
///
/// Serialises as a plain string, or `null` when empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stamp(Option<String>);

impl Stamp {
    /// The never-reviewed stamp.
    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }

    /// Whether a fingerprint is recorded.
    #[must_use]
    pub const fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// The recorded fingerprint, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl From<String> for Stamp {
    fn from(value: String) -> Self {
        Self(Some(value))
    }
}

/// The fields folded into an item's fingerprint.
///
/// Field order is part of the format; changing it invalidates every
/// recorded stamp.
#[derive(BorshSerialize)]
pub struct StampContent<'a> {
    /// The item's identifier, as displayed.
    pub uid: &'a str,
    /// The item text.
    pub text: &'a str,
    /// The legacy external reference keyword.
    pub reference: &'a str,
    /// Structured external references, rendered `path` or `path:keyword`.
    pub references: Vec<String>,
    /// Extra reviewed attributes, as `(key, canonical JSON value)` pairs
    /// sorted by key.
    pub attributes: Vec<(String, String)>,
    /// Linked parent UIDs, sorted, when links are part of the review.
    pub links: Option<Vec<String>>,
}

impl StampContent<'_> {
    /// Computes the fingerprint of this content.
    ///
    /// # Panics
    ///
    /// Panics if canonical serialisation fails, which cannot happen for
    /// in-memory data.
    #[must_use]
    pub fn digest(&self) -> Stamp {
        let bytes = borsh::to_vec(self).expect("stamp content serialisation is infallible");
        let hash = Sha256::digest(&bytes);
        Stamp(Some(
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content<'a>(uid: &'a str, text: &'a str) -> StampContent<'a> {
        StampContent {
            uid,
            text,
            reference: "",
            references: Vec::new(),
            attributes: Vec::new(),
            links: None,
        }
    }

    #[test]
    fn digest_is_deterministic() {
        let a = content("REQ001", "The system shall do the thing.").digest();
        let b = content("REQ001", "The system shall do the thing.").digest();
        assert_eq!(a, b);
    }

    #[test]
    fn digest_changes_with_text() {
        let a = content("REQ001", "one").digest();
        let b = content("REQ001", "two").digest();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_changes_with_uid() {
        let a = content("REQ001", "same").digest();
        let b = content("REQ002", "same").digest();
        assert_ne!(a, b);
    }

    #[test]
    fn digest_changes_with_links() {
        let mut with_links = content("REQ001", "text");
        with_links.links = Some(vec!["SYS001".to_string()]);
        assert_ne!(with_links.digest(), content("REQ001", "text").digest());
    }

    #[test]
    fn digest_is_url_safe() {
        let stamp = content("REQ001", "text").digest();
        let value = stamp.value().unwrap();
        assert!(!value.contains('+'));
        assert!(!value.contains('/'));
        assert!(!value.contains('='));
        assert_eq!(value.len(), 43);
    }

    #[test]
    fn null_stamp_round_trips_as_yaml_null() {
        let yaml = serde_yaml::to_string(&Stamp::none()).unwrap();
        assert_eq!(yaml.trim(), "null");
        let back: Stamp = serde_yaml::from_str("null").unwrap();
        assert!(!back.is_set());
    }
}
