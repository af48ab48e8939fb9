//! Requirement items.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use super::{
    level::Level,
    stamp::{Stamp, StampContent},
    uid::Uid,
};

/// A link from a child item to a parent item.
///
/// The stamp records the parent's fingerprint at the time the link was
/// last cleared or reviewed; `None` means the link has never been
/// confirmed against the parent's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// The parent item's identifier.
    pub uid: Uid,
    /// The parent fingerprint recorded for this link.
    pub stamp: Stamp,
}

impl Link {
    /// Creates an unconfirmed link.
    #[must_use]
    pub const fn new(uid: Uid) -> Self {
        Self {
            uid,
            stamp: Stamp::none(),
        }
    }
}

// A link with no recorded stamp is stored as a bare UID string; one with
// a stamp as a single-entry map.
impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.stamp.is_set() {
            use serde::ser::SerializeMap;
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry(&self.uid.to_string(), &self.stamp)?;
            map.end()
        } else {
            serializer.serialize_str(&self.uid.to_string())
        }
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = Link;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a UID string or a single-entry {UID: fingerprint} map")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Link, E> {
                let uid = Uid::parse(v).map_err(E::custom)?;
                Ok(Link::new(uid))
            }

            fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Link, A::Error> {
                let Some((key, stamp)) = map.next_entry::<String, Stamp>()? else {
                    return Err(de::Error::custom("empty link map"));
                };
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::custom("link map must have a single entry"));
                }
                let uid = Uid::parse(&key).map_err(de::Error::custom)?;
                Ok(Link { uid, stamp })
            }
        }

        deserializer.deserialize_any(Visitor)
    }
}

/// A structured external reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reference {
    /// A reference to a file (or, with a keyword, a line within one).
    File {
        /// Path relative to the project root.
        path: String,
        /// Optional keyword to locate within the file.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keyword: Option<String>,
    },
}

impl Reference {
    fn stamp_form(&self) -> String {
        match self {
            Self::File { path, keyword } => keyword
                .as_ref()
                .map_or_else(|| path.clone(), |kw| format!("{path}:{kw}")),
        }
    }
}

/// A single requirement.
///
/// Items own their content and links but know nothing about the
/// filesystem; loading and saving live in the storage layer.
#[derive(Debug, Clone)]
pub struct Item {
    uid: Uid,
    /// Inactive items are skipped by validation and excluded from
    /// traceability.
    pub active: bool,
    /// Derived items satisfy their parent document without tracing to a
    /// specific parent item.
    pub derived: bool,
    /// Non-normative items carry no requirement of their own.
    pub normative: bool,
    /// Position in the document outline.
    pub level: Level,
    /// Optional heading text displayed above the item text.
    pub header: String,
    /// The requirement text.
    pub text: String,
    /// Legacy external reference keyword.
    pub reference: String,
    /// Structured external references.
    pub references: Vec<Reference>,
    /// Fingerprint recorded at the last review, if any.
    pub reviewed: Stamp,
    links: Vec<Link>,
    /// Extra attributes preserved verbatim from disk.
    pub attributes: serde_yaml::Mapping,
}

impl Item {
    /// Creates a new, empty, active item.
    #[must_use]
    pub fn new(uid: Uid, level: Level) -> Self {
        Self {
            uid,
            active: true,
            derived: false,
            normative: true,
            level,
            header: String::new(),
            text: String::new(),
            reference: String::new(),
            references: Vec::new(),
            reviewed: Stamp::none(),
            links: Vec::new(),
            attributes: serde_yaml::Mapping::new(),
        }
    }

    /// The item's identifier.
    #[must_use]
    pub const fn uid(&self) -> &Uid {
        &self.uid
    }

    /// The item's parent links.
    #[must_use]
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Mutable access to the parent links.
    pub fn links_mut(&mut self) -> &mut Vec<Link> {
        &mut self.links
    }

    /// Whether this item is a heading rather than a requirement.
    #[must_use]
    pub fn is_heading(&self) -> bool {
        self.level.heading() && !self.normative
    }

    /// Turns this item into a heading.
    pub fn set_heading(&mut self) {
        self.level.set_heading(true);
        self.normative = false;
        self.derived = false;
    }

    /// Adds a link to `parent`, keeping links sorted and unique.
    ///
    /// Returns `false` if the link already existed.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::SelfLink`] when `parent` is this item's own
    /// UID.
    pub fn link(&mut self, parent: Uid) -> Result<bool, LinkError> {
        if parent == self.uid {
            return Err(LinkError::SelfLink(parent));
        }
        if self.links.iter().any(|l| l.uid == parent) {
            return Ok(false);
        }
        self.links.push(Link::new(parent));
        self.links.sort_by(|a, b| a.uid.cmp(&b.uid));
        Ok(true)
    }

    /// Removes the link to `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotLinked`] when no such link exists.
    pub fn unlink(&mut self, parent: &Uid) -> Result<(), LinkError> {
        let before = self.links.len();
        self.links.retain(|l| &l.uid != parent);
        if self.links.len() == before {
            return Err(LinkError::NotLinked(parent.clone()));
        }
        Ok(())
    }

    /// Computes the item's current fingerprint.
    ///
    /// `extra_attributes` names additional attributes folded into the
    /// fingerprint; `with_links` includes the linked UIDs, which is the
    /// form recorded by a review.
    #[must_use]
    pub fn stamp(&self, extra_attributes: &[String], with_links: bool) -> Stamp {
        let mut keys: Vec<&String> = extra_attributes.iter().collect();
        keys.sort();
        keys.dedup();
        let attributes = keys
            .into_iter()
            .filter_map(|key| {
                let value = self.attributes.get(key.as_str())?;
                let canonical = serde_json::to_string(value).ok()?;
                Some((key.clone(), canonical))
            })
            .collect();

        let links = with_links.then(|| {
            let mut uids: Vec<String> = self.links.iter().map(|l| l.uid.to_string()).collect();
            uids.sort();
            uids
        });

        StampContent {
            uid: &self.uid.to_string(),
            text: &self.text,
            reference: &self.reference,
            references: self.references.iter().map(Reference::stamp_form).collect(),
            attributes,
            links,
        }
        .digest()
    }

    /// Marks the item as reviewed at its current content.
    pub fn review(&mut self, extra_attributes: &[String]) {
        self.reviewed = self.stamp(extra_attributes, true);
    }

    /// Whether the item has never been reviewed.
    #[must_use]
    pub const fn is_unreviewed(&self) -> bool {
        !self.reviewed.is_set()
    }

    /// Whether the item's content changed since its last review.
    ///
    /// Never-reviewed items are not "changed"; they are reported
    /// separately.
    #[must_use]
    pub fn has_unreviewed_changes(&self, extra_attributes: &[String]) -> bool {
        self.reviewed.is_set() && self.reviewed != self.stamp(extra_attributes, true)
    }
}

/// Errors from link manipulation on a single item.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    /// An item cannot link to itself.
    #[error("{0} cannot link to itself")]
    SelfLink(Uid),

    /// The link to remove does not exist.
    #[error("no link to {0}")]
    NotLinked(Uid),
}
