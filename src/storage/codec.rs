//! On-disk item formats.
//!
//! Items are stored one file per item, either as plain YAML or as
//! Markdown with YAML frontmatter. Unknown attributes round-trip
//! untouched so hand-edited files survive a load/save cycle.

use std::{fs, io, path::Path};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::domain::{Item, Level, Link, Reference, Stamp, Uid};

/// The storage format for a document's item files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemFormat {
    /// Plain YAML, one mapping per file.
    #[default]
    Yaml,
    /// YAML frontmatter followed by a Markdown body.
    Markdown,
}

impl ItemFormat {
    /// The filename extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yml",
            Self::Markdown => "md",
        }
    }

    /// Parses an item file's contents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] for malformed YAML and
    /// [`Error::Frontmatter`] for a Markdown file without a frontmatter
    /// block.
    pub fn decode(self, raw: &str, uid: Uid) -> Result<Item, Error> {
        let file: ItemFile = match self {
            Self::Yaml => serde_yaml::from_str(raw)?,
            Self::Markdown => {
                let (frontmatter, body) = split_frontmatter(raw)?;
                let mut file: ItemFile = serde_yaml::from_str(frontmatter)?;
                let (header, text) = split_body(body);
                file.header = header;
                file.text = text;
                file
            }
        };
        Ok(file.into_item(uid))
    }

    /// Renders an item for writing to disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Yaml`] if the item's attributes cannot be
    /// serialised.
    pub fn encode(self, item: &Item) -> Result<String, Error> {
        let file = ItemFile::from_item(item);
        match self {
            Self::Yaml => Ok(serde_yaml::to_string(&file)?),
            Self::Markdown => {
                let mut value = serde_yaml::to_value(&file)?;
                if let Value::Mapping(mapping) = &mut value {
                    mapping.remove("header");
                    mapping.remove("text");
                }
                let frontmatter = serde_yaml::to_string(&value)?;
                let mut out = format!("---\n{frontmatter}---\n");
                if !item.header.is_empty() {
                    out.push_str("\n# ");
                    out.push_str(&item.header);
                    out.push('\n');
                }
                if !item.text.is_empty() {
                    out.push('\n');
                    out.push_str(&item.text);
                    if !item.text.ends_with('\n') {
                        out.push('\n');
                    }
                }
                Ok(out)
            }
        }
    }
}

fn split_frontmatter(raw: &str) -> Result<(&str, &str), Error> {
    let rest = raw.strip_prefix("---\n").ok_or(Error::Frontmatter)?;
    let end = rest.find("\n---").ok_or(Error::Frontmatter)?;
    let frontmatter = &rest[..=end];
    let body = rest[end + 4..].trim_start_matches('\n');
    Ok((frontmatter, body))
}

/// Splits a Markdown body into an optional leading heading and the text.
fn split_body(body: &str) -> (String, String) {
    let trimmed = body.trim_start_matches('\n');
    if let Some(first_line_end) = trimmed.find('\n').or(Some(trimmed.len())) {
        let first_line = &trimmed[..first_line_end];
        if let Some(header) = first_line.strip_prefix("# ") {
            let text = trimmed[first_line_end..].trim_start_matches('\n');
            return (
                header.trim().to_string(),
                text.trim_end_matches('\n').to_string(),
            );
        }
    }
    (String::new(), trimmed.trim_end_matches('\n').to_string())
}

/// The serialised form of an item.
#[derive(Debug, Serialize, Deserialize)]
struct ItemFile {
    #[serde(default = "default_true")]
    active: bool,
    #[serde(default)]
    derived: bool,
    #[serde(default = "default_true")]
    normative: bool,
    #[serde(default)]
    level: Level,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    header: String,
    #[serde(default)]
    text: String,
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    reference: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    references: Vec<Reference>,
    #[serde(default)]
    reviewed: Stamp,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(flatten)]
    attributes: Mapping,
}

const fn default_true() -> bool {
    true
}

impl ItemFile {
    fn into_item(self, uid: Uid) -> Item {
        let mut item = Item::new(uid, self.level);
        item.active = self.active;
        item.derived = self.derived;
        item.normative = self.normative;
        item.header = self.header;
        item.text = self.text;
        item.reference = self.reference;
        item.references = self.references;
        item.reviewed = self.reviewed;
        *item.links_mut() = self.links;
        item.links_mut().sort_by(|a, b| a.uid.cmp(&b.uid));
        item.attributes = self.attributes;
        item
    }

    fn from_item(item: &Item) -> Self {
        Self {
            active: item.active,
            derived: item.derived,
            normative: item.normative,
            level: item.level.clone(),
            header: item.header.clone(),
            text: item.text.clone(),
            reference: item.reference.clone(),
            references: item.references.clone(),
            reviewed: item.reviewed.clone(),
            links: item.links().to_vec(),
            attributes: item.attributes.clone(),
        }
    }
}

/// Reads a YAML file, resolving `!include` tags relative to the file.
///
/// # Errors
///
/// Returns an error for unreadable files, malformed YAML, absolute
/// include paths or includes that escape resolution.
pub fn read_yaml_with_includes(path: &Path) -> Result<Value, Error> {
    let raw = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })?;
    let value: Value = serde_yaml::from_str(&raw)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_includes(value, dir)
}

fn resolve_includes(value: Value, dir: &Path) -> Result<Value, Error> {
    match value {
        Value::Tagged(tagged) if tagged.tag == "!include" => {
            let Value::String(relative) = &tagged.value else {
                return Err(Error::Include(
                    "!include expects a relative path string".to_string(),
                ));
            };
            if Path::new(relative).is_absolute() {
                return Err(Error::Include(format!(
                    "absolute include path not allowed: {relative}"
                )));
            }
            let target = dir.join(relative);
            read_yaml_with_includes(&target)
        }
        Value::Mapping(mapping) => {
            let mut resolved = Mapping::new();
            for (key, value) in mapping {
                resolved.insert(key, resolve_includes(value, dir)?);
            }
            Ok(Value::Mapping(resolved))
        }
        Value::Sequence(sequence) => Ok(Value::Sequence(
            sequence
                .into_iter()
                .map(|v| resolve_includes(v, dir))
                .collect::<Result<_, _>>()?,
        )),
        other => Ok(other),
    }
}

/// Errors from reading or writing item and configuration files.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file could not be read.
    #[error("cannot read {path}")]
    Read {
        /// The offending path.
        path: String,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The YAML content is malformed.
    #[error("malformed YAML")]
    Yaml(#[from] serde_yaml::Error),

    /// A Markdown item file is missing its frontmatter block.
    #[error("missing YAML frontmatter")]
    Frontmatter,

    /// An `!include` tag could not be resolved.
    #[error("invalid include: {0}")]
    Include(String),
}
