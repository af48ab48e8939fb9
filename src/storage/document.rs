//! Document directories.
//!
//! A document is a directory containing a `.config.yml` and one file per
//! item. Items are loaded lazily and cached; every mutation re-reads the
//! item from disk, applies the change and writes it back immediately.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;
use tracing::{debug, warn};

use super::codec::{self, ItemFormat, read_yaml_with_includes};
use crate::domain::{Issue, Item, Level, Prefix, Separator, Severity, Stamp, Uid};

/// The per-document configuration filename.
pub const CONFIG_FILE: &str = ".config.yml";

/// Marker file that excludes a directory from tree discovery.
pub const SKIP_FILE: &str = ".skip";

/// What to do with an item file that fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnMalformed {
    /// Record an error finding and keep loading.
    #[default]
    Skip,
    /// Fail the whole load.
    Abort,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    settings: SettingsFile,
    #[serde(default)]
    attributes: AttributesFile,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsFile {
    prefix: String,
    #[serde(default)]
    sep: String,
    #[serde(default = "default_digits")]
    digits: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(default)]
    itemformat: ItemFormat,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AttributesFile {
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    defaults: Mapping,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    reviewed: Vec<String>,
}

const fn default_digits() -> usize {
    3
}

/// A requirements document: a directory of item files plus configuration.
#[derive(Debug)]
pub struct Document {
    path: PathBuf,
    prefix: Prefix,
    separator: Separator,
    digits: usize,
    parent: Option<Prefix>,
    format: ItemFormat,
    defaults: Mapping,
    reviewed_attributes: Vec<String>,
    on_malformed: OnMalformed,
    items: Option<BTreeMap<Uid, Item>>,
    load_issues: Vec<Issue>,
    generation: u64,
}

impl Document {
    /// Opens an existing document directory by reading its configuration.
    ///
    /// Items are not loaded until first accessed.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration file is missing or
    /// malformed.
    pub fn open(path: &Path, on_malformed: OnMalformed) -> Result<Self, Error> {
        let config_path = path.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Err(Error::MissingConfig(path.display().to_string()));
        }
        let value = read_yaml_with_includes(&config_path)?;
        let config: ConfigFile = serde_yaml::from_value(value).map_err(codec::Error::Yaml)?;

        let prefix = Prefix::new(&config.settings.prefix).map_err(Error::Uid)?;
        let separator = Separator::parse(&config.settings.sep).map_err(Error::Uid)?;
        let parent = config
            .settings
            .parent
            .as_deref()
            .map(Prefix::new)
            .transpose()
            .map_err(Error::Uid)?;

        debug!(prefix = %prefix, path = %path.display(), "opened document");

        Ok(Self {
            path: path.to_path_buf(),
            prefix,
            separator,
            digits: config.settings.digits,
            parent,
            format: config.settings.itemformat,
            defaults: config.attributes.defaults,
            reviewed_attributes: config.attributes.reviewed,
            on_malformed,
            items: None,
            load_issues: Vec::new(),
            generation: 0,
        })
    }

    /// Creates a new document directory and writes its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory already holds a document or
    /// cannot be written.
    pub fn create(
        path: &Path,
        prefix: Prefix,
        separator: Separator,
        digits: usize,
        parent: Option<Prefix>,
    ) -> Result<Self, Error> {
        let config_path = path.join(CONFIG_FILE);
        if config_path.exists() {
            return Err(Error::AlreadyExists(path.display().to_string()));
        }
        fs::create_dir_all(path).map_err(|source| Error::io(path, source))?;

        let config = ConfigFile {
            settings: SettingsFile {
                prefix: prefix.to_string(),
                sep: separator.as_str().to_string(),
                digits,
                parent: parent.as_ref().map(ToString::to_string),
                itemformat: ItemFormat::default(),
            },
            attributes: AttributesFile::default(),
        };
        let raw = serde_yaml::to_string(&config).map_err(codec::Error::Yaml)?;
        fs::write(&config_path, raw).map_err(|source| Error::io(&config_path, source))?;

        Self::open(path, OnMalformed::default())
    }

    /// The document directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The document's prefix.
    #[must_use]
    pub const fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    /// The configured UID separator.
    #[must_use]
    pub const fn separator(&self) -> Separator {
        self.separator
    }

    /// The number of digits in generated UIDs.
    #[must_use]
    pub const fn digits(&self) -> usize {
        self.digits
    }

    /// The parent document's prefix, if any.
    #[must_use]
    pub const fn parent(&self) -> Option<&Prefix> {
        self.parent.as_ref()
    }

    /// The item storage format.
    #[must_use]
    pub const fn format(&self) -> ItemFormat {
        self.format
    }

    /// Extra attributes folded into item fingerprints.
    #[must_use]
    pub fn reviewed_attributes(&self) -> &[String] {
        &self.reviewed_attributes
    }

    /// Findings recorded while loading, such as malformed item files.
    #[must_use]
    pub fn load_issues(&self) -> &[Issue] {
        &self.load_issues
    }

    /// A counter bumped by every mutation, for cache invalidation.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// The path of the file holding `uid`.
    #[must_use]
    pub fn item_path(&self, uid: &Uid) -> PathBuf {
        self.path.join(format!("{uid}.{}", self.format.extension()))
    }

    /// The items of this document, keyed and ordered by UID.
    ///
    /// Loads from disk on first access.
    ///
    /// # Errors
    ///
    /// Returns an error when loading aborts on a malformed item.
    pub fn items(&mut self) -> Result<&BTreeMap<Uid, Item>, Error> {
        self.ensure_loaded()?;
        Ok(self.items.as_ref().unwrap_or(&EMPTY))
    }

    /// The items sorted by outline position, ties broken by UID.
    ///
    /// # Errors
    ///
    /// Propagates load errors.
    pub fn items_by_level(&mut self) -> Result<Vec<&Item>, Error> {
        self.ensure_loaded()?;
        let mut items: Vec<&Item> = self
            .items
            .as_ref()
            .unwrap_or(&EMPTY)
            .values()
            .collect();
        items.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.uid().cmp(b.uid())));
        Ok(items)
    }

    /// Looks up a single item.
    ///
    /// # Errors
    ///
    /// Propagates load errors.
    pub fn item(&mut self, uid: &Uid) -> Result<Option<&Item>, Error> {
        self.ensure_loaded()?;
        Ok(self.items.as_ref().and_then(|items| items.get(uid)))
    }

    /// Edits an item and writes it straight back to disk.
    ///
    /// The item is re-read from its file first, so concurrent on-disk
    /// changes are not clobbered by a stale cache. Returns the item
    /// after the edit.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] when no such item exists, or an
    /// I/O or parse error from the round-trip.
    pub fn edit_item<F>(&mut self, uid: &Uid, edit: F) -> Result<Item, Error>
    where
        F: FnOnce(&mut Item),
    {
        self.ensure_loaded()?;
        let canonical = self
            .items
            .as_ref()
            .and_then(|items| items.get(uid))
            .ok_or_else(|| Error::UnknownItem(uid.clone()))?
            .uid()
            .clone();

        let path = self.item_path(&canonical);
        let raw = fs::read_to_string(&path).map_err(|source| Error::io(&path, source))?;
        let mut item = self.format.decode(&raw, canonical.clone())?;
        edit(&mut item);
        self.save_item(&item)?;
        Ok(item)
    }

    /// Computes an item's current fingerprint using this document's
    /// reviewed attributes.
    #[must_use]
    pub fn stamp_item(&self, item: &Item, with_links: bool) -> Stamp {
        item.stamp(&self.reviewed_attributes, with_links)
    }

    /// The next free item number.
    ///
    /// # Errors
    ///
    /// Propagates load errors.
    pub fn next_number(&mut self) -> Result<u32, Error> {
        self.ensure_loaded()?;
        let max = self
            .items
            .as_ref()
            .unwrap_or(&EMPTY)
            .keys()
            .filter_map(Uid::number)
            .max()
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// Creates a new item, applying the configured attribute defaults.
    ///
    /// Without an explicit level the item goes after the current last
    /// item, at its level incremented.
    ///
    /// # Errors
    ///
    /// Propagates load, parse and write errors.
    pub fn add_item(&mut self, level: Option<Level>) -> Result<Uid, Error> {
        let level = match level {
            Some(level) => level,
            None => self
                .items_by_level()?
                .last()
                .map_or_else(|| Level::new(&[1, 1], false), |last| {
                    let mut next = last.level.incremented();
                    next.set_heading(false);
                    next
                }),
        };
        self.create_item(level, false)
    }

    /// Creates a new heading item, one outline level below the current
    /// last item.
    ///
    /// # Errors
    ///
    /// Propagates load, parse and write errors.
    pub fn add_heading(&mut self, level: Option<Level>) -> Result<Uid, Error> {
        let mut level = match level {
            Some(level) => level,
            None => self
                .items_by_level()?
                .last()
                .map_or_else(|| Level::new(&[1], true), |last| last.level.indented()),
        };
        level.set_heading(true);
        self.create_item(level, true)
    }

    fn create_item(&mut self, level: Level, heading: bool) -> Result<Uid, Error> {
        let number = self.next_number()?;
        let uid = Uid::from_parts(self.prefix.clone(), self.separator, number, self.digits);

        let mut item = if self.defaults.is_empty() {
            Item::new(uid.clone(), level)
        } else {
            // Defaults use the same shape as an item file.
            let raw = serde_yaml::to_string(&self.defaults).map_err(codec::Error::Yaml)?;
            let mut item = ItemFormat::Yaml.decode(&raw, uid.clone())?;
            item.level = level;
            item
        };
        item.reviewed = Stamp::none();
        if heading {
            item.set_heading();
        }

        self.save_item(&item)?;
        debug!(uid = %uid, level = %item.level, "added item");
        Ok(uid)
    }

    /// Deletes an item's file and returns the removed item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] when no such item exists.
    pub fn remove_item(&mut self, uid: &Uid) -> Result<Item, Error> {
        self.ensure_loaded()?;
        let item = self
            .items
            .as_mut()
            .and_then(|items| items.remove(uid))
            .ok_or_else(|| Error::UnknownItem(uid.clone()))?;
        let path = self.item_path(item.uid());
        fs::remove_file(&path).map_err(|source| Error::io(&path, source))?;
        self.generation += 1;
        debug!(uid = %uid, "removed item");
        Ok(item)
    }

    /// Renumbers all items so levels are sequential per depth, keeping
    /// document order and heading flags. Idempotent.
    ///
    /// # Errors
    ///
    /// Propagates load and write errors.
    pub fn reorder(&mut self) -> Result<(), Error> {
        self.ensure_loaded()?;
        let ordered: Vec<(Uid, usize, bool)> = self
            .items_by_level()?
            .iter()
            .map(|item| (item.uid().clone(), item.level.depth(), item.level.heading()))
            .collect();

        let depths: Vec<usize> = ordered.iter().map(|(_, depth, _)| *depth).collect();
        let levels = assign_levels(&depths);

        for ((uid, _, heading), parts) in ordered.into_iter().zip(levels) {
            let new_level = Level::new(&parts, heading);
            let current = self
                .items
                .as_ref()
                .and_then(|items| items.get(&uid))
                .map(|item| item.level.clone());
            if current.as_ref() == Some(&new_level) {
                continue;
            }
            self.edit_item(&uid, |item| item.level = new_level)?;
        }
        Ok(())
    }

    /// Reconciles the document against an edited outline.
    ///
    /// All UIDs in the outline are checked before anything is written;
    /// a single unknown UID rejects the whole outline. Items missing
    /// from the outline are deleted, entries without a UID become new
    /// items. Returns the UIDs of created items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutlineUnknownItem`] without modifying anything
    /// when the outline names a UID not in this document.
    pub fn reorder_from_outline(&mut self, entries: &[OutlineEntry]) -> Result<Vec<Uid>, Error> {
        self.ensure_loaded()?;

        for entry in entries {
            if let Some(uid) = &entry.uid {
                if self.items.as_ref().is_none_or(|items| !items.contains_key(uid)) {
                    return Err(Error::OutlineUnknownItem(uid.clone()));
                }
            }
        }

        let depths: Vec<usize> = entries.iter().map(|e| e.depth).collect();
        let levels = assign_levels(&depths);

        // Anything not mentioned in the outline goes away.
        let mentioned: Vec<Uid> = entries.iter().filter_map(|e| e.uid.clone()).collect();
        let stale: Vec<Uid> = self
            .items
            .as_ref()
            .unwrap_or(&EMPTY)
            .keys()
            .filter(|uid| !mentioned.contains(uid))
            .cloned()
            .collect();

        let mut created = Vec::new();
        for (entry, parts) in entries.iter().zip(levels) {
            match &entry.uid {
                Some(uid) => {
                    let heading = self
                        .items
                        .as_ref()
                        .and_then(|items| items.get(uid))
                        .is_some_and(|item| item.level.heading());
                    let level = Level::new(&parts, heading);
                    self.edit_item(uid, |item| {
                        item.level = level;
                    })?;
                }
                None => {
                    let uid = self.add_item(Some(Level::new(&parts, false)))?;
                    if let Some(text) = &entry.text {
                        let text = text.clone();
                        self.edit_item(&uid, |item| item.text = text)?;
                    }
                    created.push(uid);
                }
            }
        }
        for uid in stale {
            self.remove_item(&uid)?;
        }
        Ok(created)
    }

    /// Writes an item into this document, creating or replacing its
    /// file.
    ///
    /// # Errors
    ///
    /// Propagates load and write errors.
    pub fn write_item(&mut self, item: &Item) -> Result<(), Error> {
        self.ensure_loaded()?;
        self.save_item(item)
    }

    /// Drops the item cache; the next access reloads from disk.
    pub fn invalidate(&mut self) {
        self.items = None;
        self.load_issues.clear();
    }

    fn ensure_loaded(&mut self) -> Result<(), Error> {
        if self.items.is_some() {
            return Ok(());
        }
        let mut items = BTreeMap::new();
        let mut issues = Vec::new();
        let extension = self.format.extension();

        let walker = walkdir::WalkDir::new(&self.path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                // Nested documents own their files.
                !(entry.depth() > 0
                    && entry.file_type().is_dir()
                    && entry.path().join(CONFIG_FILE).is_file())
            });

        for entry in walker {
            let entry = entry.map_err(|source| Error::Walk {
                path: self.path.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || entry.file_name().to_string_lossy().starts_with('.')
                || path.extension().and_then(|e| e.to_str()) != Some(extension)
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let uid = match Uid::parse_known(stem, [&self.prefix]) {
                Ok(uid) => uid,
                Err(source) => {
                    self.malformed(
                        &mut issues,
                        path,
                        format!("not an item filename: {source}"),
                    )?;
                    continue;
                }
            };

            let raw = fs::read_to_string(path).map_err(|source| Error::io(path, source))?;
            match self.format.decode(&raw, uid.clone()) {
                Ok(item) => {
                    if items.insert(uid.clone(), item).is_some() {
                        return Err(Error::DuplicateItem(uid));
                    }
                }
                Err(source) => {
                    self.malformed(&mut issues, path, format!("malformed item: {source}"))?;
                }
            }
        }

        debug!(prefix = %self.prefix, count = items.len(), "loaded items");
        self.items = Some(items);
        self.load_issues = issues;
        Ok(())
    }

    fn malformed(
        &self,
        issues: &mut Vec<Issue>,
        path: &Path,
        message: String,
    ) -> Result<(), Error> {
        match self.on_malformed {
            OnMalformed::Skip => {
                warn!(path = %path.display(), "{message}");
                issues.push(Issue::document(
                    Severity::Error,
                    self.prefix.clone(),
                    format!("{}: {message}", path.display()),
                ));
                Ok(())
            }
            OnMalformed::Abort => Err(Error::Malformed {
                path: path.display().to_string(),
                message,
            }),
        }
    }

    fn save_item(&mut self, item: &Item) -> Result<(), Error> {
        let raw = self.format.encode(item)?;
        let path = self.item_path(item.uid());
        fs::write(&path, raw).map_err(|source| Error::io(&path, source))?;
        if let Some(items) = &mut self.items {
            items.insert(item.uid().clone(), item.clone());
        }
        self.generation += 1;
        Ok(())
    }
}

static EMPTY: BTreeMap<Uid, Item> = BTreeMap::new();

/// One row of a document outline, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    /// The existing item, or `None` for an item to be created.
    pub uid: Option<Uid>,
    /// Outline depth, starting at 1.
    pub depth: usize,
    /// Initial text for a created item.
    pub text: Option<String>,
}

/// Assigns sequential outline numbers to a depth profile.
fn assign_levels(depths: &[usize]) -> Vec<Vec<u32>> {
    let mut counters: Vec<u32> = Vec::new();
    let mut levels = Vec::with_capacity(depths.len());
    for &depth in depths {
        let depth = depth.max(1);
        counters.truncate(depth);
        if counters.len() == depth {
            if let Some(last) = counters.last_mut() {
                *last += 1;
            }
        } else {
            while counters.len() < depth {
                counters.push(1);
            }
        }
        levels.push(counters.clone());
    }
    levels
}

/// Errors from document storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The directory has no configuration file.
    #[error("no document at {0}: missing {CONFIG_FILE}")]
    MissingConfig(String),

    /// The directory already holds a document.
    #[error("document already exists at {0}")]
    AlreadyExists(String),

    /// The configuration names an invalid prefix or separator.
    #[error("invalid document configuration")]
    Uid(#[source] crate::domain::uid::Error),

    /// An item or configuration file failed to parse.
    #[error(transparent)]
    Codec(#[from] codec::Error),

    /// A filesystem operation failed.
    #[error("I/O error on {path}")]
    Io {
        /// The offending path.
        path: String,
        /// The underlying error.
        source: io::Error,
    },

    /// Directory traversal failed.
    #[error("cannot scan {path}")]
    Walk {
        /// The document directory.
        path: String,
        /// The underlying error.
        source: walkdir::Error,
    },

    /// An item file failed to parse and the policy is to abort.
    #[error("{path}: {message}")]
    Malformed {
        /// The offending file.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// Two files resolve to the same UID.
    #[error("duplicate item files for {0}")]
    DuplicateItem(Uid),

    /// The requested item is not in this document.
    #[error("unknown item: {0}")]
    UnknownItem(Uid),

    /// The outline names an item that does not exist.
    #[error("outline names unknown item {0}; nothing was changed")]
    OutlineUnknownItem(Uid),
}

impl Error {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    fn new_document(dir: &Path) -> Document {
        Document::create(
            dir,
            Prefix::new("REQ").unwrap(),
            Separator::None,
            3,
            None,
        )
        .unwrap()
    }

    #[test]
    fn create_then_open_round_trips_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqs");
        Document::create(
            &path,
            Prefix::new("REQ").unwrap(),
            Separator::Hyphen,
            4,
            Some(Prefix::new("SYS").unwrap()),
        )
        .unwrap();

        let doc = Document::open(&path, OnMalformed::Skip).unwrap();
        assert_eq!(doc.prefix().as_str(), "REQ");
        assert_eq!(doc.separator(), Separator::Hyphen);
        assert_eq!(doc.digits(), 4);
        assert_eq!(doc.parent().unwrap().as_str(), "SYS");
    }

    #[test]
    fn create_refuses_existing_document() {
        let dir = tempfile::tempdir().unwrap();
        new_document(dir.path());
        let err = Document::create(
            dir.path(),
            Prefix::new("OTHER").unwrap(),
            Separator::None,
            3,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn add_item_numbers_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let first = doc.add_item(None).unwrap();
        let second = doc.add_item(None).unwrap();
        assert_eq!(first.to_string(), "REQ001");
        assert_eq!(second.to_string(), "REQ002");
        assert!(dir.path().join("REQ001.yml").is_file());
    }

    #[test]
    fn add_item_never_reuses_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let uid = doc.add_item(None).unwrap();
        doc.add_item(None).unwrap();
        doc.remove_item(&uid).unwrap();
        // Numbers are never reused below the maximum.
        assert_eq!(doc.add_item(None).unwrap().to_string(), "REQ003");
    }

    #[test]
    fn add_heading_indents_below_the_last_item() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        doc.add_item(Some("2.1".parse().unwrap())).unwrap();
        let uid = doc.add_heading(None).unwrap();

        let item = doc.item(&uid).unwrap().unwrap();
        assert!(item.is_heading());
        assert!(!item.normative);
        assert_eq!(item.level.to_string(), "2.1.1.0");
    }

    #[test]
    fn add_heading_in_empty_document_starts_the_outline() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let uid = doc.add_heading(None).unwrap();

        let item = doc.item(&uid).unwrap().unwrap();
        assert!(item.is_heading());
        assert_eq!(item.level.to_string(), "1.0");
    }

    #[test]
    fn add_heading_honours_an_explicit_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let uid = doc.add_heading(Some("3".parse().unwrap())).unwrap();

        let item = doc.item(&uid).unwrap().unwrap();
        assert!(item.is_heading());
        assert_eq!(item.level.to_string(), "3.0");
    }

    #[test]
    fn add_item_applies_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "\
settings:
  prefix: REQ
  digits: 3
attributes:
  defaults:
    text: 'TBD'
    rationale: pending
",
        )
        .unwrap();
        let mut doc = Document::open(dir.path(), OnMalformed::Skip).unwrap();
        let uid = doc.add_item(None).unwrap();
        let item = doc.item(&uid).unwrap().unwrap();
        assert_eq!(item.text, "TBD");
        assert_eq!(
            item.attributes.get("rationale"),
            Some(&serde_yaml::Value::String("pending".to_string()))
        );
    }

    #[test]
    fn edit_item_writes_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let uid = doc.add_item(None).unwrap();
        doc.edit_item(&uid, |item| item.text = "updated".to_string())
            .unwrap();

        // A fresh document sees the change.
        let mut reopened = Document::open(dir.path(), OnMalformed::Skip).unwrap();
        assert_eq!(reopened.item(&uid).unwrap().unwrap().text, "updated");
    }

    #[test]
    fn edit_item_rereads_disk_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let uid = doc.add_item(None).unwrap();
        let _ = doc.items().unwrap();

        // Simulate an out-of-band edit behind the cache.
        fs::write(
            dir.path().join("REQ001.yml"),
            "level: 1.1\ntext: changed on disk\n",
        )
        .unwrap();

        let edited = doc
            .edit_item(&uid, |item| item.header = "h".to_string())
            .unwrap();
        assert_eq!(edited.text, "changed on disk");
    }

    #[test]
    fn edit_unknown_item_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let err = doc
            .edit_item(&Uid::parse("REQ999").unwrap(), |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::UnknownItem(_)));
    }

    #[test]
    fn generation_bumps_on_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let before = doc.generation();
        let uid = doc.add_item(None).unwrap();
        assert!(doc.generation() > before);
        let mid = doc.generation();
        doc.edit_item(&uid, |item| item.text = "x".to_string()).unwrap();
        assert!(doc.generation() > mid);
    }

    #[test]
    fn malformed_item_is_skipped_with_a_finding() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        doc.add_item(None).unwrap();
        fs::write(dir.path().join("REQ002.yml"), "text: [broken\n").unwrap();
        doc.invalidate();

        assert_eq!(doc.items().unwrap().len(), 1);
        assert_eq!(doc.load_issues().len(), 1);
        assert_eq!(doc.load_issues()[0].severity, Severity::Error);
    }

    #[test]
    fn malformed_item_aborts_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "settings:\n  prefix: REQ\n",
        )
        .unwrap();
        fs::write(dir.path().join("REQ001.yml"), "text: [broken\n").unwrap();

        let mut doc = Document::open(dir.path(), OnMalformed::Abort).unwrap();
        assert!(matches!(doc.items(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn nested_document_files_are_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        doc.add_item(None).unwrap();

        let nested = dir.path().join("child");
        Document::create(&nested, Prefix::new("TST").unwrap(), Separator::None, 3, None)
            .unwrap();
        fs::write(nested.join("TST001.yml"), "text: child item\n").unwrap();

        doc.invalidate();
        assert_eq!(doc.items().unwrap().len(), 1);
    }

    #[test_case(&[1, 2, 2, 1, 2], &["1", "1.1", "1.2", "2", "2.1"]; "simple outline")]
    #[test_case(&[1, 3, 2], &["1", "1.1.1", "1.2"]; "depth jump")]
    #[test_case(&[2, 1], &["1.1", "2"]; "starts deep")]
    fn level_assignment(depths: &[usize], expected: &[&str]) {
        let levels = assign_levels(depths);
        let rendered: Vec<String> = levels
            .iter()
            .map(|parts| {
                parts
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(".")
            })
            .collect();
        assert_eq!(rendered, expected);
    }

    #[test]
    fn reorder_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let a = doc.add_item(Some("1.0".parse().unwrap())).unwrap();
        let b = doc.add_item(Some("1.5".parse().unwrap())).unwrap();
        let c = doc.add_item(Some("3.2.1".parse().unwrap())).unwrap();

        doc.reorder().unwrap();
        let levels: Vec<String> = [&a, &b, &c]
            .iter()
            .map(|uid| doc.item(uid).unwrap().unwrap().level.to_string())
            .collect();
        assert_eq!(levels, ["1.0", "1.1", "1.1.1"]);

        let generation = doc.generation();
        doc.reorder().unwrap();
        assert_eq!(doc.generation(), generation);
    }

    #[test]
    fn outline_with_unknown_uid_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let uid = doc.add_item(Some("1.1".parse().unwrap())).unwrap();

        let outline = [
            OutlineEntry {
                uid: Some(Uid::parse("REQ999").unwrap()),
                depth: 1,
                text: None,
            },
            OutlineEntry {
                uid: Some(uid.clone()),
                depth: 2,
                text: None,
            },
        ];
        let err = doc.reorder_from_outline(&outline).unwrap_err();
        assert!(matches!(err, Error::OutlineUnknownItem(_)));
        assert_eq!(doc.item(&uid).unwrap().unwrap().level.to_string(), "1.1");
    }

    #[test]
    fn outline_creates_moves_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let keep = doc.add_item(Some("1.1".parse().unwrap())).unwrap();
        let gone = doc.add_item(Some("1.2".parse().unwrap())).unwrap();

        let outline = [
            OutlineEntry {
                uid: None,
                depth: 1,
                text: Some("Introduction".to_string()),
            },
            OutlineEntry {
                uid: Some(keep.clone()),
                depth: 2,
                text: None,
            },
        ];
        let created = doc.reorder_from_outline(&outline).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(doc.item(&keep).unwrap().unwrap().level.to_string(), "1.1");
        assert!(doc.item(&gone).unwrap().is_none());
        assert_eq!(
            doc.item(&created[0]).unwrap().unwrap().text,
            "Introduction"
        );
    }
}
