//! Document export and import.
//!
//! A document exports to a mapping of UID to attribute map, the same
//! shape as the item files themselves. Import round-trips that mapping,
//! creating or replacing items; UIDs absent from the data are left
//! untouched.

use std::{collections::BTreeMap, fs, path::Path};

use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::{
    domain::{Uid, uid},
    storage::{Document, ItemFormat, codec, document},
};

/// Exports every item of a document, keyed by UID.
///
/// # Errors
///
/// Propagates load and serialisation errors.
pub fn export_document(document: &mut Document) -> Result<BTreeMap<String, Mapping>, Error> {
    let format = ItemFormat::Yaml;
    let mut data = BTreeMap::new();
    let items: Vec<_> = document
        .items_by_level()?
        .into_iter()
        .cloned()
        .collect();
    for item in items {
        let raw = format.encode(&item)?;
        let value: Value = serde_yaml::from_str(&raw).map_err(codec::Error::Yaml)?;
        let Value::Mapping(mapping) = value else {
            continue;
        };
        data.insert(item.uid().to_string(), mapping);
    }
    Ok(data)
}

/// Writes a document's export to a YAML file.
///
/// # Errors
///
/// Propagates export and write errors.
pub fn export_to_file(document: &mut Document, path: &Path) -> Result<(), Error> {
    let data = export_document(document)?;
    let raw = serde_yaml::to_string(&data).map_err(codec::Error::Yaml)?;
    fs::write(path, raw).map_err(|source| Error::Write {
        path: path.display().to_string(),
        source,
    })?;
    info!(prefix = %document.prefix(), items = data.len(), path = %path.display(), "exported");
    Ok(())
}

/// Imports items into a document from an exported mapping.
///
/// Existing items named in the data are replaced; new UIDs are created.
/// Returns the imported UIDs.
///
/// # Errors
///
/// Returns [`Error::Uid`] for keys that do not parse against the
/// document's prefix, and propagates parse and write errors.
pub fn import_document(
    document: &mut Document,
    data: &BTreeMap<String, Mapping>,
) -> Result<Vec<Uid>, Error> {
    let format = ItemFormat::Yaml;
    let mut imported = Vec::with_capacity(data.len());
    for (key, mapping) in data {
        let uid = Uid::parse_known(key, [document.prefix()]).map_err(Error::Uid)?;
        let raw =
            serde_yaml::to_string(&Value::Mapping(mapping.clone())).map_err(codec::Error::Yaml)?;
        let item = format.decode(&raw, uid.clone())?;
        document.write_item(&item)?;
        imported.push(uid);
    }
    info!(prefix = %document.prefix(), items = imported.len(), "imported");
    Ok(imported)
}

/// Imports items from a YAML export file.
///
/// # Errors
///
/// Propagates read, parse and import errors.
pub fn import_from_file(document: &mut Document, path: &Path) -> Result<Vec<Uid>, Error> {
    let raw = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.display().to_string(),
        source,
    })?;
    let data: BTreeMap<String, Mapping> =
        serde_yaml::from_str(&raw).map_err(codec::Error::Yaml)?;
    import_document(document, &data)
}

/// Errors from export and import.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying document operation failed.
    #[error(transparent)]
    Document(#[from] document::Error),

    /// An export key is not a UID for the target document.
    #[error(transparent)]
    Uid(uid::Error),

    /// The export file could not be written.
    #[error("cannot write {path}")]
    Write {
        /// The target path.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The import file could not be read.
    #[error("cannot read {path}")]
    Read {
        /// The source path.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },
}

impl From<crate::storage::codec::Error> for Error {
    fn from(error: crate::storage::codec::Error) -> Self {
        Self::Document(document::Error::Codec(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Prefix, Separator};
    use crate::storage::OnMalformed;

    fn new_document(dir: &Path) -> Document {
        Document::create(dir, Prefix::new("REQ").unwrap(), Separator::None, 3, None).unwrap()
    }

    #[test]
    fn export_round_trips_through_import() {
        let source_dir = tempfile::tempdir().unwrap();
        let mut source = new_document(source_dir.path());
        let uid = source.add_item(Some("1.1".parse().unwrap())).unwrap();
        source
            .edit_item(&uid, |item| {
                item.text = "The system shall export.".to_string();
                item.attributes.insert(
                    Value::String("rationale".to_string()),
                    Value::String("portability".to_string()),
                );
            })
            .unwrap();

        let data = export_document(&mut source).unwrap();
        assert_eq!(data.len(), 1);
        assert!(data.contains_key("REQ001"));

        let target_dir = tempfile::tempdir().unwrap();
        let mut target = new_document(target_dir.path());
        let imported = import_document(&mut target, &data).unwrap();
        assert_eq!(imported.len(), 1);

        let item = target.item(&imported[0]).unwrap().unwrap();
        assert_eq!(item.text, "The system shall export.");
        assert_eq!(
            item.attributes.get("rationale"),
            Some(&Value::String("portability".to_string()))
        );
    }

    #[test]
    fn import_replaces_existing_items() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let uid = doc.add_item(Some("1.1".parse().unwrap())).unwrap();
        doc.edit_item(&uid, |item| item.text = "old".to_string())
            .unwrap();

        let mut data = BTreeMap::new();
        let mut mapping = Mapping::new();
        mapping.insert(
            Value::String("text".to_string()),
            Value::String("new".to_string()),
        );
        mapping.insert(Value::String("level".to_string()), Value::from(1.1));
        data.insert("REQ001".to_string(), mapping);

        import_document(&mut doc, &data).unwrap();
        assert_eq!(doc.item(&uid).unwrap().unwrap().text, "new");
    }

    #[test]
    fn bad_uid_key_aborts_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut doc = new_document(dir.path());
        let mut data = BTreeMap::new();
        data.insert("???".to_string(), Mapping::new());
        assert!(matches!(
            import_document(&mut doc, &data),
            Err(Error::Uid(_))
        ));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let doc_dir = dir.path().join("doc");
        let mut doc = Document::create(
            &doc_dir,
            Prefix::new("REQ").unwrap(),
            Separator::None,
            3,
            None,
        )
        .unwrap();
        let uid = doc.add_item(Some("1.1".parse().unwrap())).unwrap();
        doc.edit_item(&uid, |item| item.text = "exported".to_string())
            .unwrap();

        let file = dir.path().join("export.yml");
        export_to_file(&mut doc, &file).unwrap();

        let other_dir = dir.path().join("other");
        let mut other = Document::create(
            &other_dir,
            Prefix::new("REQ").unwrap(),
            Separator::None,
            3,
            None,
        )
        .unwrap();
        let imported = import_from_file(&mut other, &file).unwrap();
        assert_eq!(imported.len(), 1);

        let mut reopened = Document::open(&other_dir, OnMalformed::Skip).unwrap();
        assert_eq!(reopened.item(&uid).unwrap().unwrap().text, "exported");
    }
}
