use std::{fs, path::PathBuf};

use clap::Parser;
use reqtree::{Prefix, Tree, storage::OutlineEntry};
use serde::Deserialize;
use tracing::instrument;

#[derive(Debug, Parser)]
#[command(about = "Renumber a document's outline levels")]
pub struct Reorder {
    /// The document to reorder
    #[arg(value_parser = super::parse_prefix)]
    prefix: Prefix,

    /// Reconcile against an edited outline file instead of renumbering
    #[arg(long, value_name = "FILE")]
    outline: Option<PathBuf>,
}

/// One outline row: an existing UID at a depth, or a new item with
/// initial text.
#[derive(Debug, Deserialize)]
struct OutlineRow {
    #[serde(default)]
    uid: Option<String>,
    depth: usize,
    #[serde(default)]
    text: Option<String>,
}

impl Reorder {
    #[instrument(skip(self, tree))]
    pub fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let Some(outline_path) = self.outline else {
            tree.document(&self.prefix)?.reorder()?;
            println!("reordered {}", self.prefix);
            return Ok(());
        };

        let raw = fs::read_to_string(&outline_path)?;
        let rows: Vec<OutlineRow> = serde_yaml::from_str(&raw)?;
        let entries = rows
            .into_iter()
            .map(|row| {
                let uid = row
                    .uid
                    .as_deref()
                    .map(|text| tree.parse_uid(text))
                    .transpose()?;
                Ok(OutlineEntry {
                    uid,
                    depth: row.depth,
                    text: row.text,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let created = tree.document(&self.prefix)?.reorder_from_outline(&entries)?;
        println!("reordered {}", self.prefix);
        for uid in created {
            println!("created {uid}");
        }
        Ok(())
    }
}
