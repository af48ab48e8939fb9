//! The document tree.
//!
//! A tree is every document found under a root directory, wired together
//! by the `parent` setting in each document's configuration and by the
//! per-item links. Item lookups go through a UID index that is rebuilt
//! whenever any document's generation counter moves.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use petgraph::{algo, graph::DiGraph, graph::NodeIndex};
use tracing::{debug, info};

use super::{
    document::{self, CONFIG_FILE, Document, OnMalformed, SKIP_FILE},
    vcs::{self, Vcs},
};
use crate::domain::{Item, Level, Prefix, Stamp, Uid, item::LinkError};

/// A forest of documents rooted at a project directory.
#[derive(Debug)]
pub struct Tree {
    root: PathBuf,
    documents: BTreeMap<String, Document>,
    vcs: Box<dyn Vcs>,
    structure_generation: u64,
    index: Option<UidIndex>,
}

#[derive(Debug)]
struct UidIndex {
    generation: u64,
    map: HashMap<Uid, String>,
}

impl Tree {
    /// Discovers every document under `root`.
    ///
    /// Directories holding a `.skip` file are ignored, subtrees
    /// included. Parent prefixes must resolve and the document graph
    /// must be acyclic.
    ///
    /// # Errors
    ///
    /// Returns an error for unreadable directories, duplicate prefixes,
    /// unknown parents or a cycle among documents.
    pub fn open(root: &Path) -> Result<Self, Error> {
        Self::open_with(root, OnMalformed::default())
    }

    /// Like [`Self::open`], with an explicit malformed-item policy.
    ///
    /// # Errors
    ///
    /// See [`Self::open`].
    pub fn open_with(root: &Path, on_malformed: OnMalformed) -> Result<Self, Error> {
        let mut documents = BTreeMap::new();

        let walker = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                entry.file_type().is_dir()
                    && !(entry.depth() > 0 && name.starts_with('.'))
                    && !entry.path().join(SKIP_FILE).exists()
            });

        for entry in walker {
            let entry = entry.map_err(|source| Error::Walk {
                path: root.display().to_string(),
                source,
            })?;
            if !entry.path().join(CONFIG_FILE).is_file() {
                continue;
            }
            let document = Document::open(entry.path(), on_malformed)?;
            let key = document.prefix().key();
            if let Some(previous) = documents.insert(key, document) {
                return Err(Error::DuplicatePrefix(previous.prefix().to_string()));
            }
        }

        let tree = Self {
            vcs: vcs::detect(root),
            root: root.to_path_buf(),
            documents,
            structure_generation: 0,
            index: None,
        };
        tree.check_structure()?;
        info!(root = %root.display(), documents = tree.documents.len(), "opened tree");
        Ok(tree)
    }

    fn check_structure(&self) -> Result<(), Error> {
        for document in self.documents.values() {
            let Some(parent) = document.parent() else {
                continue;
            };
            if !self.documents.contains_key(&parent.key()) {
                return Err(Error::UnknownParent {
                    document: document.prefix().to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        // Walk each document's parent chain; a repeat is a cycle.
        for document in self.documents.values() {
            let mut seen = vec![document.prefix().key()];
            let mut current = document.parent();
            while let Some(parent) = current {
                let key = parent.key();
                if seen.contains(&key) {
                    seen.push(key);
                    return Err(Error::DocumentCycle(seen));
                }
                seen.push(key.clone());
                current = self.documents.get(&key).and_then(Document::parent);
            }
        }
        Ok(())
    }

    /// The tree's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The documents, in prefix order.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    /// The document prefixes, in prefix order.
    #[must_use]
    pub fn prefixes(&self) -> Vec<Prefix> {
        self.documents.values().map(|d| d.prefix().clone()).collect()
    }

    /// The prefixes of documents that declare `parent` as their parent,
    /// in prefix order.
    #[must_use]
    pub fn child_documents(&self, parent: &Prefix) -> Vec<Prefix> {
        self.documents()
            .filter(|document| document.parent() == Some(parent))
            .map(|document| document.prefix().clone())
            .collect()
    }

    /// Document keys ordered parents-first, ties by prefix.
    #[must_use]
    pub fn document_order(&self) -> Vec<String> {
        let mut placed: Vec<String> = Vec::new();
        while placed.len() < self.documents.len() {
            let mut progressed = false;
            for (key, document) in &self.documents {
                if placed.contains(key) {
                    continue;
                }
                let ready = document
                    .parent()
                    .is_none_or(|parent| placed.contains(&parent.key()));
                if ready {
                    placed.push(key.clone());
                    progressed = true;
                }
            }
            if !progressed {
                // Unreachable after check_structure; bail rather than spin.
                for key in self.documents.keys() {
                    if !placed.contains(key) {
                        placed.push(key.clone());
                    }
                }
            }
        }
        placed
    }

    /// Looks up a document by prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDocument`] when no document has the
    /// prefix.
    pub fn document(&mut self, prefix: &Prefix) -> Result<&mut Document, Error> {
        self.documents
            .get_mut(&prefix.key())
            .ok_or_else(|| Error::UnknownDocument(prefix.to_string()))
    }

    pub(crate) fn document_by_key_mut(&mut self, key: &str) -> Option<&mut Document> {
        self.documents.get_mut(key)
    }

    /// Parses UID text against the tree's known prefixes.
    ///
    /// # Errors
    ///
    /// Propagates parse and ambiguity errors.
    pub fn parse_uid(&self, text: &str) -> Result<Uid, Error> {
        Uid::parse_known(text, self.documents.values().map(Document::prefix))
            .map_err(Error::Uid)
    }

    /// Creates a new document directory under the tree.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate prefixes, an unknown parent or a
    /// filesystem failure.
    pub fn create_document(
        &mut self,
        path: &Path,
        prefix: Prefix,
        separator: crate::domain::Separator,
        digits: usize,
        parent: Option<Prefix>,
    ) -> Result<(), Error> {
        if self.documents.contains_key(&prefix.key()) {
            return Err(Error::DuplicatePrefix(prefix.to_string()));
        }
        if let Some(parent) = &parent {
            if !self.documents.contains_key(&parent.key()) {
                return Err(Error::UnknownParent {
                    document: prefix.to_string(),
                    parent: parent.to_string(),
                });
            }
        }
        let document = Document::create(path, prefix, separator, digits, parent)?;
        self.vcs.add(&document.path().join(CONFIG_FILE));
        self.documents.insert(document.prefix().key(), document);
        self.structure_generation += 1;
        Ok(())
    }

    /// Finds the document holding `uid` and returns the item.
    ///
    /// The item's UID prefix normally names its document, but items
    /// that were moved by hand are still found by scanning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] when no document holds the UID.
    pub fn item(&mut self, uid: &Uid) -> Result<&Item, Error> {
        let key = self.locate(uid)?;
        let document = self
            .documents
            .get_mut(&key)
            .ok_or_else(|| Error::UnknownItem(uid.clone()))?;
        document
            .item(uid)?
            .ok_or_else(|| Error::UnknownItem(uid.clone()))
    }

    /// Creates an item in the document with `prefix`.
    ///
    /// # Errors
    ///
    /// Propagates document errors.
    pub fn add_item(&mut self, prefix: &Prefix, level: Option<Level>) -> Result<Uid, Error> {
        let document = self.document(prefix)?;
        let uid = document.add_item(level)?;
        let path = document.item_path(&uid);
        if !self.vcs.is_ignored(&path) {
            self.vcs.add(&path);
        }
        Ok(uid)
    }

    /// Creates a heading item in the document with `prefix`.
    ///
    /// # Errors
    ///
    /// Propagates document errors.
    pub fn add_heading(&mut self, prefix: &Prefix, level: Option<Level>) -> Result<Uid, Error> {
        let document = self.document(prefix)?;
        let uid = document.add_heading(level)?;
        let path = document.item_path(&uid);
        if !self.vcs.is_ignored(&path) {
            self.vcs.add(&path);
        }
        Ok(uid)
    }

    /// Deletes an item, wherever it lives.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] when no document holds the UID.
    pub fn remove_item(&mut self, uid: &Uid) -> Result<Item, Error> {
        let key = self.locate(uid)?;
        let document = self
            .documents
            .get_mut(&key)
            .ok_or_else(|| Error::UnknownItem(uid.clone()))?;
        let path = document.item_path(uid);
        let item = document.remove_item(uid)?;
        self.vcs.delete(&path);
        Ok(item)
    }

    /// Links `child` to `parent`.
    ///
    /// The new link carries no fingerprint; it is not suspect until a
    /// fingerprint is recorded with [`Tree::clear`] and the parent's
    /// content changes afterwards. Returns `false` when the link
    /// already existed.
    ///
    /// # Errors
    ///
    /// Rejects unknown UIDs, self-links and links that would create a
    /// cycle, leaving everything unchanged.
    pub fn link(&mut self, child: &Uid, parent: &Uid) -> Result<bool, Error> {
        let child_key = self.locate(child)?;
        self.locate(parent)?;
        if child == parent {
            return Err(Error::Item(LinkError::SelfLink(parent.clone())));
        }

        let (graph, nodes) = self.link_graph()?;
        if let (Some(&from), Some(&to)) = (nodes.get(parent), nodes.get(child)) {
            if algo::has_path_connecting(&graph, from, to, None) {
                return Err(Error::Cycle {
                    child: child.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let document = self
            .documents
            .get_mut(&child_key)
            .ok_or_else(|| Error::UnknownItem(child.clone()))?;
        let mut linked = Ok(true);
        let item = document.edit_item(child, |item| {
            linked = item.link(parent.clone());
        })?;
        self.vcs.edit(&document.item_path(item.uid()));
        linked.map_err(Error::Item)
    }

    /// Removes the link from `child` to `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error when either UID is unknown or no such link
    /// exists.
    pub fn unlink(&mut self, child: &Uid, parent: &Uid) -> Result<(), Error> {
        let child_key = self.locate(child)?;
        let document = self
            .documents
            .get_mut(&child_key)
            .ok_or_else(|| Error::UnknownItem(child.clone()))?;
        let mut outcome = Ok(());
        let item = document.edit_item(child, |item| {
            outcome = item.unlink(parent);
        })?;
        self.vcs.edit(&document.item_path(item.uid()));
        outcome.map_err(Error::Item)
    }

    /// Marks an item as reviewed at its current content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] for an unknown UID.
    pub fn review(&mut self, uid: &Uid) -> Result<(), Error> {
        let key = self.locate(uid)?;
        let document = self
            .documents
            .get_mut(&key)
            .ok_or_else(|| Error::UnknownItem(uid.clone()))?;
        let attributes = document.reviewed_attributes().to_vec();
        let item = document.edit_item(uid, |item| item.review(&attributes))?;
        self.vcs.edit(&document.item_path(item.uid()));
        Ok(())
    }

    /// Records the linked parents' current fingerprints on `child`,
    /// un-flagging its suspect links.
    ///
    /// With `parents`, only links to those UIDs are cleared. Returns the
    /// UIDs whose links were updated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] for an unknown child UID.
    /// Unresolvable link targets are left alone; validation reports
    /// them.
    pub fn clear(&mut self, child: &Uid, parents: Option<&[Uid]>) -> Result<Vec<Uid>, Error> {
        let child_key = self.locate(child)?;
        let links: Vec<Uid> = {
            let document = self
                .documents
                .get_mut(&child_key)
                .ok_or_else(|| Error::UnknownItem(child.clone()))?;
            document
                .item(child)?
                .ok_or_else(|| Error::UnknownItem(child.clone()))?
                .links()
                .iter()
                .map(|l| l.uid.clone())
                .collect()
        };

        // Parent stamps first; the edit below must not observe a
        // partially updated tree.
        let mut stamps: HashMap<Uid, Stamp> = HashMap::new();
        for uid in &links {
            if parents.is_some_and(|only| !only.contains(uid)) {
                continue;
            }
            if let Some(stamp) = self.current_stamp(uid)? {
                stamps.insert(uid.clone(), stamp);
            }
        }

        let document = self
            .documents
            .get_mut(&child_key)
            .ok_or_else(|| Error::UnknownItem(child.clone()))?;
        let mut cleared = Vec::new();
        let item = document.edit_item(child, |item| {
            for link in item.links_mut() {
                if let Some(stamp) = stamps.get(&link.uid) {
                    link.stamp = stamp.clone();
                    cleared.push(link.uid.clone());
                }
            }
        })?;
        self.vcs.edit(&document.item_path(item.uid()));
        Ok(cleared)
    }

    /// The links of `child` whose recorded fingerprint does not match
    /// the linked parent's current content.
    ///
    /// Links with no recorded fingerprint are unreviewed rather than
    /// suspect. Links to unresolvable UIDs are skipped here; validation
    /// reports them as errors.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownItem`] for an unknown child UID.
    pub fn suspect_links(&mut self, child: &Uid) -> Result<Vec<Uid>, Error> {
        let child_key = self.locate(child)?;
        let links: Vec<(Uid, Stamp)> = {
            let document = self
                .documents
                .get_mut(&child_key)
                .ok_or_else(|| Error::UnknownItem(child.clone()))?;
            document
                .item(child)?
                .ok_or_else(|| Error::UnknownItem(child.clone()))?
                .links()
                .iter()
                .map(|l| (l.uid.clone(), l.stamp.clone()))
                .collect()
        };

        let mut suspect = Vec::new();
        for (uid, recorded) in links {
            // An unstamped link is merely unreviewed, not suspect.
            if !recorded.is_set() {
                continue;
            }
            let Some(current) = self.current_stamp(&uid)? else {
                continue;
            };
            if recorded != current {
                suspect.push(uid);
            }
        }
        Ok(suspect)
    }

    /// An item's current fingerprint, computed with its document's
    /// reviewed attributes. `None` when the UID does not resolve.
    fn current_stamp(&mut self, uid: &Uid) -> Result<Option<Stamp>, Error> {
        let Ok(key) = self.locate(uid) else {
            return Ok(None);
        };
        let Some(document) = self.documents.get_mut(&key) else {
            return Ok(None);
        };
        let attributes = document.reviewed_attributes().to_vec();
        let Some(item) = document.item(uid)? else {
            return Ok(None);
        };
        let stamp = item.stamp(&attributes, false);
        Ok(Some(stamp))
    }

    /// Every cycle among item links, each as a sorted list of UIDs.
    ///
    /// # Errors
    ///
    /// Propagates load errors.
    pub fn cycles(&mut self) -> Result<Vec<Vec<Uid>>, Error> {
        let (graph, _) = self.link_graph()?;
        let mut cycles: Vec<Vec<Uid>> = algo::tarjan_scc(&graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| {
                let mut uids: Vec<Uid> = component
                    .into_iter()
                    .map(|node| graph[node].clone())
                    .collect();
                uids.sort();
                uids
            })
            .collect();
        cycles.sort();
        Ok(cycles)
    }

    /// Items anywhere in the tree that link to `parent`.
    ///
    /// # Errors
    ///
    /// Propagates load errors.
    pub fn children_of(&mut self, parent: &Uid) -> Result<Vec<Uid>, Error> {
        let mut children = Vec::new();
        for document in self.documents.values_mut() {
            for item in document.items()?.values() {
                if item.links().iter().any(|l| &l.uid == parent) {
                    children.push(item.uid().clone());
                }
            }
        }
        children.sort();
        Ok(children)
    }

    /// Loads every document's items.
    ///
    /// # Errors
    ///
    /// Propagates load errors.
    pub fn load_all(&mut self) -> Result<(), Error> {
        for document in self.documents.values_mut() {
            document.items()?;
        }
        Ok(())
    }

    /// Item links as a directed graph, child to parent.
    fn link_graph(&mut self) -> Result<(DiGraph<Uid, ()>, HashMap<Uid, NodeIndex>), Error> {
        let mut graph = DiGraph::new();
        let mut nodes: HashMap<Uid, NodeIndex> = HashMap::new();

        for document in self.documents.values_mut() {
            for uid in document.items()?.keys() {
                let node = graph.add_node(uid.clone());
                nodes.insert(uid.clone(), node);
            }
        }
        let mut edges: Vec<(NodeIndex, NodeIndex)> = Vec::new();
        for document in self.documents.values_mut() {
            for item in document.items()?.values() {
                let Some(&from) = nodes.get(item.uid()) else {
                    continue;
                };
                for link in item.links() {
                    if let Some(&to) = nodes.get(&link.uid) {
                        edges.push((from, to));
                    }
                }
            }
        }
        for (from, to) in edges {
            graph.add_edge(from, to, ());
        }
        Ok((graph, nodes))
    }

    fn total_generation(&self) -> u64 {
        self.structure_generation
            + self
                .documents
                .values()
                .map(Document::generation)
                .sum::<u64>()
    }

    /// Resolves a UID to its document key, rebuilding the index when
    /// any document changed.
    fn locate(&mut self, uid: &Uid) -> Result<String, Error> {
        let generation = self.total_generation();
        let stale = self
            .index
            .as_ref()
            .is_none_or(|index| index.generation != generation);
        if stale {
            self.rebuild_index()?;
            debug!(generation, "rebuilt UID index");
        }
        self.index
            .as_ref()
            .and_then(|index| index.map.get(uid))
            .cloned()
            .ok_or_else(|| Error::UnknownItem(uid.clone()))
    }

    fn rebuild_index(&mut self) -> Result<(), Error> {
        let mut map = HashMap::new();
        for (key, document) in &mut self.documents {
            for uid in document.items()?.keys() {
                map.insert(uid.clone(), key.clone());
            }
        }
        self.index = Some(UidIndex {
            generation: self.total_generation(),
            map,
        });
        Ok(())
    }
}

/// Errors from tree operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A document failed to open or load.
    #[error(transparent)]
    Document(#[from] document::Error),

    /// Directory traversal failed.
    #[error("cannot scan {path}")]
    Walk {
        /// The tree root.
        path: String,
        /// The underlying error.
        source: walkdir::Error,
    },

    /// Two documents declare the same prefix.
    #[error("duplicate document prefix: {0}")]
    DuplicatePrefix(String),

    /// A document names a parent prefix that does not exist.
    #[error("document {document} has unknown parent: {parent}")]
    UnknownParent {
        /// The declaring document's prefix.
        document: String,
        /// The missing parent prefix.
        parent: String,
    },

    /// The document parent chain loops.
    #[error("document cycle: {}", .0.join(" -> "))]
    DocumentCycle(Vec<String>),

    /// No document has the given prefix.
    #[error("unknown document: {0}")]
    UnknownDocument(String),

    /// No document holds the given UID.
    #[error("unknown item: {0}")]
    UnknownItem(Uid),

    /// A link edit failed on the item itself.
    #[error(transparent)]
    Item(#[from] LinkError),

    /// The requested link would make the item graph cyclic.
    #[error("linking {child} to {parent} would create a cycle")]
    Cycle {
        /// The item being linked.
        child: Uid,
        /// The intended parent.
        parent: Uid,
    },

    /// UID text could not be parsed or was ambiguous.
    #[error(transparent)]
    Uid(crate::domain::uid::Error),
}
