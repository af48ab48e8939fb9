//! Tree validation.
//!
//! Validation never mutates anything: it loads every document, snapshots
//! the items and reports findings ordered parents-first, each document's
//! items in outline order. Only [`Severity::Error`] findings make a tree
//! invalid.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::info;

use crate::{
    domain::{Issue, Item, Level, Prefix, Severity, Uid},
    reference,
    storage::{Tree, tree},
};

/// Which checks run and how findings are graded.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Promote informational findings to warnings.
    pub warn_all: bool,
    /// Promote warnings to errors.
    pub error_all: bool,
    /// Resolve external references against the filesystem.
    pub check_references: bool,
    /// Compare link fingerprints against parent content.
    pub check_suspect: bool,
    /// Require incoming links from child documents.
    pub check_child_links: bool,
    /// Require incoming links from every child document separately.
    pub strict_child_links: bool,
    /// Check outline levels for duplicates and gaps.
    pub check_levels: bool,
    /// How seriously to treat duplicate levels within a document.
    pub duplicate_level_severity: Severity,
    /// Extensions excluded from reference keyword search.
    pub skip_extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            warn_all: false,
            error_all: false,
            check_references: true,
            check_suspect: true,
            check_child_links: true,
            strict_child_links: false,
            check_levels: true,
            duplicate_level_severity: Severity::Warning,
            skip_extensions: reference::DEFAULT_SKIP_EXTENSIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Settings {
    fn promote(&self, severity: Severity) -> Severity {
        let severity = if self.warn_all && severity == Severity::Info {
            Severity::Warning
        } else {
            severity
        };
        if self.error_all && severity == Severity::Warning {
            Severity::Error
        } else {
            severity
        }
    }
}

/// Whether a set of findings leaves the tree valid.
#[must_use]
pub fn is_valid(issues: &[Issue]) -> bool {
    issues.iter().all(|issue| issue.severity != Severity::Error)
}

/// Validates the whole tree.
///
/// # Errors
///
/// Returns an error only when loading itself fails; content findings
/// are returned as issues.
pub fn validate(tree: &mut Tree, settings: &Settings) -> Result<Vec<Issue>, tree::Error> {
    validate_with_hooks(tree, settings, |_, _| Vec::new(), |_| Vec::new())
}

/// Validates the whole tree, with project-specific hooks.
///
/// The document hook runs once per document over its item snapshot; the
/// item hook runs per active item. Hook findings go through the same
/// severity promotion as built-in checks.
///
/// # Errors
///
/// See [`validate`].
pub fn validate_with_hooks<D, I>(
    tree: &mut Tree,
    settings: &Settings,
    document_hook: D,
    item_hook: I,
) -> Result<Vec<Issue>, tree::Error>
where
    D: Fn(&Prefix, &[Item]) -> Vec<Issue>,
    I: Fn(&Item) -> Vec<Issue>,
{
    let cycles = tree.cycles()?;
    let snapshot = Snapshot::capture(tree)?;
    let mut issues = Vec::new();
    let mut push = |settings: &Settings, mut issue: Issue| {
        issue.severity = settings.promote(issue.severity);
        issues.push(issue);
    };

    if snapshot.documents.is_empty() {
        push(
            settings,
            Issue::tree(Severity::Warning, "no documents in the tree"),
        );
    }
    for cycle in cycles {
        let members: Vec<String> = cycle.iter().map(ToString::to_string).collect();
        push(
            settings,
            Issue::tree(
                Severity::Warning,
                format!("links form a cycle: {}", members.join(", ")),
            ),
        );
    }

    for document in &snapshot.documents {
        for issue in &document.load_issues {
            push(settings, issue.clone());
        }

        let active: Vec<&Item> = document.items.iter().filter(|item| item.active).collect();
        if document.items.is_empty() {
            push(
                settings,
                Issue::document(Severity::Warning, document.prefix.clone(), "no items"),
            );
        }

        if settings.check_levels {
            check_levels(settings, &document.prefix, &active, &mut push);
        }

        for issue in document_hook(&document.prefix, &document.items) {
            push(settings, issue);
        }

        for item in active {
            for issue in item_hook(item) {
                push(settings, issue);
            }
            check_item(settings, &snapshot, document, item, &mut push);
        }
    }

    info!(count = issues.len(), valid = is_valid(&issues), "validated tree");
    Ok(issues)
}

struct Snapshot {
    root: PathBuf,
    documents: Vec<DocSnapshot>,
    /// UID to (document index, item index).
    locate: HashMap<Uid, (usize, usize)>,
    /// UID to the document keys holding items that link to it.
    incoming: HashMap<Uid, HashSet<String>>,
}

struct DocSnapshot {
    prefix: Prefix,
    parent: Option<Prefix>,
    reviewed: Vec<String>,
    items: Vec<Item>,
    load_issues: Vec<Issue>,
    /// Prefixes of documents that declare this one as parent.
    children: Vec<Prefix>,
}

impl Snapshot {
    fn capture(tree: &mut Tree) -> Result<Self, tree::Error> {
        let order = tree.document_order();
        let mut documents = Vec::with_capacity(order.len());
        let mut locate = HashMap::new();
        let mut incoming: HashMap<Uid, HashSet<String>> = HashMap::new();

        for key in &order {
            let Some(document) = tree.document_by_key_mut(key) else {
                continue;
            };
            let items: Vec<Item> = document
                .items_by_level()?
                .into_iter()
                .cloned()
                .collect();
            let prefix = document.prefix().clone();
            let parent = document.parent().cloned();
            let reviewed = document.reviewed_attributes().to_vec();
            let load_issues = document.load_issues().to_vec();
            let snapshot = DocSnapshot {
                children: tree.child_documents(&prefix),
                prefix,
                parent,
                reviewed,
                load_issues,
                items,
            };

            let index = documents.len();
            for (item_index, item) in snapshot.items.iter().enumerate() {
                locate.insert(item.uid().clone(), (index, item_index));
                if item.active {
                    for link in item.links() {
                        incoming
                            .entry(link.uid.clone())
                            .or_default()
                            .insert(key.clone());
                    }
                }
            }
            documents.push(snapshot);
        }

        Ok(Self {
            root: tree.root().to_path_buf(),
            documents,
            locate,
            incoming,
        })
    }

    fn item(&self, uid: &Uid) -> Option<(&DocSnapshot, &Item)> {
        let &(doc, item) = self.locate.get(uid)?;
        let document = &self.documents[doc];
        Some((document, &document.items[item]))
    }
}

fn check_levels<P>(settings: &Settings, prefix: &Prefix, items: &[&Item], push: &mut P)
where
    P: FnMut(&Settings, Issue),
{
    for pair in items.windows(2) {
        let (first, second) = (pair[0], pair[1]);
        if first.level == second.level {
            push(
                settings,
                Issue::document(
                    settings.duplicate_level_severity,
                    prefix.clone(),
                    format!(
                        "duplicate level: {} ({}, {})",
                        second.level,
                        first.uid(),
                        second.uid()
                    ),
                ),
            );
        } else if !level_follows(&first.level, &second.level) {
            push(
                settings,
                Issue::document(
                    Severity::Info,
                    prefix.clone(),
                    format!(
                        "skipped level: {} ({}), {} ({})",
                        first.level,
                        first.uid(),
                        second.level,
                        second.uid()
                    ),
                ),
            );
        }
    }
}

/// Whether `next` is a gapless successor of `prev` in an outline.
fn level_follows(prev: &Level, next: &Level) -> bool {
    let p = prev.parts();
    let n = next.parts();
    if n.len() == p.len() + 1 {
        // One level deeper, starting at 1.
        return n[..p.len()] == *p && n[p.len()] == 1;
    }
    if n.len() <= p.len() {
        // Sibling or dedent: shared prefix, then an increment by one.
        let depth = n.len();
        return n[..depth - 1] == p[..depth - 1] && n[depth - 1] == p[depth - 1] + 1;
    }
    false
}

fn check_item<P>(
    settings: &Settings,
    snapshot: &Snapshot,
    document: &DocSnapshot,
    item: &Item,
    push: &mut P,
) where
    P: FnMut(&Settings, Issue),
{
    let uid = item.uid().clone();

    if item.text.is_empty() && !item.is_heading() {
        push(
            settings,
            Issue::item(Severity::Warning, uid.clone(), "no text"),
        );
    }
    if item.is_unreviewed() {
        push(
            settings,
            Issue::item(Severity::Info, uid.clone(), "needs initial review"),
        );
    } else if item.has_unreviewed_changes(&document.reviewed) {
        push(
            settings,
            Issue::item(Severity::Warning, uid.clone(), "unreviewed changes"),
        );
    }
    if uid.prefix() != &document.prefix {
        push(
            settings,
            Issue::item(
                Severity::Info,
                uid.clone(),
                format!(
                    "UID prefix '{}' does not match document prefix '{}'",
                    uid.prefix(),
                    document.prefix
                ),
            ),
        );
    }

    if settings.check_references {
        check_references(settings, snapshot, item, push);
    }
    check_links(settings, snapshot, document, item, push);
    if settings.check_child_links {
        check_child_links(settings, snapshot, document, item, push);
    }
}

fn check_references<P>(settings: &Settings, snapshot: &Snapshot, item: &Item, push: &mut P)
where
    P: FnMut(&Settings, Issue),
{
    if !item.reference.is_empty() {
        if let Err(error) =
            reference::find_ref(&item.reference, &snapshot.root, &settings.skip_extensions)
        {
            push(
                settings,
                Issue::item(Severity::Error, item.uid().clone(), error.to_string()),
            );
        }
    }
    for entry in &item.references {
        let crate::domain::Reference::File { path, keyword } = entry;
        if let Err(error) = reference::find_file(path, &snapshot.root, keyword.as_deref()) {
            push(
                settings,
                Issue::item(Severity::Error, item.uid().clone(), error.to_string()),
            );
        }
    }
}

fn check_links<P>(
    settings: &Settings,
    snapshot: &Snapshot,
    document: &DocSnapshot,
    item: &Item,
    push: &mut P,
) where
    P: FnMut(&Settings, Issue),
{
    let uid = item.uid();

    for link in item.links() {
        if &link.uid == uid {
            push(
                settings,
                Issue::item(Severity::Warning, uid.clone(), "item links to itself"),
            );
            continue;
        }
        let Some((target_document, target)) = snapshot.item(&link.uid) else {
            push(
                settings,
                Issue::item(
                    Severity::Error,
                    uid.clone(),
                    format!("linked to unknown item: {}", link.uid),
                ),
            );
            continue;
        };

        if !target.active {
            push(
                settings,
                Issue::item(
                    Severity::Warning,
                    uid.clone(),
                    format!("linked to inactive item: {}", link.uid),
                ),
            );
        }
        if !target.normative {
            push(
                settings,
                Issue::item(
                    Severity::Warning,
                    uid.clone(),
                    format!("linked to non-normative item: {}", link.uid),
                ),
            );
        }
        if let Some(parent) = &document.parent {
            if &target_document.prefix != parent {
                push(
                    settings,
                    Issue::item(
                        Severity::Info,
                        uid.clone(),
                        format!(
                            "linked to item not in parent document '{}': {}",
                            parent, link.uid
                        ),
                    ),
                );
            }
        }
        if settings.check_suspect && link.stamp.is_set() {
            // An unstamped link is merely unreviewed, not suspect.
            let current = target.stamp(&target_document.reviewed, false);
            if link.stamp != current {
                push(
                    settings,
                    Issue::item(
                        Severity::Warning,
                        uid.clone(),
                        format!("suspect link: {}", link.uid),
                    ),
                );
            }
        }
    }

    if item.normative && !item.derived && document.parent.is_some() && item.links().is_empty() {
        push(
            settings,
            Issue::item(
                Severity::Warning,
                uid.clone(),
                format!(
                    "no links to parent document: {}",
                    document.parent.as_ref().map(ToString::to_string).unwrap_or_default()
                ),
            ),
        );
    }
    if !item.normative && !item.links().is_empty() {
        push(
            settings,
            Issue::item(
                Severity::Warning,
                uid.clone(),
                "non-normative item has links",
            ),
        );
    }
}

fn check_child_links<P>(
    settings: &Settings,
    snapshot: &Snapshot,
    document: &DocSnapshot,
    item: &Item,
    push: &mut P,
) where
    P: FnMut(&Settings, Issue),
{
    if !item.normative || item.derived || document.children.is_empty() {
        return;
    }
    let linked_from = snapshot.incoming.get(item.uid());

    if settings.strict_child_links {
        for child in &document.children {
            let covered = linked_from.is_some_and(|keys| keys.contains(&child.key()));
            if !covered {
                push(
                    settings,
                    Issue::item(
                        Severity::Warning,
                        item.uid().clone(),
                        format!("no links from child document: {child}"),
                    ),
                );
            }
        }
    } else {
        let covered = document
            .children
            .iter()
            .any(|child| linked_from.is_some_and(|keys| keys.contains(&child.key())));
        if !covered {
            push(
                settings,
                Issue::item(
                    Severity::Warning,
                    item.uid().clone(),
                    "no links from child documents",
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use test_case::test_case;

    use super::*;
    use crate::storage::CONFIG_FILE;

    fn write_config(dir: &Path, prefix: &str, parent: Option<&str>) {
        fs::create_dir_all(dir).unwrap();
        let mut config = format!("settings:\n  prefix: {prefix}\n  digits: 3\n");
        if let Some(parent) = parent {
            config.push_str(&format!("  parent: {parent}\n"));
        }
        fs::write(dir.join(CONFIG_FILE), config).unwrap();
    }

    fn write_item(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(format!("{name}.yml")), body).unwrap();
    }

    fn messages(issues: &[Issue]) -> Vec<String> {
        issues.iter().map(ToString::to_string).collect()
    }

    fn has_issue(issues: &[Issue], fragment: &str) -> bool {
        issues.iter().any(|issue| issue.to_string().contains(fragment))
    }

    /// SYS001 reviewed, REQ001 linked and cleared: a healthy tree.
    fn healthy_tree(dir: &Path) -> Tree {
        write_config(&dir.join("sys"), "SYS", None);
        write_item(
            &dir.join("sys"),
            "SYS001",
            "level: 1.1\ntext: top level requirement\n",
        );
        write_config(&dir.join("req"), "REQ", Some("SYS"));
        write_item(
            &dir.join("req"),
            "REQ001",
            "level: 1.1\ntext: child requirement\nlinks:\n- SYS001\n",
        );
        let mut tree = Tree::open(dir).unwrap();
        let sys = tree.parse_uid("SYS001").unwrap();
        let req = tree.parse_uid("REQ001").unwrap();
        tree.review(&sys).unwrap();
        tree.review(&req).unwrap();
        tree.clear(&req, None).unwrap();
        tree
    }

    #[test]
    fn healthy_tree_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(is_valid(&issues), "unexpected issues: {:?}", messages(&issues));
        assert!(issues.is_empty(), "unexpected issues: {:?}", messages(&issues));
    }

    #[test]
    fn empty_tree_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = Tree::open(dir.path()).unwrap();
        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "no documents"));
        assert!(is_valid(&issues));
    }

    #[test]
    fn empty_document_warns() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        let mut tree = Tree::open(dir.path()).unwrap();
        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "no items"));
    }

    #[test]
    fn unknown_link_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let req = tree.parse_uid("REQ001").unwrap();
        tree.document(req.prefix())
            .unwrap()
            .edit_item(&req, |item| {
                item.links_mut().push(crate::domain::Link::new(
                    Uid::parse("SYS999").unwrap(),
                ));
            })
            .unwrap();
        tree.review(&req).unwrap();
        tree.clear(&req, None).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "linked to unknown item: SYS999"));
        assert!(!is_valid(&issues));
    }

    #[test]
    fn fresh_link_is_unreviewed_not_suspect() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: A\n");
        write_item(dir.path(), "REQ002", "level: 1.2\ntext: B\nlinks:\n- REQ001\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(!has_issue(&issues, "suspect link"));
        let about_link: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.to_string().contains("REQ002") && i.severity >= Severity::Warning)
            .collect();
        assert!(about_link.is_empty(), "unexpected: {:?}", messages(&issues));

        let req1 = tree.parse_uid("REQ001").unwrap();
        tree.document(req1.prefix())
            .unwrap()
            .edit_item(&req1, |item| item.active = false)
            .unwrap();
        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "linked to inactive item: REQ001"));
    }

    #[test]
    fn suspect_link_warns_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let sys = tree.parse_uid("SYS001").unwrap();
        tree.document(sys.prefix())
            .unwrap()
            .edit_item(&sys, |item| item.text = "reworded".to_string())
            .unwrap();
        tree.review(&sys).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "suspect link: SYS001"));
        assert!(is_valid(&issues));

        let req = tree.parse_uid("REQ001").unwrap();
        tree.clear(&req, None).unwrap();
        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(!has_issue(&issues, "suspect link"));
    }

    #[test]
    fn unreviewed_item_is_info_changed_item_is_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let sys = tree.parse_uid("SYS001").unwrap();

        tree.document(sys.prefix())
            .unwrap()
            .edit_item(&sys, |item| item.text = "changed".to_string())
            .unwrap();
        let issues = validate(&mut tree, &Settings::default()).unwrap();
        let changed: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.message == "unreviewed changes")
            .collect();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].severity, Severity::Warning);

        tree.document(sys.prefix())
            .unwrap()
            .edit_item(&sys, |item| item.reviewed = crate::domain::Stamp::none())
            .unwrap();
        let issues = validate(&mut tree, &Settings::default()).unwrap();
        let initial: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.message == "needs initial review")
            .collect();
        assert_eq!(initial.len(), 1);
        assert_eq!(initial[0].severity, Severity::Info);
    }

    #[test]
    fn missing_parent_link_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let req = tree.parse_uid("REQ001").unwrap();
        let sys = tree.parse_uid("SYS001").unwrap();
        tree.unlink(&req, &sys).unwrap();
        tree.review(&req).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "no links to parent document: SYS"));
        assert!(has_issue(&issues, "no links from child documents"));
    }

    #[test]
    fn derived_items_need_no_links() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let req = tree.parse_uid("REQ001").unwrap();
        let sys = tree.parse_uid("SYS001").unwrap();
        tree.unlink(&req, &sys).unwrap();
        tree.document(req.prefix())
            .unwrap()
            .edit_item(&req, |item| item.derived = true)
            .unwrap();
        tree.review(&req).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(!has_issue(&issues, "no links to parent document"));
    }

    #[test]
    fn inactive_items_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let req = tree.parse_uid("REQ001").unwrap();
        let sys = tree.parse_uid("SYS001").unwrap();
        tree.unlink(&req, &sys).unwrap();
        tree.document(req.prefix())
            .unwrap()
            .edit_item(&req, |item| item.active = false)
            .unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(!has_issue(&issues, "no links to parent document"));
        // The parent also loses its child coverage, silently, because
        // the inactive child no longer counts.
        assert!(has_issue(&issues, "no links from child documents"));
    }

    #[test]
    fn linked_to_inactive_item_warns() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let sys = tree.parse_uid("SYS001").unwrap();
        tree.document(sys.prefix())
            .unwrap()
            .edit_item(&sys, |item| item.active = false)
            .unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "linked to inactive item: SYS001"));
    }

    #[test]
    fn missing_reference_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let req = tree.parse_uid("REQ001").unwrap();
        tree.document(req.prefix())
            .unwrap()
            .edit_item(&req, |item| item.reference = "no-such-file".to_string())
            .unwrap();
        tree.review(&req).unwrap();
        tree.clear(&req, None).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "external reference not found: no-such-file"));
        assert!(!is_valid(&issues));
    }

    #[test]
    fn resolvable_reference_passes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("driver.c"), "// no-such-file marker\n").unwrap();
        let mut tree = healthy_tree(dir.path());
        let req = tree.parse_uid("REQ001").unwrap();
        tree.document(req.prefix())
            .unwrap()
            .edit_item(&req, |item| {
                item.references = vec![crate::domain::Reference::File {
                    path: "driver.c".to_string(),
                    keyword: Some("marker".to_string()),
                }];
            })
            .unwrap();
        tree.review(&req).unwrap();
        tree.clear(&req, None).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(is_valid(&issues), "unexpected: {:?}", messages(&issues));
    }

    #[test]
    fn duplicate_level_warns() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: a\n");
        write_item(dir.path(), "REQ002", "level: 1.1\ntext: b\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(has_issue(&issues, "duplicate level: 1.1 (REQ001, REQ002)"));
    }

    #[test]
    fn duplicate_level_severity_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: a\n");
        write_item(dir.path(), "REQ002", "level: 1.1\ntext: b\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let settings = Settings {
            duplicate_level_severity: Severity::Error,
            ..Settings::default()
        };
        let issues = validate(&mut tree, &settings).unwrap();
        assert!(!is_valid(&issues));
    }

    #[test]
    fn skipped_level_is_info() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: a\n");
        write_item(dir.path(), "REQ002", "level: 1.3\ntext: b\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        let skipped: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.message.starts_with("skipped level"))
            .collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].severity, Severity::Info);
    }

    #[test_case("1.1", "1.2", true; "sibling")]
    #[test_case("1.1", "1.1.1", true; "first child")]
    #[test_case("1.2.3", "2", true; "dedent increment")]
    #[test_case("1.1", "1.3", false; "skipped sibling")]
    #[test_case("1.1", "1.1.2", false; "child starts past one")]
    #[test_case("1.1", "1.1.1.1", false; "two levels down")]
    #[test_case("1.2.3", "3", false; "dedent skips")]
    fn level_succession(prev: &str, next: &str, follows: bool) {
        let prev: Level = prev.parse().unwrap();
        let next: Level = next.parse().unwrap();
        assert_eq!(level_follows(&prev, &next), follows);
    }

    #[test]
    fn warn_all_promotes_info() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: a\n");
        write_item(dir.path(), "REQ002", "level: 1.3\ntext: b\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let settings = Settings {
            warn_all: true,
            ..Settings::default()
        };
        let issues = validate(&mut tree, &settings).unwrap();
        assert!(issues.iter().all(|i| i.severity >= Severity::Warning));
    }

    #[test]
    fn error_all_promotes_warnings_but_not_infos() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        // Empty text warns, the never-reviewed state is informational.
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: ''\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let settings = Settings {
            error_all: true,
            ..Settings::default()
        };
        let issues = validate(&mut tree, &settings).unwrap();
        assert!(!is_valid(&issues));
        assert!(issues.iter().any(|i| i.severity == Severity::Info));
        assert!(issues.iter().all(|i| i.severity != Severity::Warning));
    }

    #[test]
    fn warn_all_and_error_all_chain() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: a\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let settings = Settings {
            warn_all: true,
            error_all: true,
            ..Settings::default()
        };
        let issues = validate(&mut tree, &settings).unwrap();
        assert!(!issues.is_empty());
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
    }

    #[test]
    fn cycle_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "level: 1.1\ntext: a\nlinks:\n- REQ002\n");
        write_item(dir.path(), "REQ002", "level: 1.2\ntext: b\nlinks:\n- REQ001\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        let cycles: Vec<&Issue> = issues
            .iter()
            .filter(|i| i.message.starts_with("links form a cycle"))
            .collect();
        assert_eq!(cycles.len(), 1);
        assert!(cycles[0].message.contains("REQ001, REQ002"));
    }

    #[test]
    fn malformed_item_surfaces_as_error() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "REQ", None);
        write_item(dir.path(), "REQ001", "text: [broken\n");
        let mut tree = Tree::open(dir.path()).unwrap();

        let issues = validate(&mut tree, &Settings::default()).unwrap();
        assert!(!is_valid(&issues));
        assert!(has_issue(&issues, "malformed item"));
    }

    #[test]
    fn strict_child_links_cover_every_child_document() {
        let dir = tempfile::tempdir().unwrap();
        let tree = healthy_tree(dir.path());
        // A second child document under SYS with no links back.
        write_config(&dir.path().join("tst"), "TST", Some("SYS"));
        write_item(&dir.path().join("tst"), "TST001", "level: 1.1\ntext: t\n");
        drop(tree);
        let mut tree = Tree::open(dir.path()).unwrap();

        let relaxed = validate(&mut tree, &Settings::default()).unwrap();
        assert!(!has_issue(&relaxed, "no links from child document: TST"));

        let settings = Settings {
            strict_child_links: true,
            ..Settings::default()
        };
        let strict = validate(&mut tree, &settings).unwrap();
        assert!(has_issue(&strict, "no links from child document: TST"));
    }

    #[test]
    fn hooks_contribute_findings() {
        let dir = tempfile::tempdir().unwrap();
        let mut tree = healthy_tree(dir.path());
        let issues = validate_with_hooks(
            &mut tree,
            &Settings::default(),
            |_, _| Vec::new(),
            |item| {
                if item.text.contains("shall") {
                    Vec::new()
                } else {
                    vec![Issue::item(
                        Severity::Info,
                        item.uid().clone(),
                        "text does not use 'shall'",
                    )]
                }
            },
        )
        .unwrap();
        assert!(has_issue(&issues, "does not use 'shall'"));
    }
}
