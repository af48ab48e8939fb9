use std::path::{Path, PathBuf};

mod reorder;
mod terminal;
mod validate;

use clap::ArgAction;
use reorder::Reorder;
use reqtree::{Level, OnMalformed, Prefix, Separator, Tree, Uid, exchange};
use tracing::instrument;
use validate::Validate;

/// Parse a document prefix, normalizing to uppercase.
fn parse_prefix(s: &str) -> Result<Prefix, String> {
    Prefix::new(&s.to_uppercase()).map_err(|e| format!("{e}"))
}

/// Parse an outline level such as `1.2` or `1.0`.
fn parse_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// The path to the root of the requirements tree
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    /// Fail instead of skipping item files that do not parse
    #[arg(long, global = true)]
    strict_load: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        Self::setup_logging(self.verbose);

        let on_malformed = if self.strict_load {
            OnMalformed::Abort
        } else {
            OnMalformed::Skip
        };
        let mut tree = Tree::open_with(&self.root, on_malformed)?;
        self.command.run(&mut tree, self.root)
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .init();
    }
}

#[derive(Debug, clap::Parser)]
pub enum Command {
    /// Create a new document
    Create(Create),

    /// Add an item to a document
    Add(Add),

    /// Delete an item
    Remove(Remove),

    /// Link a child item to a parent item
    ///
    /// New links carry no fingerprint until the child is cleared;
    /// suspect detection starts from that recorded fingerprint.
    Link(Link),

    /// Remove a link between two items
    Unlink(Unlink),

    /// Mark items as reviewed at their current content
    Review(Review),

    /// Accept suspect links by recording the parents' current
    /// fingerprints
    Clear(Clear),

    /// Renumber a document's outline levels
    Reorder(Reorder),

    /// Validate tree traceability
    Validate(Validate),

    /// Export a document to a YAML file
    Export(Export),

    /// Import items into a document from a YAML file
    Import(Import),
}

impl Command {
    fn run(self, tree: &mut Tree, root: PathBuf) -> anyhow::Result<()> {
        match self {
            Self::Create(command) => command.run(tree, &root)?,
            Self::Add(command) => command.run(tree)?,
            Self::Remove(command) => command.run(tree)?,
            Self::Link(command) => command.run(tree)?,
            Self::Unlink(command) => command.run(tree)?,
            Self::Review(command) => command.run(tree)?,
            Self::Clear(command) => command.run(tree)?,
            Self::Reorder(command) => command.run(tree)?,
            Self::Validate(command) => command.run(tree, &root)?,
            Self::Export(command) => command.run(tree)?,
            Self::Import(command) => command.run(tree)?,
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Create {
    /// The new document's prefix
    #[arg(value_parser = parse_prefix)]
    prefix: Prefix,

    /// Directory for the document, relative to the root
    #[arg(long, value_name = "DIR")]
    path: Option<PathBuf>,

    /// Prefix of the parent document
    #[arg(long, value_parser = parse_prefix)]
    parent: Option<Prefix>,

    /// Separator between prefix and number in generated UIDs
    #[arg(long, default_value = "")]
    sep: String,

    /// Digits in generated UIDs
    #[arg(long, default_value_t = 3)]
    digits: usize,
}

impl Create {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree, root: &Path) -> anyhow::Result<()> {
        let separator = Separator::parse(&self.sep)?;
        let directory = self
            .path
            .unwrap_or_else(|| PathBuf::from(self.prefix.key()));
        tree.create_document(
            &root.join(directory),
            self.prefix.clone(),
            separator,
            self.digits,
            self.parent,
        )?;
        println!("created document {}", self.prefix);
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Add {
    /// The document to add to
    #[arg(value_parser = parse_prefix)]
    prefix: Prefix,

    /// Outline level for the new item
    #[arg(long, value_parser = parse_level)]
    level: Option<Level>,

    /// Add a section heading instead of a requirement
    #[arg(long)]
    heading: bool,
}

impl Add {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let uid = if self.heading {
            tree.add_heading(&self.prefix, self.level)?
        } else {
            tree.add_item(&self.prefix, self.level)?
        };
        println!("added {uid}");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Remove {
    /// The item to delete
    uid: String,
}

impl Remove {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let uid = tree.parse_uid(&self.uid)?;
        tree.remove_item(&uid)?;
        println!("removed {uid}");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Link {
    /// The child item
    child: String,

    /// The parent item
    parent: String,
}

impl Link {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let child = tree.parse_uid(&self.child)?;
        let parent = tree.parse_uid(&self.parent)?;
        if tree.link(&child, &parent)? {
            println!("linked {child} -> {parent}");
        } else {
            println!("already linked {child} -> {parent}");
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Unlink {
    /// The child item
    child: String,

    /// The parent item
    parent: String,
}

impl Unlink {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let child = tree.parse_uid(&self.child)?;
        let parent = tree.parse_uid(&self.parent)?;
        tree.unlink(&child, &parent)?;
        println!("unlinked {child} -> {parent}");
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Review {
    /// The items to mark reviewed
    #[arg(required = true)]
    uids: Vec<String>,
}

impl Review {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        for text in &self.uids {
            let uid = tree.parse_uid(text)?;
            tree.review(&uid)?;
            println!("reviewed {uid}");
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Clear {
    /// The child item whose links to accept
    child: String,

    /// Only accept links to these parents
    parents: Vec<String>,
}

impl Clear {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let child = tree.parse_uid(&self.child)?;
        let parents = self
            .parents
            .iter()
            .map(|text| tree.parse_uid(text))
            .collect::<Result<Vec<Uid>, _>>()?;
        let filter = (!parents.is_empty()).then_some(parents.as_slice());
        let cleared = tree.clear(&child, filter)?;
        for uid in cleared {
            println!("cleared {child} -> {uid}");
        }
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Export {
    /// The document to export
    #[arg(value_parser = parse_prefix)]
    prefix: Prefix,

    /// Output file
    file: PathBuf,
}

impl Export {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let document = tree.document(&self.prefix)?;
        exchange::export_to_file(document, &self.file)?;
        println!("exported {} to {}", self.prefix, self.file.display());
        Ok(())
    }
}

#[derive(Debug, clap::Parser)]
pub struct Import {
    /// The document to import into
    #[arg(value_parser = parse_prefix)]
    prefix: Prefix,

    /// Input file
    file: PathBuf,
}

impl Import {
    #[instrument(skip(self, tree))]
    fn run(self, tree: &mut Tree) -> anyhow::Result<()> {
        let document = tree.document(&self.prefix)?;
        let imported = exchange::import_from_file(document, &self.file)?;
        println!(
            "imported {} items into {}",
            imported.len(),
            self.prefix
        );
        Ok(())
    }
}
