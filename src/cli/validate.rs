use std::path::Path;

use clap::Parser;
use reqtree::{Severity, Tree, domain::Subject, validate};
use tracing::instrument;

use super::terminal::Colorize;

#[derive(Debug, Parser)]
#[command(about = "Check the tree for broken or stale traceability")]
pub struct Validate {
    /// Treat informational findings as warnings
    #[arg(long)]
    warn_all: bool,

    /// Treat warnings as errors
    #[arg(long)]
    error_all: bool,

    /// Skip external reference checks
    #[arg(long)]
    no_refs: bool,

    /// Skip suspect link fingerprint checks
    #[arg(long)]
    no_suspect: bool,

    /// Skip outline level checks
    #[arg(long)]
    no_levels: bool,

    /// Require links from every child document separately
    #[arg(long)]
    strict_child_links: bool,

    /// Emit findings as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Only print the summary line
    #[arg(long, short)]
    quiet: bool,
}

impl Validate {
    #[instrument(skip(self, tree))]
    pub fn run(self, tree: &mut Tree, _root: &Path) -> anyhow::Result<()> {
        let settings = validate::Settings {
            warn_all: self.warn_all,
            error_all: self.error_all,
            check_references: !self.no_refs,
            check_suspect: !self.no_suspect,
            check_levels: !self.no_levels,
            strict_child_links: self.strict_child_links,
            ..validate::Settings::default()
        };

        let issues = validate::validate(tree, &settings)?;
        if self.json {
            let entries: Vec<serde_json::Value> = issues
                .iter()
                .map(|issue| {
                    let subject = match &issue.subject {
                        Subject::Tree => serde_json::Value::Null,
                        Subject::Document(prefix) => prefix.to_string().into(),
                        Subject::Item(uid) => uid.to_string().into(),
                    };
                    serde_json::json!({
                        "severity": issue.severity.to_string(),
                        "subject": subject,
                        "message": issue.message,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        } else if !self.quiet {
            for issue in &issues {
                let line = issue.to_string();
                let line = match issue.severity {
                    Severity::Info => line.info(),
                    Severity::Warning => line.warning(),
                    Severity::Error => line.failure(),
                };
                println!("{line}");
            }
        }

        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let warnings = issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count();

        if validate::is_valid(&issues) {
            if !self.json {
                println!("{}", format!("valid ({warnings} warnings)").success());
            }
            Ok(())
        } else {
            if !self.json {
                println!(
                    "{}",
                    format!("invalid ({errors} errors, {warnings} warnings)").failure()
                );
            }
            anyhow::bail!("validation failed")
        }
    }
}
