//! aimem: earned authority for an AI coding assistant.
//!
//! aimem learns a project's conventions, holds the assistant to them, and
//! lets the assistant's say grow with its track record.
//!
//! # Architecture
//!
//! ## Dual-Store Model
//!
//! - **User Store** (`~/.aimem/data/`): one store for every project on the machine
//! - **Repo Store** (`<repo>/.aimem/data/`): used when a `.aimem/` directory is found above the cwd
//! - `AIMEM_DATA_DIR` pins the store root explicitly
//!
//! ## The Thin Waist
//!
//! All store access routes through `DbBroker`, which serializes connections
//! within a process and appends one line per operation to
//! `broker.events.jsonl`.
//!
//! ## Subsystems (Plugins)
//!
//! - `dik`: the per-project trust level and its counters
//! - `analyzer`: proposes guardrails from recorded code structures
//! - `guardrails`: persisted rules, violation checks, accept/override/vindicate
//! - `responder`: pushback text scaled to the trust level
//! - `vindication`: notices when an overridden suggestion was adopted later
//! - `projects`: project registry and indexed structures
//! - `importer`: guardrails from an `.eslintrc.json`
//!
//! # Examples
//!
//! ```bash
//! aimem project add --name web
//! aimem rules analyze --save
//! aimem guard check --action "add getUserData() in src/api.ts"
//! aimem guard override --id 3 --reason "deadline" \
//!     --suggestion "use retry instead of throw" --file src/api.ts --lines 10:24
//! aimem vindicate file --path src/api.ts
//! aimem dik status
//! ```

pub mod core;
pub mod plugins;

use crate::core::{config, db, error, output, store::Store};
use crate::plugins::{
    analyzer, dik, guardrails,
    guardrails::{GuardrailCategory, GuardrailSource, NewGuardrail, Severity},
    importer, projects, vindication,
};

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "aimem",
    version = env!("CARGO_PKG_VERSION"),
    about = "Earned authority for AI coding assistants"
)]
struct Cli {
    /// Project id; detected from the current directory when omitted.
    #[clap(long, global = true)]
    project: Option<i64>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register and look up projects
    #[clap(name = "project", visible_alias = "p")]
    Project(projects::ProjectCli),

    /// Propose, add and curate guardrails
    #[clap(name = "rules", visible_alias = "r")]
    Rules(RulesCli),

    /// Check actions against guardrails and record the outcome
    #[clap(name = "guard", visible_alias = "g")]
    Guard(GuardCli),

    /// Trust level for the project
    #[clap(name = "dik")]
    Dik(dik::DikCli),

    /// Re-check overridden suggestions
    #[clap(name = "vindicate", visible_alias = "v")]
    Vindicate(vindication::VindicateCli),

    /// Show version information
    #[clap(name = "version")]
    Version,
}

#[derive(clap::Args, Debug)]
struct RulesCli {
    #[clap(subcommand)]
    command: RulesCommand,
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Propose guardrails from the project's recorded structures
    Analyze {
        /// Category to analyze (repeatable; defaults to all)
        #[clap(long = "category")]
        categories: Vec<String>,
        /// Persist the proposals as inferred guardrails
        #[clap(long)]
        save: bool,
        /// Output format: 'text' or 'json'
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Add a guardrail by hand
    Add {
        #[clap(long)]
        category: String,
        #[clap(long)]
        rule: String,
        #[clap(long)]
        rationale: Option<String>,
        /// 'info', 'warn' or 'block'
        #[clap(long, default_value = "warn")]
        severity: String,
    },
    /// List guardrails
    List {
        #[clap(long)]
        category: Option<String>,
        /// Include deactivated guardrails
        #[clap(long)]
        all: bool,
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Confirm an inferred guardrail
    Confirm {
        #[clap(long)]
        id: i64,
    },
    /// Stop enforcing a guardrail, keeping its history
    Deactivate {
        #[clap(long)]
        id: i64,
    },
    /// Import guardrails from an ESLint JSON config
    ImportEslint {
        #[clap(long, default_value = ".eslintrc.json")]
        path: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct GuardCli {
    #[clap(subcommand)]
    command: GuardCommand,
}

#[derive(Subcommand, Debug)]
enum GuardCommand {
    /// Check a proposed action against active guardrails
    Check {
        #[clap(long)]
        action: String,
        #[clap(long)]
        context: Option<String>,
        #[clap(long, default_value = "text")]
        format: String,
    },
    /// Record that a guardrail was followed
    Accept {
        #[clap(long)]
        id: i64,
    },
    /// Record that a guardrail was overridden
    Override {
        #[clap(long)]
        id: i64,
        #[clap(long)]
        reason: String,
        /// The suggestion that was rejected; with --file and --lines it is
        /// watched for vindication
        #[clap(long)]
        suggestion: Option<String>,
        #[clap(long)]
        file: Option<String>,
        /// Line range as START:END (1-based, inclusive)
        #[clap(long)]
        lines: Option<String>,
    },
    /// Mark an override as vindicated by hand
    Vindicate {
        #[clap(long)]
        event: i64,
    },
    /// Show a guardrail's event history
    History {
        #[clap(long)]
        id: i64,
        #[clap(long, default_value = "text")]
        format: String,
    },
}

/// Resolve `--project`, falling back to the registered project containing
/// `cwd`.
fn resolve_project(store: &Store, explicit: Option<i64>, cwd: &Path) -> Result<i64, error::AimemError> {
    if let Some(id) = explicit {
        return match projects::get_project(store, id)? {
            Some(p) => Ok(p.id),
            None => Err(error::AimemError::NotFound(format!("project {}", id))),
        };
    }
    match projects::detect_project(store, cwd)? {
        Some(p) => Ok(p.id),
        None => Err(error::AimemError::NotFound(format!(
            "no registered project contains {}; run `aimem project add` first",
            cwd.display()
        ))),
    }
}

/// Parse `START:END`, `START-END` or a single line number.
fn parse_line_range(raw: &str) -> Result<(usize, usize), error::AimemError> {
    let invalid = || error::AimemError::ValidationError(format!("invalid line range '{}'", raw));
    let (start, end) = match raw.split_once([':', '-']) {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (raw.trim(), raw.trim()),
    };
    let start: usize = start.parse().map_err(|_| invalid())?;
    let end: usize = end.parse().map_err(|_| invalid())?;
    if start == 0 || end < start {
        return Err(invalid());
    }
    Ok((start, end))
}

fn run_rules_cli(store: &Store, project_id: i64, cli: RulesCli) -> Result<(), error::AimemError> {
    match cli.command {
        RulesCommand::Analyze {
            categories,
            save,
            format,
        } => {
            let categories = if categories.is_empty() {
                GuardrailCategory::ALL.to_vec()
            } else {
                categories
                    .iter()
                    .map(|c| c.parse())
                    .collect::<Result<Vec<GuardrailCategory>, _>>()?
            };
            let proposals = analyzer::analyze_project(store, project_id, &categories)?;
            let saved = if save {
                analyzer::save_proposed_rules(store, project_id, &proposals)?
            } else {
                Vec::new()
            };
            if format == "json" {
                let report = serde_json::json!({ "proposals": proposals, "saved": saved });
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }
            if proposals.is_empty() {
                println!("No conventions strong enough to propose.");
            }
            for p in &proposals {
                println!(
                    "[{}] {} ({:.0}%)",
                    p.category.as_str().bright_cyan(),
                    p.rule.bold(),
                    p.confidence * 100.0
                );
                println!("    {}", p.rationale);
                for e in &p.evidence {
                    println!("    - {}", e);
                }
            }
            if save {
                println!("✓ Saved {} new guardrail(s)", saved.len());
            }
        }
        RulesCommand::Add {
            category,
            rule,
            rationale,
            severity,
        } => {
            let input = NewGuardrail {
                category: category.parse()?,
                rule,
                rationale,
                severity: severity.parse::<Severity>()?,
                source: GuardrailSource::Explicit,
            };
            let id = guardrails::add_guardrail(store, project_id, input)?;
            println!("✓ Guardrail added (id: {})", id);
        }
        RulesCommand::List {
            category,
            all,
            format,
        } => {
            let category = category.map(|c| c.parse::<GuardrailCategory>()).transpose()?;
            let items = guardrails::list_guardrails(store, project_id, category, all)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else if items.is_empty() {
                println!("No guardrails recorded yet.");
            } else {
                for g in items {
                    let mut flags = vec![g.severity.as_str(), g.source.as_str()];
                    if g.confirmed {
                        flags.push("confirmed");
                    }
                    if !g.active {
                        flags.push("inactive");
                    }
                    println!(
                        "{:>4}  [{}] {}  ({})",
                        g.id,
                        g.category.as_str().bright_cyan(),
                        g.rule,
                        flags.join(", ")
                    );
                }
            }
        }
        RulesCommand::Confirm { id } => {
            if guardrails::confirm_guardrail(store, id, project_id)? {
                println!("✓ Guardrail {} confirmed", id);
            } else {
                println!("Guardrail {} was already confirmed", id);
            }
        }
        RulesCommand::Deactivate { id } => {
            if guardrails::deactivate_guardrail(store, id, project_id)? {
                println!("✓ Guardrail {} deactivated", id);
            } else {
                println!("Guardrail {} was already inactive", id);
            }
        }
        RulesCommand::ImportEslint { path } => {
            let report = importer::import_eslint_config(store, project_id, &path)?;
            println!(
                "✓ Imported {} guardrail(s) from {} ({} duplicate, {} disabled, {} unmapped)",
                report.imported.len(),
                path.display(),
                report.duplicates,
                report.disabled.len(),
                report.unknown.len()
            );
        }
    }
    Ok(())
}

fn run_guard_cli(store: &Store, project_id: i64, cli: GuardCli) -> Result<(), error::AimemError> {
    match cli.command {
        GuardCommand::Check {
            action,
            context,
            format,
        } => {
            let result = guardrails::check_guardrails(store, project_id, &action, context.as_deref())?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if result.violations.is_empty() {
                println!("{} no guardrails triggered", "✓".bright_green());
            } else {
                println!("{}", result.response);
                for v in &result.violations {
                    println!(
                        "  {} guardrail {} matched on {}",
                        "▸".bright_yellow(),
                        v.guardrail_id,
                        v.matched_keywords.join(", ")
                    );
                }
            }
        }
        GuardCommand::Accept { id } => {
            let event = guardrails::accept_guardrail(store, id, project_id)?;
            println!("✓ Accepted (event: {})", event);
        }
        GuardCommand::Override {
            id,
            reason,
            suggestion,
            file,
            lines,
        } => {
            let event = match (suggestion, file, lines) {
                (Some(suggestion), Some(file), Some(lines)) => {
                    let (start, end) = parse_line_range(&lines)?;
                    vindication::record_override_with_snapshot(
                        store,
                        id,
                        project_id,
                        &reason,
                        &suggestion,
                        &file,
                        start,
                        end,
                    )?
                }
                (None, None, None) => guardrails::override_guardrail(store, id, project_id, &reason)?,
                _ => {
                    return Err(error::AimemError::ValidationError(
                        "--suggestion, --file and --lines go together".to_string(),
                    ));
                }
            };
            println!("✓ Override recorded (event: {})", event);
        }
        GuardCommand::Vindicate { event } => {
            let level = guardrails::vindicate_override(store, event, project_id)?;
            println!("✓ Override {} vindicated; DIK is now {:.1}", event, level);
        }
        GuardCommand::History { id, format } => {
            let events = guardrails::list_events(store, id)?;
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&events)?);
            } else if events.is_empty() {
                println!("No events for guardrail {}", id);
            } else {
                for e in events {
                    let note = e
                        .candidate()
                        .map(|c| match c.resolution {
                            Some(r) => format!(" [{}]", r.as_str()),
                            None => " [pending]".to_string(),
                        })
                        .unwrap_or_default();
                    println!(
                        "{:>4}  {:<10} DIK {:.1}{}  {}",
                        e.id,
                        e.event_type.as_str(),
                        e.dik_level,
                        note,
                        e.context.as_deref().map(|c| output::compact_line(c, 60)).unwrap_or_default()
                    );
                }
            }
        }
    }
    Ok(())
}

pub fn run() -> Result<(), error::AimemError> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        println!("v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let store = Store::resolve(&cwd)?;
    db::initialize_guardrails_db(&store.root)?;
    // Surface a broken config before doing any work.
    config::load_config(&store.root)?;

    match cli.command {
        Command::Version => {}
        Command::Project(project_cli) => projects::run_project_cli(&store, project_cli)?,
        Command::Rules(rules_cli) => {
            let project_id = resolve_project(&store, cli.project, &cwd)?;
            run_rules_cli(&store, project_id, rules_cli)?;
        }
        Command::Guard(guard_cli) => {
            let project_id = resolve_project(&store, cli.project, &cwd)?;
            run_guard_cli(&store, project_id, guard_cli)?;
        }
        Command::Dik(dik_cli) => {
            let project_id = resolve_project(&store, cli.project, &cwd)?;
            dik::run_dik_cli(&store, project_id, dik_cli)?;
        }
        Command::Vindicate(vindicate_cli) => {
            let project_id = resolve_project(&store, cli.project, &cwd)?;
            vindication::run_vindicate_cli(&store, project_id, vindicate_cli)?;
        }
    }
    Ok(())
}
