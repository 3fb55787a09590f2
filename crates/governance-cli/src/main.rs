//! `govctl` - governance engine command line
//!
//! ## Commands
//!
//! - `hash`: canonical SHA-256 digest of a JSON document
//! - `validate`: validate a decision event payload
//! - `audit`: verify, query, export or summarize the audit log
//! - `check`: evaluate one permission against a policy file
//!
//! `check` and `audit` use the SurrealDB store configured through
//! `SURREALDB_*` (local `.governance/db` when unset). `audit --log <file>`
//! reads an exported JSON-lines log instead.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, Level};

use governance_core::audit::parse_jsonl;
use governance_core::{
    compute_digest, validate_decision_event, AccessPolicy, AuditChain, AuditQuery,
    ExportFormat, GovernanceConfig, PermissionEvaluator, Principal, Resource,
};
use governance_state::fakes::MemoryAuditStore;
use governance_state::{AuditStore, SurrealAuditStore};

#[derive(Parser)]
#[command(name = "govctl")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Governance decision & audit integrity engine", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Engine config file (TOML); GOVERNANCE_* env vars override it
    #[arg(long, global = true, env = "GOVERNANCE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical digest of a JSON file
    Hash {
        /// JSON file to hash
        file: PathBuf,
    },

    /// Validate a decision event and list every violation
    Validate {
        /// Decision event JSON file
        file: PathBuf,
    },

    /// Operate on the audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// Evaluate a permission and print the decision with its audit entry
    Check {
        /// Policy file (.toml or .json); built-in organization roles if omitted
        #[arg(long)]
        policy: Option<PathBuf>,

        #[arg(long)]
        principal: String,

        #[arg(long)]
        role: String,

        /// Principal's organization
        #[arg(long)]
        org: String,

        #[arg(long)]
        resource: String,

        #[arg(long)]
        resource_type: String,

        /// Resource organization (defaults to --org)
        #[arg(long)]
        resource_org: Option<String>,

        /// Parent resource id
        #[arg(long)]
        parent: Option<String>,

        #[arg(long)]
        action: String,
    },
}

#[derive(Subcommand)]
enum AuditAction {
    /// Recompute hashes and links; exits non-zero on any violation
    Verify {
        /// Exported JSON-lines log; the live store if omitted
        #[arg(long)]
        log: Option<PathBuf>,

        /// Verify a single entry instead of a time range
        #[arg(long, conflicts_with_all = ["from", "to"])]
        id: Option<String>,

        #[arg(long)]
        from: Option<DateTime<Utc>>,

        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },

    /// Print one entry by id
    Show {
        /// Exported JSON-lines log; the live store if omitted
        #[arg(long)]
        log: Option<PathBuf>,

        id: String,
    },

    /// Print matching entries as JSON
    Query {
        /// Exported JSON-lines log; the live store if omitted
        #[arg(long)]
        log: Option<PathBuf>,

        #[arg(long)]
        from: Option<DateTime<Utc>>,

        #[arg(long)]
        to: Option<DateTime<Utc>>,

        #[arg(long)]
        principal: Option<String>,

        #[arg(long)]
        action: Option<String>,

        #[arg(long)]
        resource_id: Option<String>,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Re-export entries as json, jsonl or csv
    Export {
        /// Exported JSON-lines log; the live store if omitted
        #[arg(long)]
        log: Option<PathBuf>,

        #[arg(short, long, default_value = "json")]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Activity summary for a period
    Report {
        /// Exported JSON-lines log; the live store if omitted
        #[arg(long)]
        log: Option<PathBuf>,

        #[arg(long)]
        from: Option<DateTime<Utc>>,

        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    governance_core::telemetry::init_tracing(cli.json, level);

    let config = GovernanceConfig::load(cli.config.as_deref())
        .context("Failed to load governance config")?;
    debug!(?config, "configuration loaded");

    let result = match cli.command {
        Commands::Hash { file } => cmd_hash(&file),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Audit { action } => match action {
            AuditAction::Verify { log, id, from, to } => {
                cmd_audit_verify(&config, log.as_deref(), id.as_deref(), from, to).await
            }
            AuditAction::Show { log, id } => cmd_audit_show(&config, log.as_deref(), &id).await,
            AuditAction::Query {
                log,
                from,
                to,
                principal,
                action,
                resource_id,
                limit,
            } => {
                let query = AuditQuery {
                    from,
                    to,
                    principal_id: principal,
                    action,
                    resource_id,
                    include_archived: true,
                    limit,
                    offset: 0,
                };
                cmd_audit_query(&config, log.as_deref(), &query).await
            }
            AuditAction::Export {
                log,
                format,
                output,
            } => cmd_audit_export(&config, log.as_deref(), format, output.as_deref()).await,
            AuditAction::Report { log, from, to } => {
                cmd_audit_report(&config, log.as_deref(), from, to).await
            }
        },
        Commands::Check {
            policy,
            principal,
            role,
            org,
            resource,
            resource_type,
            resource_org,
            parent,
            action,
        } => {
            let principal = Principal::new(principal, role, &org);
            let mut resource =
                Resource::new(resource, resource_type).in_organization(resource_org.unwrap_or(org));
            if let Some(parent) = parent {
                resource = resource.child_of(parent);
            }
            cmd_check(&config, policy.as_deref(), &principal, &resource, &action).await
        }
    };

    governance_core::metrics::METRICS.flush();
    result
}

fn read_json(path: &Path) -> Result<Value> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Open the chain over an exported log (loaded into memory) or, without
/// `log`, over the configured SurrealDB store.
async fn open_chain(config: &GovernanceConfig, log: Option<&Path>) -> Result<AuditChain> {
    let store: Arc<dyn AuditStore> = match log {
        Some(log) => {
            let contents = std::fs::read_to_string(log)
                .with_context(|| format!("Failed to read audit log {}", log.display()))?;
            let entries = parse_jsonl(&contents).context("Failed to parse audit log")?;
            debug!(entries = entries.len(), log = %log.display(), "audit log loaded");
            Arc::new(MemoryAuditStore::from_entries(entries))
        }
        None => Arc::new(
            SurrealAuditStore::from_env()
                .await
                .context("Failed to connect to audit store")?,
        ),
    };
    AuditChain::open(store, &config.audit)
        .await
        .context("Failed to open audit chain")
}

fn cmd_hash(file: &Path) -> Result<()> {
    let value = read_json(file)?;
    let digest = compute_digest(&value).context("Failed to hash document")?;
    println!("{digest}");
    Ok(())
}

fn cmd_validate(file: &Path) -> Result<()> {
    let raw = read_json(file)?;
    match validate_decision_event(&raw) {
        Ok(event) => {
            println!(
                "valid: {} ({} by {} {})",
                event.id(),
                event.decision_type(),
                event.agent_id(),
                event.agent_version()
            );
            Ok(())
        }
        Err(err) => {
            for v in &err.violations {
                println!("{}\t{}\t{}", v.path, v.code, v.message);
            }
            bail!("{} rejected with {} violation(s)", file.display(), err.violations.len())
        }
    }
}

async fn cmd_audit_verify(
    config: &GovernanceConfig,
    log: Option<&Path>,
    id: Option<&str>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    let chain = open_chain(config, log).await?;
    let report = match id {
        Some(id) => chain
            .verify_entry(id)
            .await?
            .with_context(|| format!("No audit entry with id {id}"))?,
        None => chain.verify_integrity(from, to).await?,
    };
    print_json(&report)?;
    if !report.verified {
        bail!(
            "audit chain integrity violated: {} violation(s)",
            report.violations.len()
        );
    }
    Ok(())
}

async fn cmd_audit_show(config: &GovernanceConfig, log: Option<&Path>, id: &str) -> Result<()> {
    let chain = open_chain(config, log).await?;
    let entry = chain
        .get(id)
        .await?
        .with_context(|| format!("No audit entry with id {id}"))?;
    print_json(&entry)
}

async fn cmd_audit_query(
    config: &GovernanceConfig,
    log: Option<&Path>,
    query: &AuditQuery,
) -> Result<()> {
    let chain = open_chain(config, log).await?;
    let entries = chain.query(query).await?;
    print_json(&entries)
}

async fn cmd_audit_export(
    config: &GovernanceConfig,
    log: Option<&Path>,
    format: ExportFormat,
    output: Option<&Path>,
) -> Result<()> {
    let chain = open_chain(config, log).await?;
    let rendered = chain.export(&AuditQuery::all(), format).await?;
    match output {
        Some(path) => std::fs::write(path, rendered)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{rendered}");
            Ok(())
        }
    }
}

async fn cmd_audit_report(
    config: &GovernanceConfig,
    log: Option<&Path>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<()> {
    let chain = open_chain(config, log).await?;
    let report = chain.compliance_report(from, to).await?;
    print_json(&report)
}

fn load_policy(path: Option<&Path>) -> Result<AccessPolicy> {
    let Some(path) = path else {
        return Ok(AccessPolicy::standard_org_roles());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy {}", path.display()))?;
    let policy = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => AccessPolicy::from_toml_str(&contents)?,
        _ => AccessPolicy::from_json_str(&contents)?,
    };
    Ok(policy)
}

async fn cmd_check(
    config: &GovernanceConfig,
    policy: Option<&Path>,
    principal: &Principal,
    resource: &Resource,
    action: &str,
) -> Result<()> {
    let policy = load_policy(policy)?;
    let chain = open_chain(config, None).await?;
    let evaluator = PermissionEvaluator::new(Arc::new(policy), chain.clone(), &config.permissions)
        .context("Invalid permission settings")?;

    let decision = evaluator.check(principal, resource, action).await?;
    let audit_entry = chain
        .query(
            &AuditQuery::all()
                .with_principal(principal.id.as_str())
                .with_resource_id(resource.id.as_str()),
        )
        .await?
        .pop();

    print_json(&serde_json::json!({
        "decision": decision,
        "audit_entry": audit_entry,
    }))
}
