//! chainproof: operator CLI
//!
//! Appends events to a JSON Lines audit log and verifies logs and exported
//! evidence bundles.
//!
//! Usage:
//!   chainproof verify-bundle export-case-42 --head-hash <hex>
//!   chainproof verify-chain --input audit.jsonl
//!   chainproof append --log audit.jsonl --actor clerk-1 --action case.create --tier green
//!
//! Exit status: 0 verified, 1 rejected, 2 input unusable or command failed.

mod config;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chainproof_audit::{ChainAppender, JsonlAuditStore};
use chainproof_contracts::{
    BundleReport, CanonicalValue, ChainOutcome, ChainproofError, ChainproofResult, Tier,
};
use chainproof_core::{verify_jsonl, CancelToken};
use chainproof_verify::BundleVerifier;

use config::ChainproofConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// chainproof: tamper-evident audit chains and evidence bundles.
#[derive(Parser)]
#[command(
    name = "chainproof",
    about = "Append to and verify hash-chained audit logs and evidence bundles",
    long_about = "Appends events to a SHA-256 hash-chained audit log and verifies\n\
                  logs and exported evidence bundles, naming every mismatch found."
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify an unpacked export bundle directory.
    VerifyBundle {
        /// Bundle directory containing the manifest, log and documents.
        dir: PathBuf,
        /// Head hash obtained from a trusted source.
        #[arg(long)]
        head_hash: Option<String>,
        /// Abort after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Verify a JSON Lines audit log.
    VerifyChain {
        #[arg(long)]
        input: PathBuf,
        /// Head hash the log must end at.
        #[arg(long)]
        head_hash: Option<String>,
        /// Abort after this many seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Append one event to a JSON Lines audit log.
    Append {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        action: String,
        /// green, amber or red.
        #[arg(long)]
        tier: Tier,
        #[arg(long)]
        case_id: Option<String>,
        /// Event payload as a JSON object.
        #[arg(long, default_value = "{}")]
        payload: String,
    },
}

// ── Exit status ───────────────────────────────────────────────────────────────

const EXIT_OK: u8 = 0;
const EXIT_REJECTED: u8 = 1;
const EXIT_UNUSABLE: u8 = 2;

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Command::VerifyBundle {
            dir,
            head_hash,
            timeout_secs,
        } => run_verify_bundle(&config, &dir, head_hash, timeout_secs),
        Command::VerifyChain {
            input,
            head_hash,
            timeout_secs,
        } => run_verify_chain(&config, &input, head_hash.as_deref(), timeout_secs),
        Command::Append {
            log,
            actor,
            action,
            tier,
            case_id,
            payload,
        } => run_append(&config, &log, actor, action, tier, case_id, &payload),
    });

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("chainproof: {}", e);
            ExitCode::from(EXIT_UNUSABLE)
        }
    }
}

fn load_config(path: Option<&Path>) -> ChainproofResult<ChainproofConfig> {
    match path {
        Some(path) => ChainproofConfig::from_file(path),
        None => Ok(ChainproofConfig::default()),
    }
}

fn cancel_token(config: &ChainproofConfig, flag: Option<u64>) -> CancelToken {
    match flag.or(config.verify.timeout_secs) {
        Some(secs) => CancelToken::with_timeout(Duration::from_secs(secs)),
        None => CancelToken::new(),
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_verify_bundle(
    config: &ChainproofConfig,
    dir: &Path,
    head_hash: Option<String>,
    timeout_secs: Option<u64>,
) -> ChainproofResult<u8> {
    if !dir.is_dir() {
        return Err(ChainproofError::Io {
            reason: format!("bundle directory '{}' not found", dir.display()),
        });
    }

    let mut verifier = BundleVerifier::new()
        .with_layout(config.layout())
        .with_cancel(cancel_token(config, timeout_secs));
    if let Some(head) = head_hash {
        verifier = verifier.with_expected_head(head);
    }

    let report = verifier.verify_dir(dir);
    print_report(dir, &report);

    if report
        .rejections
        .iter()
        .any(|e| matches!(e, ChainproofError::Cancelled { .. }))
    {
        return Ok(EXIT_UNUSABLE);
    }
    Ok(if report.accepted() {
        EXIT_OK
    } else {
        EXIT_REJECTED
    })
}

fn run_verify_chain(
    config: &ChainproofConfig,
    input: &Path,
    head_hash: Option<&str>,
    timeout_secs: Option<u64>,
) -> ChainproofResult<u8> {
    let file = File::open(input).map_err(|e| ChainproofError::Io {
        reason: format!("failed to open '{}': {}", input.display(), e),
    })?;
    let cancel = cancel_token(config, timeout_secs);

    match verify_jsonl(BufReader::new(file), head_hash, &cancel) {
        Ok(ChainOutcome::Verified {
            head_hash,
            event_count,
        }) => {
            println!("VERIFIED  {} events, head {}", event_count, head_hash);
            Ok(EXIT_OK)
        }
        Ok(ChainOutcome::Empty) => {
            println!("VERIFIED  log is empty");
            Ok(EXIT_OK)
        }
        Err(e) if e.is_integrity_failure() || matches!(e, ChainproofError::MalformedRecord { .. }) => {
            println!("REJECTED  {}", e);
            Ok(EXIT_REJECTED)
        }
        Err(e) => Err(e),
    }
}

fn run_append(
    config: &ChainproofConfig,
    log: &Path,
    actor: String,
    action: String,
    tier: Tier,
    case_id: Option<String>,
    payload: &str,
) -> ChainproofResult<u8> {
    let payload: CanonicalValue =
        serde_json::from_str(payload).map_err(|e| ChainproofError::Serialization {
            reason: format!("invalid --payload: {}", e),
        })?;

    let appender =
        ChainAppender::new(JsonlAuditStore::open(log)?).with_max_retries(config.append.max_retries);
    let event = appender.append_event(actor, action, tier, case_id, payload)?;
    println!("{}", event.to_json_line()?);
    Ok(EXIT_OK)
}

// ── Report ────────────────────────────────────────────────────────────────────

fn print_report(dir: &Path, report: &BundleReport) {
    println!("bundle:            {}", dir.display());
    match &report.chain {
        Some(ChainOutcome::Verified {
            head_hash,
            event_count,
        }) => println!("audit chain:       {} events, head {}", event_count, head_hash),
        Some(ChainOutcome::Empty) => println!("audit chain:       empty"),
        None => println!("audit chain:       not verified"),
    }
    if let Some(digest) = &report.audit_events_sha256 {
        println!("audit log sha256:  {}", digest);
    }
    println!("documents checked: {}", report.documents_checked);
    println!();

    if report.accepted() {
        println!("ACCEPTED");
        return;
    }
    println!("REJECTED ({} failures)", report.rejections.len());
    for rejection in &report.rejections {
        println!("  - {}", rejection);
    }
}
