//! veledger-cli: drive the escrow ledger from the command line.
//!
//! `simulate` replays a JSON scenario against an in-memory chain and custody,
//! printing a JSON line for every `report` step. `params` prints the
//! effective configuration.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use veledger_core::constants::TOKEN;
use veledger_core::error::LedgerError;
use veledger_core::traits::BlockOracle;
use veledger_core::types::{AccountId, Timestamp};
use veledger_node::{default_config_path, EscrowService, MemoryCustody, NodeConfig, SimulatedChain};

#[derive(Parser, Debug)]
#[command(name = "veledger-cli", version, about = "Vote-escrow voting-power ledger")]
struct Cli {
    /// Configuration file (TOML). Defaults to the user config directory if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format ("text" or "json"); overrides the config file
    #[arg(long)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a scenario file and print reports
    Simulate {
        /// Path to the scenario JSON
        scenario: PathBuf,
    },
    /// Print the effective configuration as JSON
    Params,
}

// --- scenario format ---

/// A scripted run. Amounts are whole tokens.
#[derive(Deserialize, Debug)]
struct Scenario {
    genesis_time: Timestamp,
    #[serde(default = "default_block_time")]
    block_time: u64,
    #[serde(default)]
    funds: BTreeMap<String, u64>,
    steps: Vec<Step>,
}

fn default_block_time() -> u64 {
    12
}

#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Step {
    Advance { secs: u64 },
    CreateLock { account: String, amount: u64, end_offset: u64 },
    IncreaseAmount { account: String, amount: u64 },
    IncreaseUnlockTime { account: String, end_offset: u64 },
    Withdraw { account: String },
    EarlyWithdraw { account: String, amount: u64 },
    Report,
}

#[derive(Serialize, Debug)]
struct Report {
    time: String,
    timestamp: Timestamp,
    block: u64,
    balances: BTreeMap<String, u128>,
    total_supply: u128,
    total_locked: u128,
}

fn tokens(amount: u64) -> u128 {
    u128::from(amount) * TOKEN
}

/// Replay `scenario`, writing one JSON line per report to `out`.
///
/// Steps the ledger rejects are logged and skipped.
fn run_scenario(scenario: &Scenario, config: NodeConfig, out: &mut impl Write) -> Result<Vec<Report>> {
    let chain = Arc::new(SimulatedChain::new(scenario.genesis_time, scenario.block_time));
    let custody = Arc::new(MemoryCustody::new());
    let service = EscrowService::new(config, chain.clone(), custody.clone())
        .context("starting escrow service")?;

    let mut labels: BTreeMap<String, AccountId> = BTreeMap::new();
    for (label, amount) in &scenario.funds {
        let account = AccountId::from_label(label);
        custody.fund(&account, tokens(*amount));
        labels.insert(label.clone(), account);
    }

    let mut reports = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        let now = chain.now();
        let outcome: Result<(), LedgerError> = match step {
            Step::Advance { secs } => {
                chain.advance(*secs);
                Ok(())
            }
            Step::CreateLock { account, amount, end_offset } => service
                .create_lock(account_id(&mut labels, account), tokens(*amount), now.saturating_add(*end_offset))
                .map(drop),
            Step::IncreaseAmount { account, amount } => {
                service.increase_amount(account_id(&mut labels, account), tokens(*amount)).map(drop)
            }
            Step::IncreaseUnlockTime { account, end_offset } => service
                .increase_unlock_time(account_id(&mut labels, account), now.saturating_add(*end_offset))
                .map(drop),
            Step::Withdraw { account } => service.withdraw(account_id(&mut labels, account)).map(drop),
            Step::EarlyWithdraw { account, amount } => {
                service.early_withdraw(account_id(&mut labels, account), tokens(*amount)).map(drop)
            }
            Step::Report => {
                let report = build_report(&service, chain.as_ref(), &labels)?;
                writeln!(out, "{}", serde_json::to_string(&report)?)?;
                reports.push(report);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            warn!(step = index, "step rejected: {e}");
        }
    }
    Ok(reports)
}

/// Account for a scenario label, remembering it for reports.
fn account_id(labels: &mut BTreeMap<String, AccountId>, label: &str) -> AccountId {
    *labels.entry(label.to_string()).or_insert_with(|| AccountId::from_label(label))
}

/// RFC 3339 rendering of `timestamp`, empty when chrono cannot represent it.
fn rfc3339(timestamp: Timestamp) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}

fn build_report(
    service: &EscrowService,
    chain: &SimulatedChain,
    labels: &BTreeMap<String, AccountId>,
) -> Result<Report> {
    let timestamp = chain.now();
    let time = rfc3339(timestamp);

    let mut balances = BTreeMap::new();
    for (label, account) in labels {
        balances.insert(label.clone(), service.balance_of(account)?);
    }
    Ok(Report {
        time,
        timestamp,
        block: chain.current_block(),
        balances,
        total_supply: service.total_supply()?,
        total_locked: service.total_locked(),
    })
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn load_config(cli: &Cli) -> Result<NodeConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Some(default_config_path()).filter(|p| p.exists()),
    };
    let mut config = NodeConfig::load(path.as_deref()).context("loading configuration")?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log_level, &config.log_format);

    match &cli.command {
        Command::Simulate { scenario } => {
            let scenario = load_scenario(scenario)?;
            info!(steps = scenario.steps.len(), "replaying scenario");
            let stdout = std::io::stdout();
            let reports = run_scenario(&scenario, config, &mut stdout.lock())?;
            info!(reports = reports.len(), "scenario complete");
        }
        Command::Params => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text. Logs go to stderr so reports on stdout
/// stay machine-readable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veledger_core::constants::EPOCH;

    const GENESIS: Timestamp = 2_900 * EPOCH;

    fn scenario(json: &str) -> Scenario {
        serde_json::from_str(json).unwrap()
    }

    fn two_epoch_scenario() -> String {
        format!(
            r#"{{
                "genesis_time": {GENESIS},
                "funds": {{ "alice": 1000, "bob": 1000 }},
                "steps": [
                    {{ "op": "create_lock", "account": "alice", "amount": 1000, "end_offset": {two} }},
                    {{ "op": "create_lock", "account": "bob", "amount": 1000, "end_offset": {two} }},
                    {{ "op": "report" }},
                    {{ "op": "advance", "secs": {one} }},
                    {{ "op": "report" }},
                    {{ "op": "withdraw", "account": "alice" }},
                    {{ "op": "advance", "secs": {one} }},
                    {{ "op": "withdraw", "account": "alice" }},
                    {{ "op": "report" }}
                ]
            }}"#,
            two = 2 * EPOCH,
            one = EPOCH,
        )
    }

    #[test]
    fn parses_every_step_kind() {
        let s = scenario(
            r#"{
                "genesis_time": 0,
                "steps": [
                    { "op": "advance", "secs": 5 },
                    { "op": "create_lock", "account": "a", "amount": 1, "end_offset": 10 },
                    { "op": "increase_amount", "account": "a", "amount": 1 },
                    { "op": "increase_unlock_time", "account": "a", "end_offset": 20 },
                    { "op": "withdraw", "account": "a" },
                    { "op": "early_withdraw", "account": "a", "amount": 1 },
                    { "op": "report" }
                ]
            }"#,
        );
        assert_eq!(s.steps.len(), 7);
        assert_eq!(s.block_time, 12);
        assert!(s.funds.is_empty());
    }

    #[test]
    fn simulate_reports_decay_and_supply() {
        let s = scenario(&two_epoch_scenario());
        let mut out = Vec::new();
        let reports = run_scenario(&s, NodeConfig::default(), &mut out).unwrap();

        assert_eq!(reports.len(), 3);
        let start = &reports[0];
        assert_eq!(start.balances["alice"], start.balances["bob"]);
        assert_eq!(start.total_supply, start.balances["alice"] + start.balances["bob"]);
        assert_eq!(start.total_locked, 2_000 * TOKEN);

        let mid = &reports[1];
        assert!(mid.balances["alice"] < start.balances["alice"]);
        assert_eq!(mid.total_supply, mid.balances["alice"] + mid.balances["bob"]);

        // The early withdraw attempt is rejected; the one after expiry succeeds.
        let end = &reports[2];
        assert_eq!(end.total_supply, 0);
        assert_eq!(end.total_locked, 1_000 * TOKEN);

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().all(|l| l.contains("\"total_supply\"")));
    }

    #[test]
    fn report_time_is_rfc3339() {
        let s = scenario(r#"{ "genesis_time": 0, "steps": [ { "op": "report" } ] }"#);
        let reports = run_scenario(&s, NodeConfig::default(), &mut Vec::new()).unwrap();
        assert_eq!(reports[0].time, "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn load_scenario_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, two_epoch_scenario()).unwrap();
        let s = load_scenario(&path).unwrap();
        assert_eq!(s.genesis_time, GENESIS);
        assert!(load_scenario(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn report_time_is_empty_beyond_chrono_range() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00+00:00");
        assert_eq!(rfc3339(i64::MAX as u64 + 1), "");
        assert_eq!(rfc3339(u64::MAX), "");
    }
}
