//! bulk-revoke: find and revoke every delegation on a wallet's tokens.
//!
//! Usage:
//!   bulk-revoke scan --owner 0x...
//!   PRIVATE_KEY=... bulk-revoke revoke

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use alloy::primitives::Address;
use bulk_revoke_core::{BatchBoard, TokenId};
use bulk_revoke_delegation::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CHECKPOINT, DEFAULT_PAGE_SIZE, DEFAULT_RPC_URL,
};
use bulk_revoke_delegation::{
    checkpoint, scan, unix_now, Contracts, Error, Result, Revoker, RpcClient, ScanReport,
    Settings,
};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "bulk-revoke")]
#[command(version)]
#[command(about = "Revoke every delegation granted on a wallet's tokens", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    sweep: SweepArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Find delegated tokens and write them to the checkpoint file
    Scan {
        /// Wallet to inspect (defaults to the signer's address)
        #[arg(long)]
        owner: Option<Address>,
    },

    /// Scan, confirm, then revoke in batches
    Revoke {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Revoke the ids already in the checkpoint file without rescanning
        #[arg(long)]
        from_checkpoint: bool,
    },
}

#[derive(Args)]
struct SweepArgs {
    /// JSON-RPC endpoint
    #[arg(long, global = true, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Hex private key of the token owner
    #[arg(long, global = true, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// ERC-721 collection address
    #[arg(long, global = true)]
    collection: Option<Address>,

    /// Delegation registry address
    #[arg(long, global = true)]
    registry: Option<Address>,

    /// Multicall3 address
    #[arg(long, global = true)]
    multicall: Option<Address>,

    /// Entries per aggregated read
    #[arg(long, global = true, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Token ids per revoke transaction
    #[arg(long, global = true, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Checkpoint file
    #[arg(long, global = true, default_value = DEFAULT_CHECKPOINT)]
    checkpoint: PathBuf,

    /// Seconds to wait for each receipt
    #[arg(long, global = true, default_value_t = 180)]
    receipt_timeout_secs: u64,

    /// Abort the ownership scan on any unreadable index
    #[arg(long, global = true)]
    strict_ownership: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

impl SweepArgs {
    fn settings(&self) -> Result<Settings> {
        let defaults = Contracts::default();
        let settings = Settings {
            contracts: Contracts {
                collection: self.collection.unwrap_or(defaults.collection),
                multicall: self.multicall.unwrap_or(defaults.multicall),
                registry: self.registry.unwrap_or(defaults.registry),
            },
            page_size: self.page_size,
            batch_size: self.batch_size,
            checkpoint: self.checkpoint.clone(),
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
            strict_ownership: self.strict_ownership,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn client(&self, settings: &Settings) -> Result<RpcClient> {
        let client =
            RpcClient::new(self.rpc_url.clone()).with_receipt_timeout(settings.receipt_timeout);
        match &self.private_key {
            Some(key) => client.with_signer(key),
            None => Ok(client),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.sweep.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = cli.sweep.settings()?;
    let client = cli.sweep.client(&settings)?;

    match cli.command {
        Commands::Scan { owner } => {
            let owner = owner
                .or_else(|| client.signer_address())
                .ok_or_else(|| Error::Config("pass --owner or a private key".into()))?;
            scan_and_checkpoint(&client, &settings, owner).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Revoke {
            yes,
            from_checkpoint,
        } => revoke(&client, &settings, RevokeFlow::new(yes, from_checkpoint)).await,
    }
}

/// How a `revoke` run sources its token ids and whether it asks first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RevokeFlow {
    /// Scan the wallet and rewrite the checkpoint before revoking.
    rescan: bool,
    /// Gate submission behind the proceed prompt.
    ask: bool,
}

impl RevokeFlow {
    fn new(yes: bool, from_checkpoint: bool) -> Self {
        Self {
            rescan: !from_checkpoint,
            ask: !yes,
        }
    }
}

async fn scan_and_checkpoint(
    client: &RpcClient,
    settings: &Settings,
    owner: Address,
) -> Result<ScanReport> {
    info!(%owner, "scanning wallet");
    let report = scan(client, settings, owner, unix_now()).await?;
    let delegated = report.delegated();
    checkpoint::write(&settings.checkpoint, &delegated)?;

    info!(
        owned = report.owned.token_ids.len(),
        balance = report.owned.balance,
        skipped = report.owned.skipped(),
        active = report.classification.active.len(),
        expired = report.classification.expired.len(),
        none = report.classification.none,
        unreadable = report.classification.failed + report.classification.malformed,
        "scan complete"
    );
    info!(
        tokens = delegated.len(),
        path = %settings.checkpoint.display(),
        "checkpoint written"
    );
    Ok(report)
}

async fn revoke(client: &RpcClient, settings: &Settings, flow: RevokeFlow) -> Result<ExitCode> {
    let owner = client
        .signer_address()
        .ok_or_else(|| Error::Config("revoking needs --private-key or PRIVATE_KEY".into()))?;

    let candidates: Vec<TokenId> = if flow.rescan {
        scan_and_checkpoint(client, settings, owner).await?.delegated()
    } else {
        checkpoint::read(&settings.checkpoint)?
    };
    if candidates.is_empty() {
        info!("no delegated tokens, nothing to revoke");
        return Ok(ExitCode::SUCCESS);
    }

    info!(
        tokens = candidates.len(),
        path = %settings.checkpoint.display(),
        "ready to revoke"
    );
    if flow.ask && !confirm("Proceed with revocation? (Y/n)", true).await? {
        info!("aborted, checkpoint left in place");
        return Ok(ExitCode::SUCCESS);
    }
    // The operator may have trimmed the file while the prompt was open.
    let token_ids = checkpoint::resolve(&settings.checkpoint, candidates)?;
    if token_ids.is_empty() {
        info!("checkpoint is empty, nothing to revoke");
        return Ok(ExitCode::SUCCESS);
    }

    let board = BatchBoard::new(&token_ids, settings.batch_size)?;
    info!(
        tokens = token_ids.len(),
        batches = board.len(),
        batch_size = settings.batch_size,
        "revocation planned"
    );

    let mut rx = board.subscribe();
    let progress = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let batches = rx.borrow_and_update().clone();
            let done = batches.iter().filter(|b| !b.is_submittable()).count();
            debug!(done, of = batches.len(), "board updated");
        }
    });

    let revoker = Revoker::new(client, client, settings.contracts.registry);
    let mut report = revoker.run_sequential(&board).await;
    while !report.failed.is_empty() {
        for n in &report.failed {
            if let Some(batch) = board.batch(*n) {
                warn!(
                    batch = n,
                    error = batch.error.as_deref().unwrap_or("unknown"),
                    "batch failed"
                );
            }
        }
        let question = format!("Retry {} failed batch(es)? (y/N)", report.failed.len());
        if !confirm(&question, false).await? {
            break;
        }
        report = revoker.run_sequential(&board).await;
    }
    progress.abort();

    let summary = board.summary();
    info!(
        confirmed = summary.confirmed,
        failed = summary.failed,
        total = summary.total(),
        "revocation finished"
    );
    if summary.failed > 0 {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Ask a yes/no question on stdin. An empty answer takes `default`.
///
/// The read runs on the blocking pool so the runtime's workers stay free.
async fn confirm(question: &str, default: bool) -> Result<bool> {
    let question = question.to_string();
    let answer = tokio::task::spawn_blocking(move || read_answer(&question))
        .await
        .map_err(|e| Error::Prompt(io::Error::other(e)))??;
    Ok(parse_answer(&answer, default))
}

fn read_answer(question: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{question} ").map_err(Error::Prompt)?;
    stdout.flush().map_err(Error::Prompt)?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(Error::Prompt)?;
    Ok(answer)
}

fn parse_answer(answer: &str, default: bool) -> bool {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        "n" | "no" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proceed_prompt_only_stops_on_no() {
        assert!(parse_answer("\n", true));
        assert!(parse_answer("Y\n", true));
        assert!(parse_answer("whatever", true));
        assert!(!parse_answer("n\n", true));
        assert!(!parse_answer(" No ", true));
    }

    #[test]
    fn retry_prompt_needs_a_yes() {
        assert!(!parse_answer("\n", false));
        assert!(!parse_answer("maybe", false));
        assert!(parse_answer("y", false));
        assert!(parse_answer("YES\n", false));
    }

    #[test]
    fn flags_build_settings() {
        let cli = Cli::parse_from([
            "bulk-revoke",
            "scan",
            "--owner",
            "0x00000000000000000000000000000000000000aa",
            "--batch-size",
            "250",
            "--registry",
            "0x00000000000000000000000000000000000000bb",
        ]);
        let settings = cli.sweep.settings().unwrap();
        assert_eq!(settings.batch_size, 250);
        assert_eq!(settings.contracts.registry, Address::with_last_byte(0xbb));
        assert_eq!(settings.contracts.collection, Contracts::default().collection);
        assert!(matches!(cli.command, Commands::Scan { owner: Some(_) }));
    }

    fn revoke_flow(args: &[&str]) -> RevokeFlow {
        let cli = Cli::parse_from(args.iter().copied());
        match cli.command {
            Commands::Revoke {
                yes,
                from_checkpoint,
            } => RevokeFlow::new(yes, from_checkpoint),
            Commands::Scan { .. } => panic!("expected the revoke command"),
        }
    }

    #[test]
    fn checkpoint_revoke_still_asks_first() {
        let flow = revoke_flow(&["bulk-revoke", "revoke", "--from-checkpoint"]);
        assert_eq!(
            flow,
            RevokeFlow {
                rescan: false,
                ask: true
            }
        );
    }

    #[test]
    fn only_yes_skips_the_prompt() {
        assert!(revoke_flow(&["bulk-revoke", "revoke"]).ask);
        assert!(revoke_flow(&["bulk-revoke", "revoke"]).rescan);
        assert!(!revoke_flow(&["bulk-revoke", "revoke", "--yes"]).ask);
        assert!(!revoke_flow(&["bulk-revoke", "revoke", "--from-checkpoint", "-y"]).ask);
    }

    #[test]
    fn oversized_batches_are_rejected() {
        let cli = Cli::parse_from(["bulk-revoke", "revoke", "--batch-size", "1001"]);
        assert!(matches!(cli.sweep.settings(), Err(Error::Config(_))));
    }
}
