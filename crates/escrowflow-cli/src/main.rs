//! # escrowflow CLI entry point
//!
//! `run` drives a complete escrow flow against a fresh in-process ledger with
//! two generated parties. `derive` prints escrow and custody addresses
//! without touching any ledger.

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use escrowflow_address::EscrowDeriver;
use escrowflow_ledger::LocalLedger;
use escrowflow_orchestrator::{EscrowOrchestrator, EscrowRequest, TracingObserver};
use escrowflow_types::{
    Address, EscrowFlowError, EscrowId, FlowConfig, Keypair, SettlementReceipt, Wallet, constants,
    program::DEFAULT_SETTLEMENT_PROGRAM_ID,
};
use tracing_subscriber::EnvFilter;

/// Lamports credited to each generated party before a local run.
const PARTY_AIRDROP_LAMPORTS: u64 = 10_000_000_000;

/// Exit code when a failure left funds in escrow custody.
const EXIT_FUNDS_STRANDED: u8 = 2;

/// Two-party token-swap escrow orchestration.
#[derive(Parser, Debug)]
#[command(name = "escrowflow", version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a full escrow flow against a fresh local ledger.
    Run(RunArgs),
    /// Print the escrow address and its custody accounts.
    Derive(DeriveArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Raw units of the maker asset the maker deposits.
    #[arg(long, default_value_t = 100)]
    maker_amount: u64,

    /// Raw units of the taker asset the taker deposits.
    #[arg(long, default_value_t = 100)]
    taker_amount: u64,

    /// Escrow id; generated when omitted.
    #[arg(long)]
    escrow_id: Option<u64>,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full receipt as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct DeriveArgs {
    /// Maker address (hex).
    #[arg(long)]
    maker: Address,

    /// Maker asset class (hex).
    #[arg(long)]
    maker_asset: Address,

    /// Taker asset class (hex); adds the taker custody account to the output.
    #[arg(long)]
    taker_asset: Option<Address>,

    #[arg(long)]
    escrow_id: u64,

    /// Settlement program identity (hex).
    #[arg(long)]
    program: Option<Address>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);
    tracing::debug!(version = constants::VERSION, "{} starting", constants::ENGINE_NAME);

    let result = match cli.command {
        Commands::Run(args) => run(&args).await,
        Commands::Derive(args) => derive(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let stranded = e
                .downcast_ref::<EscrowFlowError>()
                .is_some_and(EscrowFlowError::requires_operator_intervention);
            if stranded {
                ExitCode::from(EXIT_FUNDS_STRANDED)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn init_tracing(verbose: u8, json: bool) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(args: &RunArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => FlowConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => FlowConfig::default(),
    };

    let ledger = Arc::new(LocalLedger::with_settlement_program(
        config.settlement_program,
    ));
    let maker = Keypair::generate();
    let taker = Keypair::generate();
    ledger.airdrop(maker.address(), PARTY_AIRDROP_LAMPORTS);
    ledger.airdrop(taker.address(), PARTY_AIRDROP_LAMPORTS);

    let orchestrator = EscrowOrchestrator::new(Arc::clone(&ledger), config)?
        .with_observer(Arc::new(TracingObserver));
    let mut request = EscrowRequest::new(args.maker_amount, args.taker_amount);
    if let Some(id) = args.escrow_id {
        request = request.with_escrow_id(EscrowId(id));
    }

    let receipt = orchestrator
        .run_escrow_flow(
            &Wallet::connected(maker),
            &Wallet::connected(taker),
            &request,
        )
        .await?;
    ledger
        .check_supply_conservation()
        .context("supply check after settlement")?;

    if args.json {
        println!("{}", receipt.to_json_pretty()?);
    } else {
        print_summary(&receipt);
    }
    Ok(())
}

fn print_summary(receipt: &SettlementReceipt) {
    println!("escrow {} settled ({})", receipt.escrow_id, receipt.escrow);
    for step in &receipt.signatures {
        println!("  {:<14} {}", step.step, step.signature.short());
    }
    match &receipt.balances {
        Some(b) => {
            let (taker_asset, maker_asset) =
                (receipt.taker_asset.short(), receipt.maker_asset.short());
            println!("  maker receives {} of {taker_asset}", b.maker_taker_asset);
            println!("  taker receives {} of {maker_asset}", b.taker_maker_asset);
            println!("  custody drained: {}", b.custody_drained());
        }
        None => println!("  final balances unavailable"),
    }
    println!("  took {} ms", receipt.duration_ms());
}

fn derive(args: &DeriveArgs) -> Result<()> {
    let deriver = EscrowDeriver::new(args.program.unwrap_or(DEFAULT_SETTLEMENT_PROGRAM_ID));
    let escrow_id = EscrowId(args.escrow_id);
    let (escrow, bump) = deriver.derive_escrow(&args.maker, &args.maker_asset, escrow_id)?;
    let maker_custody = deriver.derive_custody_account(&escrow, &args.maker_asset, true)?;
    let taker_custody = args
        .taker_asset
        .map(|asset| deriver.derive_custody_account(&escrow, &asset, true))
        .transpose()?;

    let out = serde_json::json!({
        "program": deriver.program_id(),
        "escrow_id": escrow_id,
        "escrow": escrow,
        "bump": bump,
        "escrow_maker_custody": maker_custody,
        "escrow_taker_custody": taker_custody,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::try_parse_from(["escrowflow", "run"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.maker_amount, 100);
        assert_eq!(args.taker_amount, 100);
        assert!(args.escrow_id.is_none());
        assert!(!args.json);
    }

    #[test]
    fn parse_run_overrides_and_verbosity() {
        let cli = Cli::try_parse_from([
            "escrowflow",
            "-vv",
            "run",
            "--maker-amount",
            "5",
            "--taker-amount",
            "7",
            "--escrow-id",
            "12345",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.maker_amount, 5);
        assert_eq!(args.taker_amount, 7);
        assert_eq!(args.escrow_id, Some(12345));
        assert!(args.json);
    }

    #[test]
    fn parse_derive_hex_addresses() {
        let maker = "11".repeat(32);
        let asset = "22".repeat(32);
        let cli = Cli::try_parse_from([
            "escrowflow",
            "derive",
            "--maker",
            maker.as_str(),
            "--maker-asset",
            asset.as_str(),
            "--escrow-id",
            "1",
        ])
        .unwrap();
        let Commands::Derive(args) = cli.command else {
            panic!("expected derive");
        };
        assert_eq!(args.maker, Address::new([0x11; 32]));
        assert_eq!(args.maker_asset, Address::new([0x22; 32]));
        assert!(args.program.is_none());
        assert!(derive(&args).is_ok());
    }

    #[test]
    fn bad_hex_rejected() {
        let result = Cli::try_parse_from([
            "escrowflow",
            "derive",
            "--maker",
            "zz",
            "--maker-asset",
            "00",
            "--escrow-id",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn local_run_settles() {
        let args = RunArgs {
            maker_amount: 10,
            taker_amount: 20,
            escrow_id: Some(7),
            config: None,
            json: true,
        };
        run(&args).await.unwrap();
    }
}
