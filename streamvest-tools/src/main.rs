use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use streamvest_core::{format_btc, vested_amount, DecodedTx, OutPoint, ScriptBytes};
use streamvest_flow::{
    run_claim, run_create, ClaimAmount, ClaimParams, Collaborators, CreateParams, FlowOutcome,
    SystemClock, TimeSource, TxDecoder, UtxoInfo, UtxoLookup,
};
use streamvest_ledger::{ReservationLedger, StreamHead};
use streamvest_prover::{Broadcaster, HttpBroadcaster, HttpProver};

const DEFAULT_HEAD_PATH: &str = "state/stream-head.env";
const DEFAULT_LEDGER_PATH: &str = "state/used-outpoints.txt";
const DEFAULT_PROVER_URL: &str = "http://localhost:17784/prove";
const DEFAULT_BROADCAST_URL: &str = "http://localhost:3000/tx";

#[derive(Parser)]
#[command(
    name = "streamvest",
    about = "Create and claim time-vested Bitcoin payment streams"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new stream from a funding outpoint.
    Create(CreateArgs),
    /// Claim vested funds from the current stream head.
    Claim(ClaimArgs),
    /// Print the persisted stream head.
    Status(StoreArgs),
    /// Print vested and claimable amounts.
    Vested(VestedArgs),
}

#[derive(Args)]
struct StoreArgs {
    /// Stream-head snapshot file.
    #[arg(long, default_value = DEFAULT_HEAD_PATH)]
    head: PathBuf,
    /// Reservation ledger of outpoints already submitted to the prover.
    #[arg(long, default_value = DEFAULT_LEDGER_PATH)]
    ledger: PathBuf,
}

#[derive(Args)]
struct ServiceArgs {
    /// Prover endpoint.
    #[arg(long, default_value = DEFAULT_PROVER_URL)]
    prover_url: String,
    /// Broadcast endpoint (esplora-style POST of raw tx hex).
    #[arg(long, default_value = DEFAULT_BROADCAST_URL)]
    broadcast_url: String,
    /// Verify the constructed transaction but print it instead of
    /// broadcasting. The designated outpoints are still recorded as used.
    #[arg(long)]
    no_broadcast: bool,
    /// Fee rate in sats/vB for the prover to target.
    #[arg(long, default_value_t = 2)]
    fee_rate: u64,
}

#[derive(Args)]
struct CreateArgs {
    #[command(flatten)]
    store: StoreArgs,
    #[command(flatten)]
    service: ServiceArgs,
    /// Total stream amount in satoshis.
    #[arg(long)]
    total_sats: u64,
    /// Vesting start, Unix seconds.
    #[arg(long)]
    start_time: u64,
    /// Vesting end, Unix seconds.
    #[arg(long)]
    end_time: u64,
    /// Beneficiary locking script, hex.
    #[arg(long)]
    beneficiary_script: String,
    /// Funding outpoint, `<txid-hex>:<vout>`.
    #[arg(long)]
    funding_outpoint: String,
    /// Value of the funding outpoint in satoshis, as verified by the
    /// operator's wallet or explorer.
    #[arg(long)]
    funding_value: u64,
}

#[derive(Args)]
struct ClaimArgs {
    #[command(flatten)]
    store: StoreArgs,
    #[command(flatten)]
    service: ServiceArgs,
    /// Satoshis to claim on top of what is already claimed.
    #[arg(long, conflicts_with = "all_vested")]
    claim_sats: Option<u64>,
    /// Claim everything vested but not yet claimed.
    #[arg(long)]
    all_vested: bool,
    /// Optional extra outpoint to fund fees, `<txid-hex>:<vout>`.
    #[arg(long, requires = "funding_value")]
    funding_outpoint: Option<String>,
    /// Value of the fee-funding outpoint in satoshis.
    #[arg(long)]
    funding_value: Option<u64>,
}

#[derive(Args)]
struct VestedArgs {
    #[command(flatten)]
    store: StoreArgs,
    /// Evaluate vesting at this timestamp instead of now.
    #[arg(long)]
    at: Option<u64>,
}

/// UTXO facts supplied by the operator on the command line. Real chain
/// lookup is wallet/node territory, outside this tool.
struct StaticUtxoLookup(Vec<(OutPoint, UtxoInfo)>);

impl UtxoLookup for StaticUtxoLookup {
    fn lookup(&self, outpoint: &OutPoint) -> anyhow::Result<Option<UtxoInfo>> {
        Ok(self
            .0
            .iter()
            .find(|(op, _)| op == outpoint)
            .map(|(_, info)| *info))
    }
}

/// This tool carries no consensus deserializer; the prover is expected to
/// echo the decoded transaction alongside the raw bytes.
struct NoLocalDecoder;

impl TxDecoder for NoLocalDecoder {
    fn decode(&self, _raw_tx: &[u8]) -> anyhow::Result<DecodedTx> {
        bail!("prover response carried no decoded transaction; cannot shape-verify locally")
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streamvest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Create(args) => cmd_create(args),
        Commands::Claim(args) => cmd_claim(args),
        Commands::Status(args) => cmd_status(args),
        Commands::Vested(args) => cmd_vested(args),
    }
}

fn cmd_create(args: CreateArgs) -> Result<()> {
    if args.store.head.exists() {
        bail!(
            "refusing to overwrite existing stream head at {}; move it aside to create a new stream",
            args.store.head.display()
        );
    }

    let funding: OutPoint = args
        .funding_outpoint
        .parse()
        .context("invalid --funding-outpoint")?;
    let beneficiary_script = ScriptBytes::from_hex(&args.beneficiary_script)
        .context("invalid --beneficiary-script hex")?;

    let lookup = StaticUtxoLookup(vec![(
        funding,
        UtxoInfo {
            value: args.funding_value,
            confirmations: 1,
        },
    )]);
    let mut ledger = open_ledger(&args.store.ledger)?;
    let prover = HttpProver::new(&args.service.prover_url)?;
    let broadcaster = service_broadcaster(&args.service)?;

    let params = CreateParams {
        total_amount: args.total_sats,
        start_time: args.start_time,
        end_time: args.end_time,
        beneficiary_script,
        funding_outpoint: funding,
        fee_rate: args.service.fee_rate,
    };
    let collab = Collaborators {
        prover: &prover,
        utxos: &lookup,
        clock: &SystemClock,
        decoder: &NoLocalDecoder,
        broadcaster: broadcaster.as_ref().map(|b| b as &dyn Broadcaster),
    };

    let outcome = run_create(&collab, &mut ledger, &params)?;
    report(&outcome, &args.store.head)
}

fn cmd_claim(args: ClaimArgs) -> Result<()> {
    let head = StreamHead::load(&args.store.head)
        .with_context(|| format!("no stream head at {}", args.store.head.display()))?;

    let amount = match (args.claim_sats, args.all_vested) {
        (Some(0), _) => bail!("--claim-sats must be positive"),
        (Some(sats), false) => ClaimAmount::Sats(sats),
        (None, true) => ClaimAmount::AllVested,
        (None, false) => bail!("pass --claim-sats <sats> or --all-vested"),
        (Some(_), true) => unreachable!("clap conflicts_with"),
    };

    let funding = args
        .funding_outpoint
        .as_deref()
        .map(str::parse::<OutPoint>)
        .transpose()
        .context("invalid --funding-outpoint")?;

    // The head outpoint is expected to hold exactly the unclaimed
    // remainder; the flow re-checks that against this entry.
    let mut utxos = vec![(
        head.outpoint,
        UtxoInfo {
            value: head.state.total_amount - head.state.claimed_amount,
            confirmations: 1,
        },
    )];
    if let (Some(op), Some(value)) = (funding, args.funding_value) {
        utxos.push((
            op,
            UtxoInfo {
                value,
                confirmations: 1,
            },
        ));
    }
    let lookup = StaticUtxoLookup(utxos);

    let mut ledger = open_ledger(&args.store.ledger)?;
    let prover = HttpProver::new(&args.service.prover_url)?;
    let broadcaster = service_broadcaster(&args.service)?;

    let params = ClaimParams {
        amount,
        funding_outpoint: funding,
        fee_rate: args.service.fee_rate,
    };
    let collab = Collaborators {
        prover: &prover,
        utxos: &lookup,
        clock: &SystemClock,
        decoder: &NoLocalDecoder,
        broadcaster: broadcaster.as_ref().map(|b| b as &dyn Broadcaster),
    };

    let outcome = run_claim(&collab, &mut ledger, &head, &params)?;
    report(&outcome, &args.store.head)
}

fn cmd_status(args: StoreArgs) -> Result<()> {
    let head = StreamHead::load(&args.head)
        .with_context(|| format!("no stream head at {}", args.head.display()))?;
    let s = &head.state;
    println!("stream id:       {}", s.stream_id);
    println!("current outpoint: {}", head.outpoint);
    println!("schedule:        {} .. {}", s.start_time, s.end_time);
    println!(
        "total:           {} sats ({} BTC)",
        s.total_amount,
        format_btc(s.total_amount)
    );
    println!(
        "claimed:         {} sats ({} BTC)",
        s.claimed_amount,
        format_btc(s.claimed_amount)
    );
    println!(
        "remaining:       {} sats ({} BTC)",
        s.total_amount - s.claimed_amount,
        format_btc(s.total_amount - s.claimed_amount)
    );
    Ok(())
}

fn cmd_vested(args: VestedArgs) -> Result<()> {
    let head = StreamHead::load(&args.store.head)
        .with_context(|| format!("no stream head at {}", args.store.head.display()))?;
    let s = &head.state;
    let now = args.at.unwrap_or_else(|| SystemClock.now());
    let vested = vested_amount(s.total_amount, s.start_time, s.end_time, now);
    let claimable = vested.saturating_sub(s.claimed_amount);
    println!("at time:    {now}");
    println!("vested:     {} sats ({} BTC)", vested, format_btc(vested));
    println!(
        "claimable:  {} sats ({} BTC)",
        claimable,
        format_btc(claimable)
    );
    Ok(())
}

fn open_ledger(path: &Path) -> Result<ReservationLedger> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    ReservationLedger::open(path)
        .with_context(|| format!("cannot open reservation ledger {}", path.display()))
}

fn service_broadcaster(service: &ServiceArgs) -> Result<Option<HttpBroadcaster>> {
    if service.no_broadcast {
        Ok(None)
    } else {
        Ok(Some(HttpBroadcaster::new(&service.broadcast_url)?))
    }
}

fn report(outcome: &FlowOutcome, head_path: &Path) -> Result<()> {
    println!(
        "claimed delta:  {} sats, remaining {} sats",
        outcome.accepted.claimed_delta, outcome.accepted.remaining_amount
    );
    match (&outcome.head, outcome.txid) {
        (Some(head), Some(txid)) => {
            if let Some(parent) = head_path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            head.save(head_path)?;
            println!("broadcast txid: {txid}");
            println!("new head:       {}", head.outpoint);
            println!("head saved to   {}", head_path.display());
        }
        _ => {
            println!("not broadcast; raw transaction:");
            println!("{}", hex::encode(&outcome.raw_tx));
            println!("note: the designated outpoints are now recorded as used");
        }
    }
    Ok(())
}
