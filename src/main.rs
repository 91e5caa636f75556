use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use msg_receipt::{
    HttpTelemetry, KeyResolver, KeySource, NoPayment, NoTelemetry, PaymentCollaborator, Receipt,
    ReceiptIssuer, RpcPayment, Settings, TelemetryCollaborator, parse_address, verify,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// How long a finished `sign` waits for telemetry before exiting.
const TELEMETRY_GRACE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "receipt")]
#[command(about = "Sign receipts. Verify receipts. No middleman.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./receipt.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a message, optionally pay the fee, and write a receipt
    Sign(SignArgs),
    /// Verify a receipt signature
    Verify {
        /// Receipt file
        file: PathBuf,
    },
    /// Print the address of the resolved key
    Address(KeyArgs),
}

#[derive(Args)]
struct KeyArgs {
    /// Private key (hex), otherwise read from the configured env variable
    #[arg(short, long)]
    key: Option<String>,

    /// File containing the private key
    #[arg(long)]
    key_file: Option<PathBuf>,

    /// Read the private key from standard input
    #[arg(long)]
    key_stdin: bool,
}

impl KeyArgs {
    fn resolver(&self, settings: &Settings) -> KeyResolver {
        KeyResolver::new()
            .then_some(self.key.clone().map(KeySource::Literal))
            .then_some(self.key_file.clone().map(KeySource::File))
            .then_some(self.key_stdin.then_some(KeySource::Stdin))
            .then(KeySource::EnvVar(settings.key_env.clone()))
    }
}

#[derive(Args)]
struct SignArgs {
    /// Message to sign
    message: String,

    #[command(flatten)]
    key: KeyArgs,

    /// Output file
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Replace the output file if it already exists
    #[arg(long)]
    force: bool,

    /// JSON-RPC endpoint for the payment
    #[arg(long)]
    rpc: Option<String>,

    /// Skip payment (testnet mode)
    #[arg(long)]
    no_pay: bool,

    /// Report signer and timestamp to the configured telemetry endpoint
    #[arg(long)]
    telemetry: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "msg_receipt=info,receipt=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    debug!(?settings, "configuration loaded");

    match cli.command {
        Commands::Sign(args) => handle_sign(args, &settings),
        Commands::Verify { file } => handle_verify(&file),
        Commands::Address(args) => {
            let identity = args.resolver(&settings).resolve().context("resolving key")?;
            println!("{}", identity.address());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn handle_sign(args: SignArgs, settings: &Settings) -> Result<ExitCode> {
    let identity = args
        .key
        .resolver(settings)
        .resolve()
        .with_context(|| {
            format!(
                "No usable key. Use --key, --key-file, --key-stdin or set {}",
                settings.key_env
            )
        })?;

    let treasury = parse_address(&settings.treasury).context("parsing treasury address")?;
    let out = args.out.unwrap_or_else(|| PathBuf::from(&settings.output));

    let payment: Box<dyn PaymentCollaborator> = if args.no_pay {
        Box::new(NoPayment)
    } else {
        let rpc_url = args.rpc.unwrap_or_else(|| settings.rpc_url.clone());
        Box::new(RpcPayment::new(rpc_url, settings.timeout()))
    };

    let telemetry: Box<dyn TelemetryCollaborator> = match (&settings.telemetry_url, args.telemetry)
    {
        (Some(url), true) => Box::new(HttpTelemetry::new(url.clone(), settings.timeout())),
        _ => Box::new(NoTelemetry),
    };

    if !args.no_pay {
        println!("Paying {} wei to {}...", settings.fee_wei, treasury);
    }

    let receipt = ReceiptIssuer::new(treasury, u128::from(settings.fee_wei))
        .with_payment(payment.as_ref())
        .with_telemetry(telemetry.as_ref())
        .issue_to(&identity, &args.message, None, &out, args.force)
        .context("issuing receipt")?;

    if let Some(tx_hash) = &receipt.payment {
        println!("Paid: {}", tx_hash);
    }
    println!("Receipt saved: {}", out.display());

    telemetry.flush(TELEMETRY_GRACE);
    Ok(ExitCode::SUCCESS)
}

fn handle_verify(file: &Path) -> Result<ExitCode> {
    let receipt = Receipt::read_from(file).context("reading receipt")?;
    let result = verify(&receipt).context("verifying receipt")?;

    if result.valid {
        println!("✓ VALID");
        println!("  Signer: {}", receipt.signer);
        println!("  Message: {}", receipt.message);
        println!("  Time: {}", receipt.timestamp);
        if let Some(payment) = &receipt.payment {
            println!("  Payment: {}", payment);
        }
        Ok(ExitCode::SUCCESS)
    } else {
        println!("✗ INVALID - signature mismatch");
        println!("  Claimed: {}", receipt.signer);
        println!("  Recovered: {}", result.recovered_signer);
        Ok(ExitCode::FAILURE)
    }
}
