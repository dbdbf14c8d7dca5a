use anyhow::Result;
use clap::{Parser, Subcommand};

use accelerant::{selftest, AccelBuilder};

#[derive(Parser)]
#[command(
    name = "accelerant",
    about = "Accelerator-engine dispatch framework diagnostics",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the bound engine, its capabilities, and the task context size
    Info,

    /// Run every dispatch operation against the bound engine and verify it
    SelfTest {
        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Emit the aggregated module configuration
    Config {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,

        /// Human-readable text dump instead of JSON
        #[arg(long, conflicts_with = "pretty")]
        text: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // No hardware modules plug into the CLI build; the framework binds the
    // software engine and the subcommands inspect that configuration.
    let accel = AccelBuilder::new().initialize();
    let mut failed_checks = false;

    match cli.command {
        Commands::Info => {
            let chan = accel.io_channel();
            println!("Engine:       {}", chan.engine_name());
            println!(
                "Capabilities: {}",
                chan.capabilities()
                    .iter_names()
                    .map(|(n, _)| n)
                    .collect::<Vec<_>>()
                    .join(" | ")
            );
            println!("Task size:    {} bytes", accel.task_size());
            match chan.batch_get_max() {
                Ok(max) => println!("Batch max:    {max}"),
                Err(_) => println!("Batch max:    unsupported"),
            }
        }
        Commands::SelfTest { json } => {
            tracing::info!("Running accel self-test");
            let report = selftest::run(&accel);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("\nAccelerant Dispatch Self-Test");
                println!("Engine: {} (task size {} bytes)", report.engine, report.task_size);
                println!("{:<20} | {:<8} | Details", "Check", "Status");
                println!("{:-<20}-|-{:-<8}-|-{:-<40}", "", "", "");
                for res in &report.results {
                    let status_str = match res.status {
                        selftest::CheckStatus::Pass => "PASS",
                        selftest::CheckStatus::Fail => "FAIL",
                        selftest::CheckStatus::Skipped => "SKIP",
                    };
                    println!("{:<20} | {:<8} | {}", res.check, status_str, res.details);
                }
                println!();
            }
            failed_checks = !report.all_passed();
        }
        Commands::Config { pretty, text } => {
            if text {
                let mut out = String::new();
                accel
                    .config_text(&mut out)
                    .map_err(|e| anyhow::anyhow!("config text emission failed: {e}"))?;
                print!("{out}");
            } else {
                let mut out = Vec::new();
                accel.write_config_json(&mut out)?;
                if pretty {
                    let parsed: serde_json::Value = serde_json::from_slice(&out)?;
                    println!("{}", serde_json::to_string_pretty(&parsed)?);
                } else {
                    println!("{}", String::from_utf8(out)?);
                }
            }
        }
    }

    accel.finish().await;

    if failed_checks {
        anyhow::bail!("self-test reported failures");
    }
    Ok(())
}
