// steptrace: step-through tracer and complexity estimator for small scripts

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "steptrace", about = "Trace script execution for a step-through visualizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Trace a script file and print the result as JSON
    Trace {
        /// Script to trace
        file: PathBuf,
    },
    /// Serve the trace API over TCP (newline-delimited JSON)
    Serve {
        /// Port to listen on
        #[arg(long, default_value_t = 7878)]
        port: u16,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Trace { file } => {
            let source = fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            match steptrace::trace(&source) {
                Ok(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                    Ok(())
                }
                Err(e) => {
                    // The wire-contract error object, then a nonzero exit
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&serde_json::json!({ "error": e.to_string() }))?
                    );
                    std::process::exit(1);
                }
            }
        }
        Command::Serve { port } => steptrace::api::server::start_server(port),
    }
}
