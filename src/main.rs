//! netconfd, a declarative per-interface network configuration daemon.
//!
//! Given a YAML policy mapping interface names to either `dhcp: true` or a
//! static address block, the daemon brings every configured interface into
//! the desired layer-3 state and keeps reconciling it until shutdown.

mod cmd;
mod config;
mod engine;
mod logging;
mod resolver;
mod supervisor;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, about = "Declarative DHCP and static IPv4 configuration daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon against a configuration file
    Serve(ServeArgs),
    /// Show version and git info
    Version,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Path to config file (YAML)
    #[arg(short = 'f', long)]
    config: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            cmd::version::run();
            ExitCode::SUCCESS
        }
        Commands::Serve(args) => {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    eprintln!("failed to start runtime: {}", err);
                    return ExitCode::FAILURE;
                }
            };

            match runtime.block_on(cmd::serve::run(args.config)) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("Error: {:#}", err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}
