use clap::Parser;
use std::process;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use voltset_cli::{Cli, Commands};

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let (label, result) = match &cli.command {
        Commands::Sample(args) => {
            info!("Sampling scenarios");
            ("Sample", commands::sample::handle(args))
        }
        Commands::Solve(args) => ("Solve", commands::solve::handle(args)),
        Commands::Inspect { oracle, format } => {
            ("Inspect", commands::inspect::handle(oracle, *format))
        }
        Commands::Config { command } => ("Config", commands::config::handle(command)),
    };

    match result {
        Ok(()) => info!("{label} command finished"),
        Err(e) => {
            error!("{label} command failed: {:?}", e);
            process::exit(1);
        }
    }
}
