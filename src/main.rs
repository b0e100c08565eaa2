//! wordpack CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use wordpack::cli::{load_manifest, print_report, Cli, Commands};
use wordpack::error::Error;
use wordpack::pack::Packager;

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if !cli.quiet {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Create {
            manifest,
            output,
            deck,
        } => {
            let batch = load_manifest(manifest)?;
            let report = Packager::new(deck).create(output, &batch)?;
            print_report(&report, output, cli.json);
            Ok(())
        }
        Commands::Update {
            manifest,
            container,
            output,
            deck,
        } => {
            let batch = load_manifest(manifest)?;
            let output = output.as_ref().unwrap_or(container);
            let report = Packager::new(deck).update(container, output, &batch)?;
            print_report(&report, output, cli.json);
            Ok(())
        }
    }
}
