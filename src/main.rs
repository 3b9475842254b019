mod cli;
mod coerce;
mod dataset;
mod db;
mod error;
mod fmt;
mod loader;
mod logging;
mod merger;
mod models;
mod reclassifier;
mod reconciler;
mod settings;

use clap::Parser;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    logging::init_logging();

    let result = match cli.command {
        Commands::Init {
            data_dir,
            datasets_dir,
        } => cli::init::run(data_dir, datasets_dir),
        Commands::Reimbursements { dataset, drop } => cli::reimbursements::run(&dataset, drop),
        Commands::Enrich { dir, years } => cli::enrich::run(dir, years),
        Commands::Show { document_id } => cli::show::run(document_id),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
