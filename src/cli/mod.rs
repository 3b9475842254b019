pub mod enrich;
pub mod init;
pub mod reimbursements;
pub mod show;
pub mod status;

use clap::{Parser, Subcommand};

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::settings::load_settings;

/// Open the configured database, creating the data directory and schema on
/// first use.
pub(crate) fn open_db() -> Result<rusqlite::Connection> {
    let settings = load_settings();
    std::fs::create_dir_all(&settings.data_dir)?;
    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;
    Ok(conn)
}

#[derive(Parser)]
#[command(
    name = "ceap",
    about = "Load Chamber of Deputies expense reimbursements and build the enriched analysis dataset."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the database.
    Init {
        /// Path for ceap data (default: ~/Documents/ceap)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Directory holding the yearly and companies datasets
        #[arg(long = "datasets-dir")]
        datasets_dir: Option<String>,
    },
    /// Load a reimbursements dataset (.xz CSV) into the database.
    Reimbursements {
        /// Path to the compressed reimbursements CSV
        dataset: String,
        /// Delete every stored reimbursement before loading
        #[arg(long)]
        drop: bool,
    },
    /// Merge yearly reimbursements with companies and summarize the result.
    Enrich {
        /// Datasets directory (default: from settings)
        #[arg(long)]
        dir: Option<String>,
        /// Years to load (default: first configured year through this year)
        #[arg(long, num_args = 1..)]
        years: Vec<i32>,
    },
    /// Print one stored reimbursement.
    Show {
        /// Document id of the reimbursement
        document_id: i64,
    },
    /// Show the database location and record counts.
    Status,
}
