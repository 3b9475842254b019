use crate::db::{self, get_connection};
use crate::error::Result;
use crate::fmt::number;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Datasets:   {}", settings.datasets_path().display());
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `ceap init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    db::init_db(&conn)?;
    let total = db::count(&conn)?;
    let unavailable = db::count_unavailable(&conn)?;

    println!();
    println!("Reimbursements:  {}", number(total));
    println!("  available:     {}", number(total - unavailable));
    println!("  unavailable:   {}", number(unavailable));

    if let Some(run) = db::last_load(&conn)? {
        println!();
        println!("Last load:  {} ({} rows)", run.filename, number(run.record_count as usize));
        println!("  started:  {}", run.started_at);
        println!("  finished: {}", run.finished_at);
        println!("  sha256:   {}", run.checksum);
        println!("  marked unavailable: {}", number(run.marked_unavailable as usize));
    }
    Ok(())
}
