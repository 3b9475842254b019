use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;

use crate::cli::open_db;
use crate::db::{self, timestamp, LoadRun};
use crate::error::Result;
use crate::fmt::number;
use crate::loader::{checksum, ReimbursementReader};
use crate::reconciler::{reconcile, RunContext};

const PROGRESS_EVERY: usize = 1_000;

pub fn run(dataset: &str, drop: bool) -> Result<()> {
    let mut ctx = RunContext::new(PathBuf::from(dataset));
    let mut conn = open_db()?;

    println!("Starting with {} reimbursements", number(db::count(&conn)?));

    if drop {
        let deleted = db::drop_all(&conn)?;
        tracing::info!(deleted, "dropped existing reimbursements");
        println!("Dropped {} reimbursements", number(deleted));
    }

    let sum = checksum(&ctx.source)?;
    let reader = ReimbursementReader::open(&ctx.source)?;
    let summary = reconcile(&mut conn, &mut ctx, reader, |n| {
        if n % PROGRESS_EVERY == 0 {
            print!("\rProcessed {} reimbursements", number(n));
            let _ = std::io::stdout().flush();
        }
    })?;

    db::record_load(
        &conn,
        &LoadRun {
            filename: ctx
                .source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            checksum: sum,
            started_at: timestamp(ctx.started_at),
            finished_at: timestamp(Utc::now()),
            record_count: summary.processed as i64,
            marked_unavailable: summary.marked_unavailable as i64,
        },
    )?;

    println!("\rProcessed {} reimbursements", number(summary.processed));
    if summary.skipped > 0 {
        println!("Skipped {} rows without document_id", number(summary.skipped));
    }
    println!("{} reimbursements in the database", number(db::count(&conn)?));
    println!(
        "{} reimbursements no longer in the latest dataset",
        number(summary.marked_unavailable)
    );
    Ok(())
}
