use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::db;
use crate::error::Result;
use crate::models::Reimbursement;

/// State of one load run. `started_at` is taken once, from the same clock
/// used for every upsert, and is the cut-off for staleness marking.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub source: PathBuf,
    pub started_at: DateTime<Utc>,
    pub count: usize,
}

impl RunContext {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            started_at: Utc::now(),
            count: 0,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ReconcileSummary {
    pub processed: usize,
    pub upserted: usize,
    pub skipped: usize,
    pub marked_unavailable: usize,
}

/// Upsert every record from `records`, then flag stored records this run did
/// not touch as no longer available upstream.
///
/// Rows without a `document_id` are counted but not stored. The first error
/// from `records` stops the run: upserts applied so far are committed and the
/// error is returned, and staleness marking does not run.
pub fn reconcile<I, F>(
    conn: &mut Connection,
    ctx: &mut RunContext,
    records: I,
    mut on_progress: F,
) -> Result<ReconcileSummary>
where
    I: IntoIterator<Item = Result<Reimbursement>>,
    F: FnMut(usize),
{
    let mut summary = ReconcileSummary::default();

    let tx = conn.transaction()?;
    let outcome = upsert_all(&tx, ctx, records, &mut summary, &mut on_progress);
    tx.commit()?;
    outcome?;

    summary.marked_unavailable = db::mark_not_updated(conn, ctx.started_at)?;
    tracing::info!(
        source = %ctx.source.display(),
        processed = summary.processed,
        upserted = summary.upserted,
        skipped = summary.skipped,
        marked_unavailable = summary.marked_unavailable,
        "reconciliation finished"
    );
    Ok(summary)
}

fn upsert_all<I, F>(
    conn: &Connection,
    ctx: &mut RunContext,
    records: I,
    summary: &mut ReconcileSummary,
    on_progress: &mut F,
) -> Result<()>
where
    I: IntoIterator<Item = Result<Reimbursement>>,
    F: FnMut(usize),
{
    for record in records {
        let record = record?;
        // Zero is a placeholder id in the feed, not a document.
        if matches!(record.document_id, Some(id) if id != 0) {
            db::upsert(conn, &record, Utc::now())?;
            summary.upserted += 1;
        } else {
            tracing::debug!(row = summary.processed + 1, "skipping record without document_id");
            summary.skipped += 1;
        }
        summary.processed += 1;
        ctx.count += 1;
        on_progress(ctx.count);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{find, get_connection, init_db, upsert};
    use crate::error::CeapError;
    use crate::loader::fixtures::{csv, row};
    use crate::loader::ReimbursementReader;
    use chrono::Duration;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn record(document_id: i64, supplier: &str) -> Reimbursement {
        Reimbursement {
            document_id: Some(document_id),
            supplier: Some(supplier.to_string()),
            ..Default::default()
        }
    }

    fn seed_old(conn: &Connection, document_id: i64) {
        upsert(conn, &record(document_id, "OLD"), Utc::now() - Duration::days(1)).unwrap();
    }

    fn run(conn: &mut Connection, records: Vec<Reimbursement>) -> Result<ReconcileSummary> {
        let mut ctx = RunContext::new(PathBuf::from("test.xz"));
        reconcile(conn, &mut ctx, records.into_iter().map(Ok), |_| {})
    }

    fn available(conn: &Connection, document_id: i64) -> bool {
        find(conn, document_id).unwrap().unwrap().available_in_latest_dataset
    }

    #[test]
    fn test_inserts_new_records() {
        let (_dir, mut conn) = test_db();
        let summary = run(&mut conn, vec![record(1, "A"), record(2, "B")]).unwrap();
        assert_eq!(summary.upserted, 2);
        assert_eq!(summary.marked_unavailable, 0);
        assert_eq!(db::count(&conn).unwrap(), 2);
        assert!(available(&conn, 1));
    }

    #[test]
    fn test_same_document_twice_keeps_last_payload() {
        let (_dir, mut conn) = test_db();
        run(&mut conn, vec![record(1, "FIRST"), record(1, "SECOND")]).unwrap();
        assert_eq!(db::count(&conn).unwrap(), 1);
        let stored = find(&conn, 1).unwrap().unwrap();
        assert_eq!(stored.supplier.as_deref(), Some("SECOND"));
    }

    #[test]
    fn test_records_missing_from_feed_are_marked_unavailable() {
        let (_dir, mut conn) = test_db();
        seed_old(&conn, 1);
        seed_old(&conn, 2);
        seed_old(&conn, 3);

        let summary = run(&mut conn, vec![record(2, "UPDATED"), record(4, "NEW")]).unwrap();

        assert_eq!(summary.marked_unavailable, 2);
        assert!(!available(&conn, 1));
        assert!(available(&conn, 2));
        assert!(!available(&conn, 3));
        assert!(available(&conn, 4));
        assert_eq!(db::count(&conn).unwrap(), 4);
    }

    #[test]
    fn test_records_without_document_id_are_counted_not_stored() {
        let (_dir, mut conn) = test_db();
        let mut seen = Vec::new();
        let mut ctx = RunContext::new(PathBuf::from("test.xz"));
        let records = vec![record(1, "A"), Reimbursement::default(), record(2, "B")];
        let summary = reconcile(&mut conn, &mut ctx, records.into_iter().map(Ok), |n| {
            seen.push(n)
        })
        .unwrap();

        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(ctx.count, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.upserted, 2);
        assert_eq!(db::count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_zero_document_id_is_skipped() {
        let (_dir, mut conn) = test_db();
        let summary = run(&mut conn, vec![record(0, "ZERO"), record(1, "A")]).unwrap();

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.upserted, 1);
        assert_eq!(db::count(&conn).unwrap(), 1);
        assert!(find(&conn, 0).unwrap().is_none());
    }

    #[test]
    fn test_rerun_with_same_input_is_stable() {
        let (_dir, mut conn) = test_db();
        seed_old(&conn, 9);
        run(&mut conn, vec![record(1, "A"), record(2, "B")]).unwrap();
        let second = run(&mut conn, vec![record(1, "A"), record(2, "B")]).unwrap();

        assert_eq!(db::count(&conn).unwrap(), 3);
        assert!(!available(&conn, 9));
        assert!(available(&conn, 1));
        assert!(available(&conn, 2));
        // Record 9 is older than the second run too, so it is re-marked.
        assert_eq!(second.marked_unavailable, 1);
    }

    #[test]
    fn test_fatal_row_keeps_applied_upserts_and_skips_marking() {
        let (_dir, mut conn) = test_db();
        seed_old(&conn, 9);
        let records = vec![
            Ok(record(1, "A")),
            Err(CeapError::RowStructure {
                line: 3,
                expected: 25,
                found: 2,
            }),
            Ok(record(2, "B")),
        ];
        let mut ctx = RunContext::new(PathBuf::from("test.xz"));
        let err = reconcile(&mut conn, &mut ctx, records, |_| {}).unwrap_err();

        assert!(matches!(err, CeapError::RowStructure { .. }));
        assert!(find(&conn, 1).unwrap().is_some());
        assert!(find(&conn, 2).unwrap().is_none());
        assert!(available(&conn, 9));
    }

    #[test]
    fn test_reconciles_straight_from_loader() {
        let (_dir, mut conn) = test_db();
        let content = csv(&[
            row(&[("document_id", "42"), ("reimbursement_value_total", "10.5")]),
            row(&[("document_id", ""), ("supplier", "NO KEY")]),
        ]);
        let reader = ReimbursementReader::from_reader(content.as_bytes()).unwrap();
        let mut ctx = RunContext::new(PathBuf::from("inline.csv"));
        let summary = reconcile(&mut conn, &mut ctx, reader, |_| {}).unwrap();

        assert_eq!(summary.upserted, 1);
        assert_eq!(summary.skipped, 1);
        let stored = find(&conn, 42).unwrap().unwrap();
        assert_eq!(stored.total_reimbursement_value, Some(10.5));
    }
}
