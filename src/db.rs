use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::coerce::to_date;
use crate::error::{CeapError, Result};
use crate::models::Reimbursement;

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reimbursements (
    document_id INTEGER PRIMARY KEY,
    applicant_id INTEGER,
    batch_number INTEGER,
    congressperson_document INTEGER,
    congressperson_id INTEGER,
    document_type INTEGER,
    installment INTEGER,
    month INTEGER,
    subquota_group_id INTEGER,
    subquota_id INTEGER,
    term INTEGER,
    term_id INTEGER,
    year INTEGER,
    document_value REAL,
    remark_value REAL,
    total_net_value REAL,
    total_reimbursement_value REAL,
    issue_date TEXT,
    cnpj_cpf TEXT,
    congressperson_name TEXT,
    document_number TEXT,
    leg_of_the_trip TEXT,
    net_values TEXT,
    party TEXT,
    passenger TEXT,
    reimbursement_numbers TEXT,
    reimbursement_values TEXT,
    state TEXT,
    subquota_description TEXT,
    subquota_group_description TEXT,
    supplier TEXT,
    probability REAL,
    suspicions TEXT,
    available_in_latest_dataset INTEGER NOT NULL DEFAULT 1,
    last_update TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reimbursements_last_update ON reimbursements(last_update);

CREATE TABLE IF NOT EXISTS load_runs (
    id INTEGER PRIMARY KEY,
    filename TEXT NOT NULL,
    checksum TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    marked_unavailable INTEGER NOT NULL
);
";

/// Stored fields in bind order for `upsert`.
const FIELDS: &[&str] = &[
    "document_id",
    "applicant_id",
    "batch_number",
    "congressperson_document",
    "congressperson_id",
    "document_type",
    "installment",
    "month",
    "subquota_group_id",
    "subquota_id",
    "term",
    "term_id",
    "year",
    "document_value",
    "remark_value",
    "total_net_value",
    "total_reimbursement_value",
    "issue_date",
    "cnpj_cpf",
    "congressperson_name",
    "document_number",
    "leg_of_the_trip",
    "net_values",
    "party",
    "passenger",
    "reimbursement_numbers",
    "reimbursement_values",
    "state",
    "subquota_description",
    "subquota_group_description",
    "supplier",
    "probability",
    "suspicions",
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Fixed-width UTC rendering; string order equals time order.
pub fn timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn upsert_sql() -> &'static str {
    static SQL: OnceLock<String> = OnceLock::new();
    SQL.get_or_init(|| {
        let placeholders: Vec<String> = (1..=FIELDS.len()).map(|i| format!("?{i}")).collect();
        let updates: Vec<String> = FIELDS
            .iter()
            .filter(|f| **f != "document_id")
            .map(|f| format!("{f} = excluded.{f}"))
            .collect();
        format!(
            "INSERT INTO reimbursements ({}, available_in_latest_dataset, last_update) \
             VALUES ({}, 1, ?{}) \
             ON CONFLICT(document_id) DO UPDATE SET {}, \
             available_in_latest_dataset = 1, last_update = excluded.last_update",
            FIELDS.join(", "),
            placeholders.join(", "),
            FIELDS.len() + 1,
            updates.join(", "),
        )
    })
}

/// Insert the record, or overwrite every field of the stored one with the
/// same `document_id`. Always refreshes `last_update` and marks the record
/// as present in the latest dataset.
pub fn upsert(conn: &Connection, r: &Reimbursement, updated_at: DateTime<Utc>) -> Result<()> {
    let document_id = r.document_id.ok_or(CeapError::MissingKey)?;
    let issue_date = r.issue_date.map(|d| d.format("%Y-%m-%d").to_string());
    let suspicions = r.suspicions.as_ref().map(|v| v.to_string());

    let mut stmt = conn.prepare_cached(upsert_sql())?;
    stmt.execute(rusqlite::params![
        document_id,
        r.applicant_id,
        r.batch_number,
        r.congressperson_document,
        r.congressperson_id,
        r.document_type,
        r.installment,
        r.month,
        r.subquota_group_id,
        r.subquota_id,
        r.term,
        r.term_id,
        r.year,
        r.document_value,
        r.remark_value,
        r.total_net_value,
        r.total_reimbursement_value,
        issue_date,
        r.cnpj_cpf,
        r.congressperson_name,
        r.document_number,
        r.leg_of_the_trip,
        r.net_values,
        r.party,
        r.passenger,
        r.reimbursement_numbers,
        r.reimbursement_values,
        r.state,
        r.subquota_description,
        r.subquota_group_description,
        r.supplier,
        r.probability,
        suspicions,
        timestamp(updated_at),
    ])?;
    Ok(())
}

fn from_row(row: &Row) -> rusqlite::Result<(Reimbursement, Option<String>)> {
    let issue_date: Option<String> = row.get("issue_date")?;
    let reimbursement = Reimbursement {
        document_id: row.get("document_id")?,
        applicant_id: row.get("applicant_id")?,
        batch_number: row.get("batch_number")?,
        congressperson_document: row.get("congressperson_document")?,
        congressperson_id: row.get("congressperson_id")?,
        document_type: row.get("document_type")?,
        installment: row.get("installment")?,
        month: row.get("month")?,
        subquota_group_id: row.get("subquota_group_id")?,
        subquota_id: row.get("subquota_id")?,
        term: row.get("term")?,
        term_id: row.get("term_id")?,
        year: row.get("year")?,
        document_value: row.get("document_value")?,
        remark_value: row.get("remark_value")?,
        total_net_value: row.get("total_net_value")?,
        total_reimbursement_value: row.get("total_reimbursement_value")?,
        issue_date: issue_date.as_deref().and_then(to_date),
        cnpj_cpf: row.get("cnpj_cpf")?,
        congressperson_name: row.get("congressperson_name")?,
        document_number: row.get("document_number")?,
        leg_of_the_trip: row.get("leg_of_the_trip")?,
        net_values: row.get("net_values")?,
        party: row.get("party")?,
        passenger: row.get("passenger")?,
        reimbursement_numbers: row.get("reimbursement_numbers")?,
        reimbursement_values: row.get("reimbursement_values")?,
        state: row.get("state")?,
        subquota_description: row.get("subquota_description")?,
        subquota_group_description: row.get("subquota_group_description")?,
        supplier: row.get("supplier")?,
        probability: row.get("probability")?,
        suspicions: None,
        available_in_latest_dataset: row.get("available_in_latest_dataset")?,
    };
    let suspicions: Option<String> = row.get("suspicions")?;
    Ok((reimbursement, suspicions))
}

pub fn find(conn: &Connection, document_id: i64) -> Result<Option<Reimbursement>> {
    let found = conn
        .query_row(
            "SELECT * FROM reimbursements WHERE document_id = ?1",
            [document_id],
            from_row,
        )
        .optional()?;
    let Some((mut reimbursement, suspicions)) = found else {
        return Ok(None);
    };
    if let Some(raw) = suspicions {
        reimbursement.suspicions = Some(serde_json::from_str(&raw)?);
    }
    Ok(Some(reimbursement))
}

pub fn count(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row("SELECT count(*) FROM reimbursements", [], |r| r.get(0))?;
    Ok(n as usize)
}

pub fn count_unavailable(conn: &Connection) -> Result<usize> {
    let n: i64 = conn.query_row(
        "SELECT count(*) FROM reimbursements WHERE available_in_latest_dataset = 0",
        [],
        |r| r.get(0),
    )?;
    Ok(n as usize)
}

/// Flag every record last written before `before` as gone from the feed.
/// Returns the number of rows touched.
pub fn mark_not_updated(conn: &Connection, before: DateTime<Utc>) -> Result<usize> {
    let n = conn.execute(
        "UPDATE reimbursements SET available_in_latest_dataset = 0 WHERE last_update < ?1",
        [timestamp(before)],
    )?;
    Ok(n)
}

pub fn drop_all(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM reimbursements", [])?)
}

// ---------------------------------------------------------------------------
// Load history
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadRun {
    pub filename: String,
    pub checksum: String,
    pub started_at: String,
    pub finished_at: String,
    pub record_count: i64,
    pub marked_unavailable: i64,
}

pub fn record_load(conn: &Connection, run: &LoadRun) -> Result<()> {
    conn.execute(
        "INSERT INTO load_runs (filename, checksum, started_at, finished_at, record_count, marked_unavailable) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            run.filename,
            run.checksum,
            run.started_at,
            run.finished_at,
            run.record_count,
            run.marked_unavailable,
        ],
    )?;
    Ok(())
}

pub fn last_load(conn: &Connection) -> Result<Option<LoadRun>> {
    let run = conn
        .query_row(
            "SELECT filename, checksum, started_at, finished_at, record_count, marked_unavailable \
             FROM load_runs ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                Ok(LoadRun {
                    filename: row.get(0)?,
                    checksum: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    record_count: row.get(4)?,
                    marked_unavailable: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn reimbursement(document_id: i64, supplier: &str) -> Reimbursement {
        Reimbursement {
            document_id: Some(document_id),
            supplier: Some(supplier.to_string()),
            total_net_value: Some(10.5),
            issue_date: NaiveDate::from_ymd_opt(2016, 1, 2),
            ..Default::default()
        }
    }

    fn last_update(conn: &Connection, document_id: i64) -> String {
        conn.query_row(
            "SELECT last_update FROM reimbursements WHERE document_id = ?1",
            [document_id],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["reimbursements", "load_runs"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_upsert_inserts_then_overwrites() {
        let (_dir, conn) = test_db();
        upsert(&conn, &reimbursement(42, "FIRST"), Utc::now()).unwrap();
        let second = Reimbursement {
            congressperson_id: Some(7),
            ..reimbursement(42, "SECOND")
        };
        upsert(&conn, &second, Utc::now()).unwrap();

        assert_eq!(count(&conn).unwrap(), 1);
        let stored = find(&conn, 42).unwrap().unwrap();
        assert_eq!(stored, second);
    }

    #[test]
    fn test_upsert_clears_fields_missing_from_new_payload() {
        let (_dir, conn) = test_db();
        let first = Reimbursement {
            party: Some("XYZ".to_string()),
            ..reimbursement(1, "A")
        };
        upsert(&conn, &first, Utc::now()).unwrap();
        upsert(&conn, &reimbursement(1, "A"), Utc::now()).unwrap();
        assert_eq!(find(&conn, 1).unwrap().unwrap().party, None);
    }

    #[test]
    fn test_upsert_requires_document_id() {
        let (_dir, conn) = test_db();
        let err = upsert(&conn, &Reimbursement::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, CeapError::MissingKey));
        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_upsert_advances_last_update() {
        let (_dir, conn) = test_db();
        let earlier = Utc::now() - Duration::hours(1);
        upsert(&conn, &reimbursement(1, "A"), earlier).unwrap();
        let before = last_update(&conn, 1);
        upsert(&conn, &reimbursement(1, "A"), Utc::now()).unwrap();
        assert!(last_update(&conn, 1) > before);
    }

    #[test]
    fn test_suspicions_round_trip_as_json() {
        let (_dir, conn) = test_db();
        let r = Reimbursement {
            suspicions: Some(serde_json::json!({"meal_price_outlier": true})),
            probability: Some(0.75),
            ..reimbursement(9, "A")
        };
        upsert(&conn, &r, Utc::now()).unwrap();
        let stored = find(&conn, 9).unwrap().unwrap();
        assert_eq!(stored.suspicions, r.suspicions);
        assert_eq!(stored.probability, Some(0.75));
    }

    #[test]
    fn test_find_missing_returns_none() {
        let (_dir, conn) = test_db();
        assert!(find(&conn, 404).unwrap().is_none());
    }

    #[test]
    fn test_mark_not_updated_only_touches_older_rows() {
        let (_dir, conn) = test_db();
        let started_at = Utc::now();
        upsert(&conn, &reimbursement(1, "OLD"), started_at - Duration::days(1)).unwrap();
        upsert(&conn, &reimbursement(2, "NEW"), started_at).unwrap();

        assert_eq!(mark_not_updated(&conn, started_at).unwrap(), 1);
        assert!(!find(&conn, 1).unwrap().unwrap().available_in_latest_dataset);
        assert!(find(&conn, 2).unwrap().unwrap().available_in_latest_dataset);
        assert_eq!(count_unavailable(&conn).unwrap(), 1);
    }

    #[test]
    fn test_upsert_restores_availability() {
        let (_dir, conn) = test_db();
        let now = Utc::now();
        upsert(&conn, &reimbursement(1, "A"), now - Duration::days(1)).unwrap();
        mark_not_updated(&conn, now).unwrap();
        upsert(&conn, &reimbursement(1, "A"), now).unwrap();
        assert!(find(&conn, 1).unwrap().unwrap().available_in_latest_dataset);
    }

    #[test]
    fn test_drop_all() {
        let (_dir, conn) = test_db();
        upsert(&conn, &reimbursement(1, "A"), Utc::now()).unwrap();
        upsert(&conn, &reimbursement(2, "B"), Utc::now()).unwrap();
        assert_eq!(drop_all(&conn).unwrap(), 2);
        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_timestamp_order_matches_time_order() {
        let t = Utc::now();
        assert!(timestamp(t) < timestamp(t + Duration::microseconds(1)));
        assert!(timestamp(t) < timestamp(t + Duration::days(400)));
    }

    #[test]
    fn test_load_history() {
        let (_dir, conn) = test_db();
        assert!(last_load(&conn).unwrap().is_none());
        for (i, name) in ["a.xz", "b.xz"].iter().enumerate() {
            record_load(
                &conn,
                &LoadRun {
                    filename: name.to_string(),
                    checksum: "abc".to_string(),
                    started_at: timestamp(Utc::now()),
                    finished_at: timestamp(Utc::now()),
                    record_count: i as i64,
                    marked_unavailable: 0,
                },
            )
            .unwrap();
        }
        let last = last_load(&conn).unwrap().unwrap();
        assert_eq!(last.filename, "b.xz");
        assert_eq!(last.record_count, 1);
    }
}
