use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::{StringRecord, StringRecordsIntoIter};
use sha2::{Digest, Sha256};
use xz2::read::XzDecoder;

use crate::coerce::{to_date, to_float, to_int, to_text};
use crate::error::{CeapError, Result};
use crate::models::Reimbursement;

/// Source column → stored field.
pub const RENAMES: &[(&str, &str)] = &[
    ("subquota_number", "subquota_id"),
    ("reimbursement_value_total", "total_reimbursement_value"),
];

pub const INTEGERS: &[&str] = &[
    "applicant_id",
    "batch_number",
    "congressperson_document",
    "congressperson_id",
    "document_id",
    "document_type",
    "installment",
    "month",
    "subquota_group_id",
    "subquota_id",
    "term",
    "term_id",
    "year",
];

pub const FLOATS: &[&str] = &[
    "document_value",
    "remark_value",
    "total_net_value",
    "total_reimbursement_value",
];

const ISSUE_DATE: &str = "issue_date";

// ---------------------------------------------------------------------------
// Header → field index
// ---------------------------------------------------------------------------

struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        for (source, _) in RENAMES {
            if !headers.iter().any(|h| h == *source) {
                return Err(CeapError::MissingColumn(source.to_string()));
            }
        }

        let mut index = HashMap::new();
        // On repeated header names the last column wins.
        for (i, header) in headers.iter().enumerate() {
            if !RENAMES.iter().any(|(source, _)| *source == header) {
                index.insert(header.to_string(), i);
            }
        }
        // A renamed column replaces any same-named column in the file.
        for (i, header) in headers.iter().enumerate() {
            if let Some((_, target)) = RENAMES.iter().find(|(source, _)| *source == header) {
                index.insert(target.to_string(), i);
            }
        }

        let required = INTEGERS.iter().chain(FLOATS).chain(std::iter::once(&ISSUE_DATE));
        for name in required {
            if !index.contains_key(*name) {
                return Err(CeapError::MissingColumn(name.to_string()));
            }
        }
        Ok(Self { index })
    }

    fn raw<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index.get(name).and_then(|&i| record.get(i))
    }

    fn int(&self, record: &StringRecord, name: &str) -> Option<i64> {
        self.raw(record, name).and_then(to_int)
    }

    fn float(&self, record: &StringRecord, name: &str) -> Option<f64> {
        self.raw(record, name).and_then(to_float)
    }

    fn text(&self, record: &StringRecord, name: &str) -> Option<String> {
        self.raw(record, name).and_then(to_text)
    }

    fn normalize(&self, r: &StringRecord) -> Reimbursement {
        Reimbursement {
            document_id: self.int(r, "document_id"),
            applicant_id: self.int(r, "applicant_id"),
            batch_number: self.int(r, "batch_number"),
            congressperson_document: self.int(r, "congressperson_document"),
            congressperson_id: self.int(r, "congressperson_id"),
            document_type: self.int(r, "document_type"),
            installment: self.int(r, "installment"),
            month: self.int(r, "month"),
            subquota_group_id: self.int(r, "subquota_group_id"),
            subquota_id: self.int(r, "subquota_id"),
            term: self.int(r, "term"),
            term_id: self.int(r, "term_id"),
            year: self.int(r, "year"),
            document_value: self.float(r, "document_value"),
            remark_value: self.float(r, "remark_value"),
            total_net_value: self.float(r, "total_net_value"),
            total_reimbursement_value: self.float(r, "total_reimbursement_value"),
            issue_date: self.raw(r, ISSUE_DATE).and_then(to_date),
            cnpj_cpf: self.text(r, "cnpj_cpf"),
            congressperson_name: self.text(r, "congressperson_name"),
            document_number: self.text(r, "document_number"),
            leg_of_the_trip: self.text(r, "leg_of_the_trip"),
            net_values: self.text(r, "net_values"),
            party: self.text(r, "party"),
            passenger: self.text(r, "passenger"),
            reimbursement_numbers: self.text(r, "reimbursement_numbers"),
            reimbursement_values: self.text(r, "reimbursement_values"),
            state: self.text(r, "state"),
            subquota_description: self.text(r, "subquota_description"),
            subquota_group_description: self.text(r, "subquota_group_description"),
            supplier: self.text(r, "supplier"),
            // Analysis output is never trusted from the feed.
            probability: None,
            suspicions: None,
            available_in_latest_dataset: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Streaming reader
// ---------------------------------------------------------------------------

/// Pull-based stream of normalized reimbursements, one per CSV row, in file
/// order. Single pass: reopen the file to read it again. The underlying file
/// and decoder are released when the reader is dropped.
pub struct ReimbursementReader<R: Read> {
    columns: Columns,
    records: StringRecordsIntoIter<R>,
}

impl ReimbursementReader<XzDecoder<BufReader<File>>> {
    /// Open an xz-compressed CSV dataset.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        tracing::debug!(path = %path.display(), "opened reimbursements dataset");
        Self::from_reader(XzDecoder::new(BufReader::new(file)))
    }
}

impl<R: Read> ReimbursementReader<R> {
    pub fn from_reader(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);
        let columns = Columns::from_headers(rdr.headers()?)?;
        Ok(Self {
            columns,
            records: rdr.into_records(),
        })
    }
}

impl<R: Read> Iterator for ReimbursementReader<R> {
    type Item = Result<Reimbursement>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(e) => return Some(Err(structural(e))),
        };
        Some(Ok(self.columns.normalize(&record)))
    }
}

/// SHA-256 of the file as stored on disk, hex encoded.
pub fn checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn structural(err: csv::Error) -> CeapError {
    if let csv::ErrorKind::UnequalLengths {
        pos,
        expected_len,
        len,
    } = err.kind()
    {
        return CeapError::RowStructure {
            line: pos.as_ref().map_or(0, |p| p.line()),
            expected: *expected_len,
            found: *len,
        };
    }
    CeapError::Csv(err)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Write;
    use std::path::{Path, PathBuf};

    use xz2::write::XzEncoder;

    pub const HEADER: &[&str] = &[
        "document_id",
        "applicant_id",
        "batch_number",
        "cnpj_cpf",
        "congressperson_document",
        "congressperson_id",
        "congressperson_name",
        "document_number",
        "document_type",
        "document_value",
        "installment",
        "issue_date",
        "month",
        "party",
        "reimbursement_value_total",
        "remark_value",
        "state",
        "subquota_description",
        "subquota_group_id",
        "subquota_number",
        "supplier",
        "term",
        "term_id",
        "total_net_value",
        "year",
    ];

    /// One CSV line in `HEADER` order; unspecified fields are empty.
    pub fn row(fields: &[(&str, &str)]) -> String {
        HEADER
            .iter()
            .map(|h| {
                fields
                    .iter()
                    .find(|(k, _)| k == h)
                    .map_or(String::new(), |(_, v)| v.to_string())
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn csv(rows: &[String]) -> String {
        let mut content = HEADER.join(",");
        content.push('\n');
        for r in rows {
            content.push_str(r);
            content.push('\n');
        }
        content
    }

    pub fn write_xz(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = XzEncoder::new(file, 6);
        encoder.write_all(content.as_bytes()).unwrap();
        encoder.finish().unwrap();
        path
    }
}
