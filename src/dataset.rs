use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use xz2::read::XzDecoder;

use crate::coerce::{digits_only, lenient, to_text};
use crate::error::{CeapError, Result};

pub const COMPANIES_DATASET: &str = "2016-09-03-companies.xz";
pub const FIRST_YEAR: i32 = 2009;

/// A reimbursement row as read for analysis. Identifier-like columns stay
/// text here; only the columns the analysis computes on are coerced.
/// Columns outside the modeled set are kept verbatim in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Expense {
    #[serde(default, deserialize_with = "lenient::int")]
    pub document_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub applicant_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cnpj_cpf: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub congressperson_id: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub congressperson_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub congressperson_document: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub party: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub term: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub term_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub subquota_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub subquota_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub subquota_group_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub subquota_group_description: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub supplier: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub document_type: Option<i64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub document_number: Option<String>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub batch_number: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub installment: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "lenient::int")]
    pub month: Option<i64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub document_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub remark_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub total_net_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient::float")]
    pub reimbursement_value_total: Option<f64>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub net_values: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reimbursement_numbers: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub reimbursement_values: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub passenger: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub leg_of_the_trip: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub issue_date: Option<NaiveDate>,
    #[serde(skip)]
    pub extra: BTreeMap<String, String>,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Company {
    /// Digits only once loaded.
    #[serde(default, deserialize_with = "lenient::text")]
    pub cnpj: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub trade_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub legal_entity: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient::text")]
    pub company_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub situation: Option<String>,
    #[serde(default, deserialize_with = "lenient::date")]
    pub situation_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub state: Option<String>,
    /// Activities, coordinates, partners and the rest of the file.
    #[serde(skip)]
    pub extra: BTreeMap<String, String>,
}

/// A typed CSV row that keeps the columns it does not model.
trait Row: DeserializeOwned {
    /// Header names consumed by the typed fields.
    const COLUMNS: &'static [&'static str];

    fn extra_mut(&mut self) -> &mut BTreeMap<String, String>;
}

impl Row for Expense {
    const COLUMNS: &'static [&'static str] = &[
        "document_id",
        "applicant_id",
        "cnpj_cpf",
        "congressperson_id",
        "congressperson_name",
        "congressperson_document",
        "party",
        "state",
        "term",
        "term_id",
        "subquota_number",
        "subquota_description",
        "subquota_group_id",
        "subquota_group_description",
        "supplier",
        "document_type",
        "document_number",
        "batch_number",
        "installment",
        "year",
        "month",
        "document_value",
        "remark_value",
        "total_net_value",
        "reimbursement_value_total",
        "net_values",
        "reimbursement_numbers",
        "reimbursement_values",
        "passenger",
        "leg_of_the_trip",
        "issue_date",
    ];

    fn extra_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.extra
    }
}

impl Row for Company {
    const COLUMNS: &'static [&'static str] = &[
        "cnpj",
        "name",
        "trade_name",
        "legal_entity",
        "type",
        "situation",
        "situation_date",
        "city",
        "state",
    ];

    fn extra_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.extra
    }
}

pub struct Dataset {
    pub reimbursements: Vec<Expense>,
    pub companies: Vec<Company>,
}

/// Locates and reads the yearly reimbursement files and the companies file
/// under one directory.
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    base_dir: PathBuf,
    companies_file: String,
    first_year: i32,
}

impl DatasetAssembler {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            companies_file: COMPANIES_DATASET.to_string(),
            first_year: FIRST_YEAR,
        }
    }

    pub fn with_companies_file(mut self, name: &str) -> Self {
        self.companies_file = name.to_string();
        self
    }

    pub fn with_first_year(mut self, year: i32) -> Self {
        self.first_year = year;
        self
    }

    /// First year through the current calendar year, inclusive.
    pub fn default_years(&self) -> Vec<i32> {
        (self.first_year..=Local::now().year()).collect()
    }

    pub fn reimbursements_path(&self, year: i32) -> PathBuf {
        self.base_dir.join(format!("reimbursements-{year}.xz"))
    }

    pub fn companies_path(&self) -> PathBuf {
        self.base_dir.join(&self.companies_file)
    }

    pub fn assemble(&self, years: Option<&[i32]>) -> Result<Dataset> {
        let reimbursements = self.read_reimbursements(years)?;
        let companies = self.read_companies()?;
        tracing::info!(
            reimbursements = reimbursements.len(),
            companies = companies.len(),
            "datasets assembled"
        );
        Ok(Dataset {
            reimbursements,
            companies,
        })
    }

    /// Concatenate the yearly tables in year order. Years passed explicitly
    /// must exist; years from the default range are skipped when absent.
    pub fn read_reimbursements(&self, years: Option<&[i32]>) -> Result<Vec<Expense>> {
        let (years, explicit) = match years {
            Some(y) if !y.is_empty() => (y.to_vec(), true),
            _ => (self.default_years(), false),
        };

        let mut rows = Vec::new();
        for year in years {
            let path = self.reimbursements_path(year);
            if !path.exists() {
                if explicit {
                    return Err(CeapError::MissingDataset(path.display().to_string()));
                }
                tracing::warn!(year, path = %path.display(), "no reimbursements file for year");
                continue;
            }
            let mut yearly: Vec<Expense> = read_xz_csv(&path)?;
            tracing::debug!(year, rows = yearly.len(), "read reimbursements");
            rows.append(&mut yearly);
        }
        Ok(rows)
    }

    pub fn read_companies(&self) -> Result<Vec<Company>> {
        let path = self.companies_path();
        if !path.exists() {
            return Err(CeapError::MissingDataset(path.display().to_string()));
        }
        let mut companies: Vec<Company> = read_xz_csv(&path)?;
        for company in &mut companies {
            company.cnpj = company.cnpj.as_deref().map(digits_only);
        }
        Ok(companies)
    }
}

fn read_xz_csv<T: Row>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let mut rdr = csv::Reader::from_reader(XzDecoder::new(BufReader::new(file)));
    let headers = rdr.headers()?.clone();
    let unmodeled: Vec<(usize, &str)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !T::COLUMNS.contains(h))
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let mut row: T = record.deserialize(Some(&headers))?;
        let extra = row.extra_mut();
        for &(i, name) in &unmodeled {
            if let Some(value) = record.get(i).and_then(to_text) {
                extra.insert(name.to_string(), value);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}
