use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::dataset::Company;
use crate::merger::MergedRow;

/// Category values replaced before analysis.
const CATEGORY_RENAMES: &[(&str, &str)] = &[("Congressperson meal", "Meal")];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    BillOfSale,
    SimpleReceipt,
    ExpenseMadeAbroad,
}

impl DocumentType {
    pub const ALL: [DocumentType; 3] = [
        DocumentType::BillOfSale,
        DocumentType::SimpleReceipt,
        DocumentType::ExpenseMadeAbroad,
    ];

    /// Codes 3, 4 and 5 occur in the feed but have no documented meaning, so
    /// they map to `None` along with any other unknown code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::BillOfSale),
            1 => Some(Self::SimpleReceipt),
            2 => Some(Self::ExpenseMadeAbroad),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BillOfSale => "bill_of_sale",
            Self::SimpleReceipt => "simple_receipt",
            Self::ExpenseMadeAbroad => "expense_made_abroad",
        }
    }
}

/// A merged row under its analysis names.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct AnalyticRow {
    pub document_id: Option<i64>,
    pub applicant_id: Option<String>,
    pub congressperson_id: Option<String>,
    pub congressperson_name: Option<String>,
    pub congressperson_document: Option<i64>,
    pub party: Option<String>,
    pub state: Option<String>,
    pub term: Option<i64>,
    pub term_id: Option<i64>,
    pub subquota_number: Option<String>,
    pub subquota_group_id: Option<i64>,
    pub subquota_group_description: Option<String>,
    pub document_number: Option<String>,
    pub batch_number: Option<i64>,
    pub installment: Option<i64>,
    pub year: Option<i64>,
    pub month: Option<i64>,
    pub document_value: Option<f64>,
    pub remark_value: Option<f64>,
    pub reimbursement_value_total: Option<f64>,
    pub net_values: Option<String>,
    pub reimbursement_numbers: Option<String>,
    pub reimbursement_values: Option<String>,
    pub passenger: Option<String>,
    pub leg_of_the_trip: Option<String>,
    pub issue_date: Option<NaiveDate>,
    /// Reimbursement columns with no typed field.
    pub extra: BTreeMap<String, String>,
    /// `subquota_description`
    pub category: Option<String>,
    /// `total_net_value`
    pub net_value: Option<f64>,
    /// `cnpj_cpf`
    pub recipient_id: Option<String>,
    /// `supplier`
    pub recipient: Option<String>,
    pub document_type: Option<DocumentType>,
    pub is_party_expense: bool,
    pub company: Option<Company>,
}

fn rename_category(category: Option<String>) -> Option<String> {
    category.map(|c| match CATEGORY_RENAMES.iter().find(|(from, _)| *from == c) {
        Some((_, to)) => to.to_string(),
        None => c,
    })
}

/// Rename columns, recode document types and categories, and derive
/// `is_party_expense`. One output row per input row.
pub fn reclassify(rows: Vec<MergedRow>) -> Vec<AnalyticRow> {
    rows.into_iter()
        .map(|MergedRow { expense, company }| AnalyticRow {
            document_id: expense.document_id,
            applicant_id: expense.applicant_id,
            is_party_expense: expense.congressperson_id.is_none(),
            congressperson_id: expense.congressperson_id,
            congressperson_name: expense.congressperson_name,
            congressperson_document: expense.congressperson_document,
            party: expense.party,
            state: expense.state,
            term: expense.term,
            term_id: expense.term_id,
            subquota_number: expense.subquota_number,
            subquota_group_id: expense.subquota_group_id,
            subquota_group_description: expense.subquota_group_description,
            document_number: expense.document_number,
            batch_number: expense.batch_number,
            installment: expense.installment,
            year: expense.year,
            month: expense.month,
            document_value: expense.document_value,
            remark_value: expense.remark_value,
            reimbursement_value_total: expense.reimbursement_value_total,
            net_values: expense.net_values,
            reimbursement_numbers: expense.reimbursement_numbers,
            reimbursement_values: expense.reimbursement_values,
            passenger: expense.passenger,
            leg_of_the_trip: expense.leg_of_the_trip,
            issue_date: expense.issue_date,
            extra: expense.extra,
            category: rename_category(expense.subquota_description),
            net_value: expense.total_net_value,
            recipient_id: expense.cnpj_cpf,
            recipient: expense.supplier,
            document_type: expense.document_type.and_then(DocumentType::from_code),
            company,
        })
        .collect()
}

#[derive(Debug, Default, PartialEq)]
pub struct Summary {
    pub rows: usize,
    pub with_company: usize,
    pub party_expenses: usize,
    pub meals: usize,
    /// Counts in `DocumentType::ALL` order, then rows with no document type.
    pub document_types: [usize; 4],
}

pub fn summarize(rows: &[AnalyticRow]) -> Summary {
    let mut summary = Summary {
        rows: rows.len(),
        ..Default::default()
    };
    for row in rows {
        if row.company.is_some() {
            summary.with_company += 1;
        }
        if row.is_party_expense {
            summary.party_expenses += 1;
        }
        if row.category.as_deref() == Some("Meal") {
            summary.meals += 1;
        }
        let slot = row
            .document_type
            .and_then(|t| DocumentType::ALL.iter().position(|a| *a == t))
            .unwrap_or(3);
        summary.document_types[slot] += 1;
    }
    summary
}
