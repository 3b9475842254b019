use std::collections::HashMap;

use crate::coerce::digits_only;
use crate::dataset::{Company, Expense};

#[derive(Debug, Clone)]
pub struct MergedRow {
    pub expense: Expense,
    pub company: Option<Company>,
}

fn tax_id(raw: Option<&str>) -> Option<String> {
    let digits = digits_only(raw?);
    (!digits.is_empty()).then_some(digits)
}

/// Left join of expenses to companies on normalized tax id.
///
/// Every expense yields at least one row, in input order. A tax id present
/// more than once in `companies` yields one row per company for each
/// matching expense; see [`duplicate_tax_ids`].
pub fn merge(expenses: Vec<Expense>, companies: &[Company]) -> Vec<MergedRow> {
    let mut index: HashMap<String, Vec<&Company>> = HashMap::new();
    for company in companies {
        if let Some(id) = tax_id(company.cnpj.as_deref()) {
            index.entry(id).or_default().push(company);
        }
    }

    let mut rows = Vec::with_capacity(expenses.len());
    let mut matched = 0usize;
    for expense in expenses {
        let found = tax_id(expense.cnpj_cpf.as_deref()).and_then(|id| index.get(&id));
        match found {
            Some(candidates) => {
                matched += 1;
                for company in candidates {
                    rows.push(MergedRow {
                        expense: expense.clone(),
                        company: Some((*company).clone()),
                    });
                }
            }
            None => rows.push(MergedRow {
                expense,
                company: None,
            }),
        }
    }
    tracing::debug!(rows = rows.len(), matched, "merged expenses with companies");
    rows
}

/// Tax ids that appear more than once in `companies`, sorted.
pub fn duplicate_tax_ids(companies: &[Company]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for company in companies {
        if let Some(id) = tax_id(company.cnpj.as_deref()) {
            *seen.entry(id).or_default() += 1;
        }
    }
    let mut dups: Vec<String> = seen
        .into_iter()
        .filter(|(_, n)| *n > 1)
        .map(|(id, _)| id)
        .collect();
    dups.sort();
    dups
}
