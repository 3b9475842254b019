use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::dataset::DatasetAssembler;
use crate::error::Result;
use crate::fmt::number;
use crate::merger::{duplicate_tax_ids, merge};
use crate::reclassifier::{reclassify, summarize, DocumentType};
use crate::settings::load_settings;

pub fn run(dir: Option<String>, years: Vec<i32>) -> Result<()> {
    let settings = load_settings();
    let base = dir.map(PathBuf::from).unwrap_or_else(|| settings.datasets_path());
    let assembler = DatasetAssembler::new(&base)
        .with_companies_file(&settings.companies_dataset)
        .with_first_year(settings.first_year);

    let years = (!years.is_empty()).then_some(years.as_slice());
    let dataset = assembler.assemble(years)?;

    let duplicates = duplicate_tax_ids(&dataset.companies);
    if !duplicates.is_empty() {
        tracing::warn!(
            count = duplicates.len(),
            example = %duplicates[0],
            "companies dataset repeats tax ids; matching reimbursements appear once per company"
        );
    }

    let rows = reclassify(merge(dataset.reimbursements, &dataset.companies));
    let summary = summarize(&rows);

    let mut table = Table::new();
    table.set_header(vec!["", "Rows"]);
    table.add_row(vec![Cell::new("Reimbursements".bold()), Cell::new(number(summary.rows))]);
    table.add_row(vec![
        Cell::new("  with company".green()),
        Cell::new(number(summary.with_company)),
    ]);
    table.add_row(vec![
        Cell::new("  without company".red()),
        Cell::new(number(summary.rows - summary.with_company)),
    ]);
    table.add_row(vec![Cell::new("Party expenses"), Cell::new(number(summary.party_expenses))]);
    table.add_row(vec![Cell::new("Meals"), Cell::new(number(summary.meals))]);
    for (kind, count) in DocumentType::ALL.iter().zip(summary.document_types) {
        table.add_row(vec![Cell::new(kind.as_str()), Cell::new(number(count))]);
    }
    table.add_row(vec![
        Cell::new("unknown document type".dimmed()),
        Cell::new(number(summary.document_types[3])),
    ]);

    println!("Enriched dataset ({})\n{table}", base.display());
    Ok(())
}
