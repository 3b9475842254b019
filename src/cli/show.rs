use comfy_table::{Cell, Table};

use crate::cli::open_db;
use crate::db;
use crate::error::Result;
use crate::models::Reimbursement;

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map_or_else(|| "-".to_string(), |x| x.to_string())
}

fn fields(r: &Reimbursement) -> Vec<(&'static str, String)> {
    vec![
        ("document_id", opt(&r.document_id)),
        ("year", opt(&r.year)),
        ("month", opt(&r.month)),
        ("issue_date", opt(&r.issue_date)),
        ("congressperson_id", opt(&r.congressperson_id)),
        ("congressperson_name", opt(&r.congressperson_name)),
        ("party", opt(&r.party)),
        ("state", opt(&r.state)),
        ("subquota_id", opt(&r.subquota_id)),
        ("subquota_description", opt(&r.subquota_description)),
        ("supplier", opt(&r.supplier)),
        ("cnpj_cpf", opt(&r.cnpj_cpf)),
        ("document_type", opt(&r.document_type)),
        ("document_number", opt(&r.document_number)),
        ("document_value", opt(&r.document_value)),
        ("remark_value", opt(&r.remark_value)),
        ("total_net_value", opt(&r.total_net_value)),
        ("total_reimbursement_value", opt(&r.total_reimbursement_value)),
        ("probability", opt(&r.probability)),
        ("suspicions", opt(&r.suspicions)),
        (
            "available_in_latest_dataset",
            r.available_in_latest_dataset.to_string(),
        ),
    ]
}

pub fn run(document_id: i64) -> Result<()> {
    let conn = open_db()?;
    let Some(reimbursement) = db::find(&conn, document_id)? else {
        println!("No reimbursement with document_id {document_id}");
        return Ok(());
    };

    let mut table = Table::new();
    table.set_header(vec!["Field", "Value"]);
    for (name, value) in fields(&reimbursement) {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    println!("{table}");
    Ok(())
}
