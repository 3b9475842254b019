use chrono::NaiveDate;

/// A reimbursement as stored: every field typed, every field optional except
/// the availability flag. `document_id` is the upsert key.
#[derive(Debug, Clone, PartialEq)]
pub struct Reimbursement {
    pub document_id: Option<i64>,

    pub applicant_id: Option<i64>,
    pub batch_number: Option<i64>,
    pub congressperson_document: Option<i64>,
    pub congressperson_id: Option<i64>,
    pub document_type: Option<i64>,
    pub installment: Option<i64>,
    pub month: Option<i64>,
    pub subquota_group_id: Option<i64>,
    pub subquota_id: Option<i64>,
    pub term: Option<i64>,
    pub term_id: Option<i64>,
    pub year: Option<i64>,

    pub document_value: Option<f64>,
    pub remark_value: Option<f64>,
    pub total_net_value: Option<f64>,
    pub total_reimbursement_value: Option<f64>,

    pub issue_date: Option<NaiveDate>,

    pub cnpj_cpf: Option<String>,
    pub congressperson_name: Option<String>,
    pub document_number: Option<String>,
    pub leg_of_the_trip: Option<String>,
    pub net_values: Option<String>,
    pub party: Option<String>,
    pub passenger: Option<String>,
    pub reimbursement_numbers: Option<String>,
    pub reimbursement_values: Option<String>,
    pub state: Option<String>,
    pub subquota_description: Option<String>,
    pub subquota_group_description: Option<String>,
    pub supplier: Option<String>,

    pub probability: Option<f64>,
    pub suspicions: Option<serde_json::Value>,
    pub available_in_latest_dataset: bool,
}

impl Default for Reimbursement {
    fn default() -> Self {
        Self {
            document_id: None,
            applicant_id: None,
            batch_number: None,
            congressperson_document: None,
            congressperson_id: None,
            document_type: None,
            installment: None,
            month: None,
            subquota_group_id: None,
            subquota_id: None,
            term: None,
            term_id: None,
            year: None,
            document_value: None,
            remark_value: None,
            total_net_value: None,
            total_reimbursement_value: None,
            issue_date: None,
            cnpj_cpf: None,
            congressperson_name: None,
            document_number: None,
            leg_of_the_trip: None,
            net_values: None,
            party: None,
            passenger: None,
            reimbursement_numbers: None,
            reimbursement_values: None,
            state: None,
            subquota_description: None,
            subquota_group_description: None,
            supplier: None,
            probability: None,
            suspicions: None,
            available_in_latest_dataset: true,
        }
    }
}
