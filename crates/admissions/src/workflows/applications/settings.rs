use serde::{Deserialize, Serialize};

use super::reference::DEFAULT_REFERENCE_PREFIX;

/// Knobs shared by the submission, reconciliation, and export steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSettings {
    pub academic_year: String,
    /// Stream matched during program resolution.
    pub stream: String,
    pub reference_prefix: String,
    pub documents_bucket: String,
    pub payments_bucket: String,
    pub bank: BankDetails,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            academic_year: "2026/2027".to_string(),
            stream: "Science".to_string(),
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
            documents_bucket: "application-documents".to_string(),
            payments_bucket: "payment-slips".to_string(),
            bank: BankDetails::default(),
        }
    }
}

/// Where applicants pay the application fee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankDetails {
    pub bank_name: String,
    pub account_name: String,
    pub account_number: String,
    pub fee_amount: String,
}

impl Default for BankDetails {
    fn default() -> Self {
        Self {
            bank_name: "Commercial Bank".to_string(),
            account_name: "School Admissions Office".to_string(),
            account_number: "0000000000".to_string(),
            fee_amount: "100.00".to_string(),
        }
    }
}
