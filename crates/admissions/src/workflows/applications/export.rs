use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::ReferenceCode;
use super::reconciliation::PaymentSummary;
use super::settings::BankDetails;
use super::submission::SubmissionReceipt;

/// Printable bank-payment instructions for one application reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInstructions {
    pub reference: ReferenceCode,
    pub applicant_name: String,
    pub program: String,
    pub intake: String,
    pub academic_year: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub bank: BankDetails,
}

impl PaymentInstructions {
    pub fn from_receipt(receipt: &SubmissionReceipt, bank: &BankDetails) -> Self {
        Self {
            reference: receipt.reference.code.clone(),
            applicant_name: receipt.applicant_name.clone(),
            program: receipt.program_label.clone(),
            intake: receipt.intake_month.clone(),
            academic_year: receipt.academic_year.clone(),
            issued_at: receipt.reference.created_at,
            expires_at: receipt.expires_at,
            bank: bank.clone(),
        }
    }

    pub fn from_summary(summary: &PaymentSummary, bank: &BankDetails) -> Self {
        Self {
            reference: summary.reference.clone(),
            applicant_name: summary.applicant_name.clone(),
            program: summary.program.clone(),
            intake: summary.intake.clone(),
            academic_year: summary.academic_year.clone(),
            issued_at: summary.issued_at,
            expires_at: summary.expires_at,
            bank: bank.clone(),
        }
    }

    fn steps(&self) -> [String; 3] {
        [
            format!(
                "Pay the application fee of {} at any {} branch into account {} ({}).",
                self.bank.fee_amount,
                self.bank.bank_name,
                self.bank.account_number,
                self.bank.account_name
            ),
            format!(
                "Quote reference {} on the deposit slip so the payment can be matched.",
                self.reference
            ),
            format!(
                "Upload a photo or scan of the stamped slip before {}.",
                self.expires_at.format("%B %d, %Y %H:%M UTC")
            ),
        ]
    }

    pub fn render_text(&self) -> String {
        let mut content = String::new();
        let _ = writeln!(content, "Application reference: {}", self.reference);
        let _ = writeln!(content, "Applicant: {}", self.applicant_name);
        let _ = writeln!(
            content,
            "Program: {} | Intake: {} {}",
            self.program, self.intake, self.academic_year
        );
        let _ = writeln!(
            content,
            "Issued: {}",
            self.issued_at.format("%B %d, %Y %H:%M UTC")
        );
        content.push('\n');
        for (index, step) in self.steps().iter().enumerate() {
            let _ = writeln!(content, "{}. {step}", index + 1);
        }
        content
    }

    pub fn render_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
        let _ = write!(
            html,
            "<title>Payment instructions {}</title></head><body>",
            escape(self.reference.as_str())
        );
        let _ = write!(
            html,
            "<h1>Application reference <code>{}</code></h1>",
            escape(self.reference.as_str())
        );
        html.push_str("<table>");
        for (label, value) in [
            ("Applicant", self.applicant_name.as_str()),
            ("Program", self.program.as_str()),
            ("Intake", self.intake.as_str()),
            ("Academic year", self.academic_year.as_str()),
        ] {
            let _ = write!(
                html,
                "<tr><th>{label}</th><td>{}</td></tr>",
                escape(value)
            );
        }
        html.push_str("</table><ol>");
        for step in self.steps() {
            let _ = write!(html, "<li>{}</li>", escape(&step));
        }
        html.push_str("</ol></body></html>");
        html
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
