use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{
    AcademicHistory, Applicant, Application, ApplicationDocument, ApplicationId,
    ApplicationStatus, DocumentId, Program, ReferenceCode,
};
use super::repository::{AdmissionsRepository, RepositoryError};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Status transitions available to reviewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approve,
    Reject,
    MarkUnderReview,
}

impl ReviewDecision {
    pub const fn target_status(self) -> ApplicationStatus {
        match self {
            ReviewDecision::Approve => ApplicationStatus::Approved,
            ReviewDecision::Reject => ApplicationStatus::Rejected,
            ReviewDecision::MarkUnderReview => ApplicationStatus::UnderReview,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApplicationQuery {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    /// Case-insensitive match against applicant name, email, or reference code.
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub per_page: Option<usize>,
}

impl ApplicationQuery {
    fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    fn per_page(&self) -> usize {
        self.per_page
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

/// Fee state as reviewers see it. `Approved` applications can still be `Unpaid` or
/// `AwaitingApproval`; the two axes are independent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PaymentStatusView {
    Unpaid,
    AwaitingApproval {
        payment_reference: String,
    },
    Paid {
        payment_reference: Option<String>,
        approved_by: Option<String>,
        approved_at: Option<DateTime<Utc>>,
    },
}

impl PaymentStatusView {
    pub fn of(application: &Application) -> Self {
        let payment = &application.payment;
        if payment.fee_paid {
            Self::Paid {
                payment_reference: payment.payment_reference.clone(),
                approved_by: payment.approved_by.clone(),
                approved_at: payment.approved_at,
            }
        } else if payment.has_reference() {
            Self::AwaitingApproval {
                payment_reference: payment.payment_reference.clone().unwrap_or_default(),
            }
        } else {
            Self::Unpaid
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatusView::Unpaid => "Unpaid",
            PaymentStatusView::AwaitingApproval { .. } => "Awaiting approval",
            PaymentStatusView::Paid { .. } => "Paid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationOverview {
    pub application_id: ApplicationId,
    pub reference: Option<ReferenceCode>,
    pub applicant_name: String,
    pub email: String,
    pub program: String,
    pub academic_year: String,
    pub intake_month: String,
    pub status: ApplicationStatus,
    pub status_label: &'static str,
    pub fee_paid: bool,
    pub payment_label: &'static str,
    pub payment_slip_submitted: bool,
    pub document_count: usize,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationPage {
    pub items: Vec<ApplicationOverview>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDossier {
    pub application: Application,
    pub applicant: Option<Applicant>,
    pub program: Option<Program>,
    pub academic_history: Vec<AcademicHistory>,
    pub documents: Vec<ApplicationDocument>,
    pub payment_slips: Vec<ApplicationDocument>,
    pub payment: PaymentStatusView,
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("this action must be explicitly confirmed")]
    ConfirmationRequired,
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("document {0} not found")]
    DocumentNotFound(DocumentId),
    #[error("application {0} has no payment reference to approve")]
    MissingPaymentReference(ApplicationId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("export failed: {0}")]
    Export(#[from] csv::Error),
}

/// Administrative operations over submitted applications.
pub struct AdminReview<R> {
    repository: Arc<R>,
}

impl<R> AdminReview<R>
where
    R: AdmissionsRepository + 'static,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    fn require_confirmation(confirmed: bool) -> Result<(), ReviewError> {
        if confirmed {
            Ok(())
        } else {
            Err(ReviewError::ConfirmationRequired)
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Application, ReviewError> {
        self.repository
            .application(id)?
            .ok_or_else(|| ReviewError::ApplicationNotFound(id.clone()))
    }

    fn overview(&self, application: &Application) -> Result<ApplicationOverview, ReviewError> {
        let applicant = self.repository.applicant(&application.applicant_id)?;
        let program = self.repository.program(&application.program_id)?;
        let documents = self.repository.documents(&application.id)?;
        let payment = PaymentStatusView::of(application);

        Ok(ApplicationOverview {
            application_id: application.id.clone(),
            reference: applicant.as_ref().and_then(|a| a.reference_code.clone()),
            applicant_name: applicant
                .as_ref()
                .map(|a| a.name.full_name())
                .unwrap_or_default(),
            email: applicant
                .as_ref()
                .map(|a| a.contact.email.clone())
                .unwrap_or_default(),
            program: program.as_ref().map(Program::label).unwrap_or_default(),
            academic_year: application.academic_year.clone(),
            intake_month: application.intake_month.clone(),
            status: application.status,
            status_label: application.status.label(),
            fee_paid: application.payment.fee_paid,
            payment_label: payment.label(),
            payment_slip_submitted: documents.iter().any(ApplicationDocument::is_payment_slip),
            document_count: documents.len(),
            submitted_at: application.created_at,
        })
    }

    fn filtered(&self, query: &ApplicationQuery) -> Result<Vec<ApplicationOverview>, ReviewError> {
        let needle = query
            .search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut applications = self.repository.applications()?;
        applications.retain(|application| {
            query
                .status
                .map_or(true, |status| application.status == status)
        });
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut rows = Vec::with_capacity(applications.len());
        for application in &applications {
            let row = self.overview(application)?;
            let matches = needle.as_deref().map_or(true, |needle| {
                row.applicant_name.to_lowercase().contains(needle)
                    || row.email.to_lowercase().contains(needle)
                    || row
                        .reference
                        .as_ref()
                        .is_some_and(|code| code.as_str().to_lowercase().contains(needle))
            });
            if matches {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Filter, search, and paginate (1-based pages, newest first).
    pub fn list(&self, query: &ApplicationQuery) -> Result<ApplicationPage, ReviewError> {
        let rows = self.filtered(query)?;
        let page = query.page();
        let per_page = query.per_page();
        let total = rows.len();
        let total_pages = total.div_ceil(per_page);
        let items = rows
            .into_iter()
            .skip(page.saturating_sub(1).saturating_mul(per_page))
            .take(per_page)
            .collect();

        Ok(ApplicationPage {
            items,
            total,
            page,
            per_page,
            total_pages,
        })
    }

    pub fn dossier(&self, id: &ApplicationId) -> Result<ApplicationDossier, ReviewError> {
        let application = self.fetch(id)?;
        let applicant = self.repository.applicant(&application.applicant_id)?;
        let program = self.repository.program(&application.program_id)?;
        let academic_history = self.repository.academic_history(&application.id)?;
        let documents = self.repository.documents(&application.id)?;
        let payment_slips = documents
            .iter()
            .filter(|document| document.is_payment_slip())
            .cloned()
            .collect();
        let payment = PaymentStatusView::of(&application);

        Ok(ApplicationDossier {
            application,
            applicant,
            program,
            academic_history,
            documents,
            payment_slips,
            payment,
        })
    }

    /// Patch the status field only. Re-applying the current status is a no-op.
    pub fn transition(
        &self,
        id: &ApplicationId,
        decision: ReviewDecision,
        confirmed: bool,
        now: DateTime<Utc>,
    ) -> Result<Application, ReviewError> {
        Self::require_confirmation(confirmed)?;
        let mut application = self.fetch(id)?;
        let target = decision.target_status();
        if application.status == target {
            return Ok(application);
        }

        let previous = application.status;
        application.status = target;
        application.updated_at = now;
        self.repository.update_application(application.clone())?;
        info!(
            application_id = %id,
            from = previous.label(),
            to = target.label(),
            "application status changed"
        );
        Ok(application)
    }

    /// The only path that sets `fee_paid`. Requires a recorded payment reference; approving
    /// an already paid application leaves the original approval stamp in place.
    pub fn approve_payment(
        &self,
        id: &ApplicationId,
        reviewer: &str,
        confirmed: bool,
        now: DateTime<Utc>,
    ) -> Result<Application, ReviewError> {
        Self::require_confirmation(confirmed)?;
        let mut application = self.fetch(id)?;
        if !application.payment.has_reference() {
            return Err(ReviewError::MissingPaymentReference(id.clone()));
        }
        if application.payment.fee_paid {
            return Ok(application);
        }

        application.payment.fee_paid = true;
        application.payment.approved_by = Some(reviewer.to_string());
        application.payment.approved_at = Some(now);
        application.updated_at = now;
        self.repository.update_application(application.clone())?;
        info!(application_id = %id, %reviewer, "application fee approved");
        Ok(application)
    }

    /// Reverses a payment approval. The payment reference stays so the slip can be
    /// re-approved.
    pub fn reset_payment(
        &self,
        id: &ApplicationId,
        confirmed: bool,
        now: DateTime<Utc>,
    ) -> Result<Application, ReviewError> {
        Self::require_confirmation(confirmed)?;
        let mut application = self.fetch(id)?;
        if !application.payment.fee_paid && application.payment.approved_by.is_none() {
            return Ok(application);
        }

        application.payment.fee_paid = false;
        application.payment.approved_by = None;
        application.payment.approved_at = None;
        application.updated_at = now;
        self.repository.update_application(application.clone())?;
        info!(application_id = %id, "application fee approval reset");
        Ok(application)
    }

    pub fn verify_document(
        &self,
        id: &DocumentId,
        reviewer: &str,
    ) -> Result<ApplicationDocument, ReviewError> {
        let mut document = self
            .repository
            .document(id)?
            .ok_or_else(|| ReviewError::DocumentNotFound(id.clone()))?;
        if document.verified {
            return Ok(document);
        }

        document.verified = true;
        document.verified_by = Some(reviewer.to_string());
        self.repository.update_document(document.clone())?;
        info!(document_id = %id, %reviewer, "document verified");
        Ok(document)
    }

    /// Writes every row matching the query (pagination ignored) as CSV; returns the row count.
    pub fn export_csv<W: io::Write>(
        &self,
        query: &ApplicationQuery,
        writer: W,
    ) -> Result<usize, ReviewError> {
        let rows = self.filtered(query)?;
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record([
            "reference",
            "applicant_name",
            "email",
            "program",
            "academic_year",
            "intake_month",
            "status",
            "payment",
            "payment_slip_submitted",
            "documents",
            "submitted_at",
        ])?;
        for row in &rows {
            csv.write_record([
                row.reference
                    .as_ref()
                    .map(|code| code.to_string())
                    .unwrap_or_default(),
                row.applicant_name.clone(),
                row.email.clone(),
                row.program.clone(),
                row.academic_year.clone(),
                row.intake_month.clone(),
                row.status_label.to_string(),
                row.payment_label.to_string(),
                row.payment_slip_submitted.to_string(),
                row.document_count.to_string(),
                row.submitted_at.to_rfc3339(),
            ])?;
        }
        csv.flush().map_err(csv::Error::from)?;
        Ok(rows.len())
    }
}
