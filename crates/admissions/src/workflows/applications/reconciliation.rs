use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::countdown::CountdownState;
use super::domain::{
    Applicant, Application, ApplicationDocument, ApplicationId, DocumentKind, NewDocument,
    Program, ReferenceCode,
};
use super::notify::{Notifier, PaymentSlipNotice};
use super::reference::ReferenceArtifact;
use super::repository::{AdmissionsRepository, RepositoryError};
use super::settings::WorkflowSettings;
use super::storage::{ObjectKey, ObjectStore, StorageError, UploadFile};

pub const NOT_AVAILABLE: &str = "N/A";

/// What the payment step renders for a given client artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReconciliationView {
    Expired { reason: SessionEnd },
    Ready { summary: PaymentSummary },
}

impl ReconciliationView {
    pub fn summary(&self) -> Option<&PaymentSummary> {
        match self {
            ReconciliationView::Ready { summary } => Some(summary),
            ReconciliationView::Expired { .. } => None,
        }
    }
}

/// Why the payment step cannot resume. Both only offer "start new application" or
/// "contact support".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEnd {
    NoSession,
    Expired,
}

/// Read-only summary assembled from the applicant, application, and program rows. Any row that
/// cannot be found renders as "N/A".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSummary {
    pub reference: ReferenceCode,
    pub application_id: Option<ApplicationId>,
    pub applicant_name: String,
    pub email: String,
    pub phone: String,
    pub program: String,
    pub intake: String,
    pub academic_year: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub countdown: CountdownState,
    pub payment_slips_received: usize,
}

/// Result of a successful slip upload. `fee_paid` is untouched; approval is an admin action.
#[derive(Debug, Clone, Serialize)]
pub struct SlipReceipt {
    pub reference: ReferenceCode,
    pub application_id: ApplicationId,
    pub document: ApplicationDocument,
    pub notified: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ReconciliationError {
    #[error("no application in progress; start a new application")]
    NoSession,
    #[error("reference {reference} expired at {expired_at}; start a new application")]
    Expired {
        reference: ReferenceCode,
        expired_at: DateTime<Utc>,
    },
    #[error("the payment slip is empty")]
    EmptyFile,
    #[error("no application found for reference {0}")]
    ApplicationNotResolved(ReferenceCode),
    #[error("payment slip upload failed: {0}")]
    Storage(#[from] StorageError),
    #[error("payment slip not recorded: {0}")]
    Repository(#[from] RepositoryError),
}

impl ReconciliationError {
    pub fn is_session_end(&self) -> bool {
        matches!(
            self,
            ReconciliationError::NoSession | ReconciliationError::Expired { .. }
        )
    }
}

/// Matches uploaded payment slips to applications through the reference code.
pub struct PaymentReconciliation<R, S, N> {
    repository: Arc<R>,
    store: Arc<S>,
    notifier: Arc<N>,
    settings: WorkflowSettings,
}

impl<R, S, N> PaymentReconciliation<R, S, N>
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        store: Arc<S>,
        notifier: Arc<N>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            repository,
            store,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    fn check_session<'a>(
        artifact: Option<&'a ReferenceArtifact>,
        now: DateTime<Utc>,
    ) -> Result<&'a ReferenceArtifact, ReconciliationError> {
        let artifact = artifact.ok_or(ReconciliationError::NoSession)?;
        if artifact.is_valid_at(now) {
            Ok(artifact)
        } else {
            Err(ReconciliationError::Expired {
                reference: artifact.code.clone(),
                expired_at: artifact.expires_at(),
            })
        }
    }

    /// Entry point of the payment step, both right after submission and on a later visit.
    pub fn load(
        &self,
        artifact: Option<&ReferenceArtifact>,
        now: DateTime<Utc>,
    ) -> ReconciliationView {
        match Self::check_session(artifact, now) {
            Ok(artifact) => ReconciliationView::Ready {
                summary: self.summarize(artifact, now),
            },
            Err(ReconciliationError::NoSession) => ReconciliationView::Expired {
                reason: SessionEnd::NoSession,
            },
            Err(_) => ReconciliationView::Expired {
                reason: SessionEnd::Expired,
            },
        }
    }

    fn lookup<T>(
        &self,
        what: &'static str,
        reference: &ReferenceCode,
        result: Result<Option<T>, RepositoryError>,
    ) -> Option<T> {
        match result {
            Ok(found) => found,
            Err(err) => {
                warn!(%reference, lookup = what, error = %err, "payment summary lookup failed");
                None
            }
        }
    }

    fn summarize(&self, artifact: &ReferenceArtifact, now: DateTime<Utc>) -> PaymentSummary {
        let reference = &artifact.code;
        let applicant: Option<Applicant> = self.lookup(
            "applicant",
            reference,
            self.repository.applicant_by_reference(reference),
        );
        let application: Option<Application> = applicant.as_ref().and_then(|applicant| {
            self.lookup(
                "application",
                reference,
                self.repository.application_for_applicant(&applicant.id),
            )
        });
        let program: Option<Program> = application.as_ref().and_then(|application| {
            self.lookup(
                "program",
                reference,
                self.repository.program(&application.program_id),
            )
        });
        let payment_slips_received = application
            .as_ref()
            .and_then(|application| {
                self.lookup(
                    "documents",
                    reference,
                    self.repository.documents(&application.id).map(Some),
                )
            })
            .map(|documents| documents.iter().filter(|d| d.is_payment_slip()).count())
            .unwrap_or(0);

        let or_na = |value: Option<String>| value.unwrap_or_else(|| NOT_AVAILABLE.to_string());

        PaymentSummary {
            reference: reference.clone(),
            application_id: application.as_ref().map(|a| a.id.clone()),
            applicant_name: or_na(applicant.as_ref().map(|a| a.name.full_name())),
            email: or_na(applicant.as_ref().map(|a| a.contact.email.clone())),
            phone: or_na(applicant.as_ref().map(|a| a.contact.phone.clone())),
            program: or_na(program.as_ref().map(Program::label)),
            intake: or_na(application.as_ref().map(|a| a.intake_month.clone())),
            academic_year: or_na(application.as_ref().map(|a| a.academic_year.clone())),
            issued_at: artifact.created_at,
            expires_at: artifact.expires_at(),
            countdown: CountdownState::at(artifact, now),
            payment_slips_received,
        }
    }

    /// Stores one payment slip under the reference namespace, records it as a `payment_slip`
    /// document, and notes the reference on the application. Notification is best-effort.
    pub async fn upload_slip(
        &self,
        artifact: Option<&ReferenceArtifact>,
        file: UploadFile,
        now: DateTime<Utc>,
    ) -> Result<SlipReceipt, ReconciliationError> {
        let artifact = Self::check_session(artifact, now)?;
        if file.is_empty() || file.file_name.trim().is_empty() {
            return Err(ReconciliationError::EmptyFile);
        }

        let summary = self.summarize(artifact, now);
        let application_id = summary
            .application_id
            .clone()
            .ok_or_else(|| ReconciliationError::ApplicationNotResolved(artifact.code.clone()))?;

        let bucket = self.settings.payments_bucket.as_str();
        let key = ObjectKey::new(
            artifact.code.as_str(),
            DocumentKind::PaymentSlip.tag(),
            now,
            &file.extension(),
        );
        let stored = self.store.upload(bucket, &key, &file).await?;
        let url = self.store.public_url(bucket, &stored.path);

        let document = self.repository.insert_document(NewDocument {
            application_id: application_id.clone(),
            document_type: DocumentKind::PaymentSlip.tag().to_string(),
            file_name: file.file_name.clone(),
            url: url.clone(),
            size_bytes: stored.size_bytes,
            uploaded_at: now,
        })?;

        self.record_payment_reference(&application_id, &artifact.code, now)?;
        info!(reference = %artifact.code, %application_id, "payment slip received");

        let notice = PaymentSlipNotice {
            applicant_name: summary.applicant_name,
            reference: artifact.code.clone(),
            email: summary.email,
            file_url: url,
            application_id: application_id.clone(),
        };
        let notified = match self.notifier.notify(&notice).await {
            Ok(()) => true,
            Err(err) => {
                warn!(reference = %artifact.code, error = %err, "payment slip notification failed");
                false
            }
        };

        Ok(SlipReceipt {
            reference: artifact.code.clone(),
            application_id,
            document,
            notified,
        })
    }

    fn record_payment_reference(
        &self,
        application_id: &ApplicationId,
        code: &ReferenceCode,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut application = self
            .repository
            .application(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        if application.payment.has_reference() {
            return Ok(());
        }
        application.payment.payment_reference = Some(code.to_string());
        application.updated_at = now;
        self.repository.update_application(application)
    }
}
