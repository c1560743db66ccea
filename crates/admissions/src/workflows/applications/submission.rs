use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    Applicant, ApplicantId, Application, ApplicationDocument, ApplicationId, DocumentKind,
    NewApplication, NewDocument, Program,
};
use super::form::{ApplicationForm, FormError, ValidatedForm};
use super::reference::{ReferenceArtifact, ReferenceGenerator};
use super::repository::{AdmissionsRepository, RepositoryError};
use super::settings::WorkflowSettings;
use super::storage::{ObjectKey, ObjectStore, StorageError, UploadFile};

const MAX_REFERENCE_ATTEMPTS: usize = 5;

/// Known backend messages and the wording shown to applicants instead. Matched
/// case-insensitively by substring; anything else is shown verbatim.
const KNOWN_MESSAGES: &[(&str, &str)] = &[
    (
        "invalid api key",
        "The admissions service is not configured correctly. Please contact the school office.",
    ),
    (
        "jwt expired",
        "Your session has expired. Please reload the page and submit the form again.",
    ),
    (
        "duplicate key value",
        "An application with these details already exists.",
    ),
    (
        "applications_program_id_fkey",
        "The selected program is not available. Please choose another grade.",
    ),
    (
        "applications_applicant_id_fkey",
        "Your applicant details were not saved. Please submit the form again.",
    ),
    (
        "repository unavailable",
        "We could not reach the admissions service. Please check your connection and try again.",
    ),
];

pub fn user_facing_message(raw: &str) -> String {
    let lowered = raw.to_ascii_lowercase();
    KNOWN_MESSAGES
        .iter()
        .find(|(needle, _)| lowered.contains(needle))
        .map(|(_, message)| (*message).to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Orchestrates applicant, application, history, documents, and reference creation.
pub struct SubmissionWorkflow<R, S> {
    repository: Arc<R>,
    store: Arc<S>,
    generator: ReferenceGenerator,
    settings: WorkflowSettings,
}

impl<R, S> SubmissionWorkflow<R, S>
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
{
    pub fn new(repository: Arc<R>, store: Arc<S>, settings: WorkflowSettings) -> Self {
        let generator = ReferenceGenerator::new(settings.reference_prefix.clone());
        Self {
            repository,
            store,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Submit a validated form. Steps run in dependency order; applicant, program, and
    /// application failures abort, while history and document failures are absorbed and
    /// reported on the receipt. Nothing is rolled back on abort.
    pub async fn submit(
        &self,
        form: ApplicationForm,
        now: DateTime<Utc>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let mut form = form.validate()?;
        let documents = std::mem::take(&mut form.documents);

        let applicant = self
            .repository
            .insert_applicant(form.new_applicant(now))
            .map_err(SubmissionError::Applicant)?;
        info!(applicant_id = %applicant.id, "applicant created");

        let program = self.resolve_program(&form.grade)?;

        let application = self
            .repository
            .insert_application(NewApplication {
                applicant_id: applicant.id.clone(),
                program_id: program.id.clone(),
                academic_year: self.settings.academic_year.clone(),
                intake_month: form.intake.intake_month().to_string(),
                declaration_signed: true,
                declaration_date: Some(now.date_naive()),
                has_agent: form.has_agent,
                created_at: now,
            })
            .map_err(SubmissionError::Application)?;
        info!(
            application_id = %application.id,
            program = %program.label(),
            intake = %application.intake_month,
            "application created"
        );

        let academic_history_recorded = match self
            .repository
            .insert_academic_history(form.new_academic_history(&application.id))
        {
            Ok(_) => true,
            Err(err) => {
                warn!(application_id = %application.id, error = %err, "academic history not recorded");
                false
            }
        };

        let (uploaded, failed) = self
            .upload_documents(&applicant.id, &application.id, documents, now)
            .await;

        let reference = self.issue_reference(&applicant, now)?;

        Ok(SubmissionReceipt {
            applicant_id: applicant.id,
            application_id: application.id,
            applicant_name: form.name.full_name(),
            email: form.contact.email,
            expires_at: reference.expires_at(),
            reference,
            program_label: program.label(),
            academic_year: application.academic_year,
            intake_month: application.intake_month,
            documents: uploaded,
            failed_documents: failed,
            academic_history_recorded,
        })
    }

    fn resolve_program(&self, grade: &str) -> Result<Program, SubmissionError> {
        let not_found = || SubmissionError::ProgramNotFound {
            grade: grade.to_string(),
            stream: self.settings.stream.clone(),
        };
        let parsed: u8 = grade.trim().parse().map_err(|_| not_found())?;
        self.repository
            .program_by_grade(parsed, &self.settings.stream)
            .map_err(SubmissionError::ProgramLookup)?
            .ok_or_else(not_found)
    }

    /// Uploads run concurrently and settle independently; one failure never cancels the rest.
    async fn upload_documents(
        &self,
        applicant_id: &ApplicantId,
        application_id: &ApplicationId,
        documents: Vec<(DocumentKind, UploadFile)>,
        now: DateTime<Utc>,
    ) -> (Vec<ApplicationDocument>, Vec<DocumentFailure>) {
        let uploads = documents.into_iter().map(|(kind, file)| async move {
            let result = self
                .upload_document(applicant_id, application_id, kind, &file, now)
                .await;
            (kind, result)
        });

        let mut uploaded = Vec::new();
        let mut failed = Vec::new();
        for (kind, result) in join_all(uploads).await {
            match result {
                Ok(document) => uploaded.push(document),
                Err(err) => {
                    warn!(
                        %application_id,
                        document = kind.tag(),
                        error = %err,
                        "document upload failed; continuing without it"
                    );
                    failed.push(DocumentFailure {
                        kind,
                        reason: err.to_string(),
                    });
                }
            }
        }
        (uploaded, failed)
    }

    async fn upload_document(
        &self,
        applicant_id: &ApplicantId,
        application_id: &ApplicationId,
        kind: DocumentKind,
        file: &UploadFile,
        now: DateTime<Utc>,
    ) -> Result<ApplicationDocument, DocumentUploadError> {
        let bucket = self.settings.documents_bucket.as_str();
        let key = ObjectKey::new(
            ValidatedForm::namespace(applicant_id),
            kind.tag(),
            now,
            &file.extension(),
        );
        let stored = self.store.upload(bucket, &key, file).await?;
        let url = self.store.public_url(bucket, &stored.path);

        let document = self.repository.insert_document(NewDocument {
            application_id: application_id.clone(),
            document_type: kind.tag().to_string(),
            file_name: file.file_name.clone(),
            url,
            size_bytes: stored.size_bytes,
            uploaded_at: now,
        })?;
        Ok(document)
    }

    /// Draws a code not yet held by any applicant and attaches it to this one.
    fn issue_reference(
        &self,
        applicant: &Applicant,
        now: DateTime<Utc>,
    ) -> Result<ReferenceArtifact, SubmissionError> {
        for _ in 0..MAX_REFERENCE_ATTEMPTS {
            let code = self.generator.generate(now);
            if self
                .repository
                .applicant_by_reference(&code)
                .map_err(SubmissionError::Reference)?
                .is_some()
            {
                continue;
            }

            match self.repository.assign_reference(&applicant.id, &code) {
                Ok(_) => {
                    info!(applicant_id = %applicant.id, reference = %code, "reference issued");
                    return Ok(ReferenceArtifact::new(code, now));
                }
                Err(RepositoryError::Conflict) => continue,
                Err(err) => return Err(SubmissionError::Reference(err)),
            }
        }

        Err(SubmissionError::ReferenceExhausted {
            attempts: MAX_REFERENCE_ATTEMPTS,
        })
    }
}

/// Outcome handed back to the applicant after a successful submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub applicant_id: ApplicantId,
    pub application_id: ApplicationId,
    pub applicant_name: String,
    pub email: String,
    pub reference: ReferenceArtifact,
    pub expires_at: DateTime<Utc>,
    pub program_label: String,
    pub academic_year: String,
    pub intake_month: String,
    pub documents: Vec<ApplicationDocument>,
    pub failed_documents: Vec<DocumentFailure>,
    pub academic_history_recorded: bool,
}

impl SubmissionReceipt {
    /// True when any document or the academic history did not make it; reviewers will see
    /// the gap.
    pub fn is_incomplete(&self) -> bool {
        !self.failed_documents.is_empty() || !self.academic_history_recorded
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub kind: DocumentKind,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
enum DocumentUploadError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("document row not recorded: {0}")]
    Repository(#[from] RepositoryError),
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] FormError),
    #[error("failed to create applicant: {0}")]
    Applicant(RepositoryError),
    #[error("program not found for grade '{grade}' in stream {stream}")]
    ProgramNotFound { grade: String, stream: String },
    #[error("program lookup failed: {0}")]
    ProgramLookup(RepositoryError),
    #[error("failed to create application: {0}")]
    Application(RepositoryError),
    #[error("failed to record reference code: {0}")]
    Reference(RepositoryError),
    #[error("no unique reference code after {attempts} attempts")]
    ReferenceExhausted { attempts: usize },
}

impl SubmissionError {
    /// Message shown to the applicant; the form must be resubmitted after any of these.
    pub fn user_message(&self) -> String {
        match self {
            SubmissionError::Validation(err) => err.to_string(),
            SubmissionError::ProgramNotFound { .. } => {
                "Program not found. Please check the selected grade and submit again.".to_string()
            }
            other => user_facing_message(&other.to_string()),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SubmissionError::Validation(_) | SubmissionError::ProgramNotFound { .. }
        )
    }
}
