use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::applications::domain::{
    AcademicHistory, Applicant, ApplicantId, Application, ApplicationDocument, ApplicationId,
    DocumentId, DocumentKind, EmergencyContact, NewAcademicHistory, NewApplicant, NewApplication,
    NewDocument, Program, ProgramId, ReferenceCode,
};
use crate::workflows::applications::form::{ApplicationForm, DocumentUploads, PreviousSchool};
use crate::workflows::applications::notify::{Notifier, NotifyError, PaymentSlipNotice};
use crate::workflows::applications::reference::{
    ReferenceArtifact, ReferenceStore, ReferenceStoreError,
};
use crate::workflows::applications::repository::{AdmissionsRepository, RepositoryError};
use crate::workflows::applications::storage::{
    MemoryObjectStore, ObjectKey, ObjectStore, StorageError, StoredObject, UploadFile,
};
use crate::workflows::applications::{
    AdmissionsServices, InMemoryAdmissionsRepository, PaymentReconciliation, SubmissionWorkflow,
    WorkflowSettings,
};

pub(super) const ADMIN_TOKEN: &str = "test-admin-token";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn pdf(name: &str) -> UploadFile {
    UploadFile::new(name, b"%PDF-1.7 scanned".to_vec()).with_content_type("application/pdf")
}

pub(super) fn form() -> ApplicationForm {
    let mut documents = DocumentUploads::default();
    documents.set(DocumentKind::Transcript, pdf("transcript.pdf"));
    documents.set(DocumentKind::Passport, pdf("passport.pdf"));
    documents.set(DocumentKind::BirthCertificate, pdf("birth-certificate.pdf"));
    documents.set(
        DocumentKind::Photo,
        UploadFile::new("photo.jpg", vec![0xFF, 0xD8, 0xFF]).with_content_type("image/jpeg"),
    );

    ApplicationForm {
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        middle_name: None,
        preferred_name: Some("JD".to_string()),
        birth_date: NaiveDate::from_ymd_opt(2011, 3, 14).expect("valid date"),
        gender: "female".to_string(),
        citizenship_type: "citizen".to_string(),
        citizenship_country: "Sri Lanka".to_string(),
        email: "jane.doe@example.com".to_string(),
        phone: "+94 77 123 4567".to_string(),
        address_line: "12 Lake Road".to_string(),
        city: "Colombo".to_string(),
        region: Some("Western".to_string()),
        postal_code: Some("00300".to_string()),
        country: "Sri Lanka".to_string(),
        emergency_contact: EmergencyContact {
            name: "John Doe".to_string(),
            relationship: "father".to_string(),
            phone: "+94 77 765 4321".to_string(),
        },
        grade: "10".to_string(),
        intake_period: "september".to_string(),
        previous_school: PreviousSchool {
            name: "Hillside Primary".to_string(),
            location: "Kandy".to_string(),
            start_date: NaiveDate::from_ymd_opt(2017, 1, 9),
            end_date: NaiveDate::from_ymd_opt(2026, 7, 31),
            grade_completed: "9".to_string(),
        },
        has_agent: false,
        declaration_signed: true,
        documents,
    }
}

pub(super) fn settings() -> WorkflowSettings {
    WorkflowSettings::default()
}

pub(super) fn submission_workflow(
    repository: Arc<InMemoryAdmissionsRepository>,
    store: Arc<MemoryObjectStore>,
) -> SubmissionWorkflow<InMemoryAdmissionsRepository, MemoryObjectStore> {
    SubmissionWorkflow::new(repository, store, settings())
}

pub(super) fn reconciliation<N: Notifier + 'static>(
    repository: Arc<InMemoryAdmissionsRepository>,
    store: Arc<MemoryObjectStore>,
    notifier: Arc<N>,
) -> PaymentReconciliation<InMemoryAdmissionsRepository, MemoryObjectStore, N> {
    PaymentReconciliation::new(repository, store, notifier, settings())
}

pub(super) fn services() -> (
    Arc<AdmissionsServices<InMemoryAdmissionsRepository, MemoryObjectStore, RecordingNotifier>>,
    Arc<InMemoryAdmissionsRepository>,
    Arc<RecordingNotifier>,
) {
    let repository = Arc::new(InMemoryAdmissionsRepository::seeded());
    let notifier = Arc::new(RecordingNotifier::default());
    let services = Arc::new(AdmissionsServices::new(
        repository.clone(),
        Arc::new(MemoryObjectStore::default()),
        notifier.clone(),
        settings(),
        Some(ADMIN_TOKEN.to_string()),
    ));
    (services, repository, notifier)
}

/// Delegates to the in-memory repository while logging every write, optionally failing the
/// academic history insert.
#[derive(Default, Clone)]
pub(super) struct RecordingRepository {
    inner: InMemoryAdmissionsRepository,
    writes: Arc<Mutex<Vec<&'static str>>>,
    fail_academic_history: bool,
}

impl RecordingRepository {
    pub(super) fn seeded() -> Self {
        Self {
            inner: InMemoryAdmissionsRepository::seeded(),
            ..Self::default()
        }
    }

    pub(super) fn failing_academic_history() -> Self {
        Self {
            fail_academic_history: true,
            ..Self::seeded()
        }
    }

    pub(super) fn writes(&self) -> Vec<&'static str> {
        self.writes.lock().expect("write log poisoned").clone()
    }

    pub(super) fn inner(&self) -> &InMemoryAdmissionsRepository {
        &self.inner
    }

    fn record(&self, write: &'static str) {
        self.writes.lock().expect("write log poisoned").push(write);
    }
}

impl AdmissionsRepository for RecordingRepository {
    fn insert_applicant(&self, applicant: NewApplicant) -> Result<Applicant, RepositoryError> {
        self.record("applicant");
        self.inner.insert_applicant(applicant)
    }

    fn assign_reference(
        &self,
        applicant_id: &ApplicantId,
        code: &ReferenceCode,
    ) -> Result<Applicant, RepositoryError> {
        self.record("reference");
        self.inner.assign_reference(applicant_id, code)
    }

    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.applicant(id)
    }

    fn applicant_by_reference(
        &self,
        code: &ReferenceCode,
    ) -> Result<Option<Applicant>, RepositoryError> {
        self.inner.applicant_by_reference(code)
    }

    fn program_by_grade(
        &self,
        grade: u8,
        stream: &str,
    ) -> Result<Option<Program>, RepositoryError> {
        self.inner.program_by_grade(grade, stream)
    }

    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError> {
        self.inner.program(id)
    }

    fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        self.record("application");
        self.inner.insert_application(application)
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        self.inner.application(id)
    }

    fn application_for_applicant(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<Application>, RepositoryError> {
        self.inner.application_for_applicant(applicant_id)
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        self.inner.applications()
    }

    fn update_application(&self, application: Application) -> Result<(), RepositoryError> {
        self.record("application_update");
        self.inner.update_application(application)
    }

    fn insert_academic_history(
        &self,
        history: NewAcademicHistory,
    ) -> Result<AcademicHistory, RepositoryError> {
        self.record("academic_history");
        if self.fail_academic_history {
            return Err(RepositoryError::Unavailable("history table locked".to_string()));
        }
        self.inner.insert_academic_history(history)
    }

    fn academic_history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<AcademicHistory>, RepositoryError> {
        self.inner.academic_history(application_id)
    }

    fn insert_document(
        &self,
        document: NewDocument,
    ) -> Result<ApplicationDocument, RepositoryError> {
        self.record("document");
        self.inner.insert_document(document)
    }

    fn document(&self, id: &DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError> {
        self.inner.document(id)
    }

    fn documents(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError> {
        self.inner.documents(application_id)
    }

    fn update_document(&self, document: ApplicationDocument) -> Result<(), RepositoryError> {
        self.record("document_update");
        self.inner.update_document(document)
    }
}

/// Memory store that rejects uploads for one document category.
#[derive(Default, Clone)]
pub(super) struct FlakyObjectStore {
    inner: MemoryObjectStore,
    failing_category: Option<&'static str>,
}

impl FlakyObjectStore {
    pub(super) fn failing(category: &'static str) -> Self {
        Self {
            inner: MemoryObjectStore::default(),
            failing_category: Some(category),
        }
    }

    pub(super) fn paths(&self, bucket: &str) -> Vec<String> {
        self.inner.paths(bucket)
    }
}

#[async_trait]
impl ObjectStore for FlakyObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        file: &UploadFile,
    ) -> Result<StoredObject, StorageError> {
        if let Some(category) = self.failing_category {
            if key.as_str().contains(&format!("/{category}/")) {
                return Err(StorageError::Backend("bucket quota exceeded".to_string()));
            }
        }
        self.inner.upload(bucket, key, file).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        self.inner.public_url(bucket, path)
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.download(bucket, path).await
    }
}

#[derive(Default, Clone)]
pub(super) struct RecordingNotifier {
    notices: Arc<Mutex<Vec<PaymentSlipNotice>>>,
}

impl RecordingNotifier {
    pub(super) fn notices(&self) -> Vec<PaymentSlipNotice> {
        self.notices.lock().expect("notice log poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notice: &PaymentSlipNotice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .expect("notice log poisoned")
            .push(notice.clone());
        Ok(())
    }
}

pub(super) struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _notice: &PaymentSlipNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected(503))
    }
}

/// Client store that cannot be written, as with storage disabled in a browser.
pub(super) struct ReadOnlyReferenceStore;

impl ReferenceStore for ReadOnlyReferenceStore {
    fn save(&self, _artifact: &ReferenceArtifact) -> Result<(), ReferenceStoreError> {
        Err(ReferenceStoreError::Poisoned)
    }

    fn load(&self) -> Result<Option<ReferenceArtifact>, ReferenceStoreError> {
        Ok(None)
    }

    fn clear(&self) -> Result<(), ReferenceStoreError> {
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 body")
}
