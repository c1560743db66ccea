use super::domain::{
    AcademicHistory, Applicant, ApplicantId, Application, ApplicationDocument, ApplicationId,
    DocumentId, NewAcademicHistory, NewApplicant, NewApplication, NewDocument, Program, ProgramId,
    ReferenceCode,
};

/// Storage abstraction over the admissions tables (`applicants`, `programs`, `applications`,
/// `academic_histories`, `application_documents`) so the workflows can be exercised in isolation.
///
/// Inserts return the stored row with its identifier assigned, the way an
/// `INSERT .. RETURNING *` against the hosted database does.
pub trait AdmissionsRepository: Send + Sync {
    fn insert_applicant(&self, applicant: NewApplicant) -> Result<Applicant, RepositoryError>;
    /// Second phase of applicant creation: attach the issued reference code.
    fn assign_reference(
        &self,
        applicant_id: &ApplicantId,
        code: &ReferenceCode,
    ) -> Result<Applicant, RepositoryError>;
    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError>;
    fn applicant_by_reference(
        &self,
        code: &ReferenceCode,
    ) -> Result<Option<Applicant>, RepositoryError>;

    fn program_by_grade(&self, grade: u8, stream: &str)
        -> Result<Option<Program>, RepositoryError>;
    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError>;

    fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError>;
    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError>;
    fn application_for_applicant(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<Application>, RepositoryError>;
    fn applications(&self) -> Result<Vec<Application>, RepositoryError>;
    fn update_application(&self, application: Application) -> Result<(), RepositoryError>;

    fn insert_academic_history(
        &self,
        history: NewAcademicHistory,
    ) -> Result<AcademicHistory, RepositoryError>;
    fn academic_history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<AcademicHistory>, RepositoryError>;

    fn insert_document(&self, document: NewDocument)
        -> Result<ApplicationDocument, RepositoryError>;
    fn document(&self, id: &DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError>;
    fn documents(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError>;
    fn update_document(&self, document: ApplicationDocument) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    /// Constraint or permission failure reported by the backing store, message verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
