//! Student admissions: application intake, reference issuance, payment-slip reconciliation,
//! and administrative review.
//!
//! Submission creates applicant, application, academic history, and document records in
//! dependency order, then issues a reference code. The reference plus its issue time is the
//! only thing a client keeps; it bounds the 48-hour window in which a bank payment slip can
//! be uploaded against the application.

pub mod countdown;
pub mod domain;
pub mod export;
pub mod form;
pub mod memory;
pub mod notify;
pub mod reconciliation;
pub mod reference;
pub mod repository;
pub mod review;
pub mod router;
pub(crate) mod settings;
pub mod storage;
pub mod submission;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use countdown::{spawn_countdown, CountdownState, COUNTDOWN_TICK};
pub use domain::{
    AcademicHistory, Applicant, ApplicantId, Application, ApplicationDocument, ApplicationId,
    ApplicationStatus, DocumentId, DocumentKind, Gender, IntakePeriod, PaymentState, Program,
    ProgramId, ReferenceCode,
};
pub use export::PaymentInstructions;
pub use form::{ApplicationForm, DocumentUploads, FormError, PreviousSchool};
pub use memory::{standard_programs, InMemoryAdmissionsRepository};
pub use notify::{LogNotifier, Notifier, NotifyError, PaymentSlipNotice, WebhookNotifier};
pub use reconciliation::{
    PaymentReconciliation, PaymentSummary, ReconciliationError, ReconciliationView, SessionEnd,
    SlipReceipt,
};
pub use reference::{
    FileReferenceStore, MemoryReferenceStore, ReferenceArtifact, ReferenceGenerator,
    ReferenceSlot, ReferenceStore, ReferenceStoreError, REFERENCE_TTL_HOURS,
};
pub use repository::{AdmissionsRepository, RepositoryError};
pub use review::{
    AdminReview, ApplicationDossier, ApplicationOverview, ApplicationPage, ApplicationQuery,
    PaymentStatusView, ReviewDecision, ReviewError,
};
pub use router::{admissions_router, AdmissionsServices};
pub use settings::{BankDetails, WorkflowSettings};
pub use storage::{
    LocalObjectStore, MemoryObjectStore, ObjectKey, ObjectStore, StorageError, StoredObject,
    UploadFile,
};
pub use submission::{DocumentFailure, SubmissionError, SubmissionReceipt, SubmissionWorkflow};
pub use wizard::{ApplyStep, ApplyWizard, WizardError};
