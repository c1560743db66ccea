use super::common::*;
use chrono::Duration;
use std::sync::Arc;

use crate::workflows::applications::reference::{
    FileReferenceStore, MemoryReferenceStore, ReferenceSlot,
};
use crate::workflows::applications::repository::AdmissionsRepository;
use crate::workflows::applications::storage::{MemoryObjectStore, UploadFile};
use crate::workflows::applications::{
    ApplyStep, ApplyWizard, InMemoryAdmissionsRepository, ReconciliationView, SessionEnd,
    WizardError,
};

#[tokio::test]
async fn wizard_walks_all_five_steps() {
    let repository = Arc::new(InMemoryAdmissionsRepository::seeded());
    let store = Arc::new(MemoryObjectStore::default());
    let workflow = submission_workflow(repository.clone(), store.clone());
    let reconciliation = reconciliation(
        repository.clone(),
        store,
        Arc::new(RecordingNotifier::default()),
    );
    let mut wizard = ApplyWizard::new(ReferenceSlot::new(MemoryReferenceStore::default()));

    assert_eq!(wizard.step(), ApplyStep::Info);
    assert_eq!(wizard.continue_to_form().expect("open form"), ApplyStep::Form);

    let code = wizard
        .submit(&workflow, form(), now())
        .await
        .expect("submission succeeds")
        .reference
        .code
        .clone();
    assert_eq!(wizard.step(), ApplyStep::Reference);
    assert!(wizard.reference_persisted());
    let artifact = wizard.artifact().expect("slot readable").expect("stored");
    assert_eq!(artifact.code, code);
    assert_eq!(artifact.created_at, now());

    wizard.continue_to_payment().expect("continue");
    let view = wizard
        .payment_view(&reconciliation, now() + Duration::minutes(5))
        .expect("view");
    assert_eq!(view.summary().map(|s| s.reference.clone()), Some(code));

    wizard
        .upload_slip(
            &reconciliation,
            UploadFile::new("slip.pdf", vec![7; 32]),
            now() + Duration::minutes(10),
        )
        .await
        .expect("slip uploaded");
    assert_eq!(wizard.step(), ApplyStep::Success);
    assert_eq!(wizard.step().number(), 5);
}

#[tokio::test]
async fn back_is_only_available_before_submission() {
    let repository = Arc::new(InMemoryAdmissionsRepository::seeded());
    let workflow = submission_workflow(repository, Arc::new(MemoryObjectStore::default()));
    let mut wizard = ApplyWizard::new(ReferenceSlot::new(MemoryReferenceStore::default()));

    assert!(matches!(
        wizard.back(),
        Err(WizardError::InvalidTransition {
            from: ApplyStep::Info,
            ..
        })
    ));

    wizard.continue_to_form().expect("open form");
    assert_eq!(wizard.back().expect("back to info"), ApplyStep::Info);
    wizard.continue_to_form().expect("reopen form");

    wizard
        .submit(&workflow, form(), now())
        .await
        .expect("submission succeeds");
    assert!(wizard.back().is_err());
    assert_eq!(wizard.step(), ApplyStep::Reference);
}

#[tokio::test]
async fn failed_submission_stays_on_the_form() {
    let repository = Arc::new(InMemoryAdmissionsRepository::seeded());
    let workflow = submission_workflow(repository, Arc::new(MemoryObjectStore::default()));
    let mut wizard = ApplyWizard::new(ReferenceSlot::new(MemoryReferenceStore::default()));
    wizard.continue_to_form().expect("open form");
    let mut form = form();
    form.declaration_signed = false;

    let error = wizard
        .submit(&workflow, form, now())
        .await
        .expect_err("declaration unsigned");

    assert!(matches!(error, WizardError::Submission(_)));
    assert_eq!(wizard.step(), ApplyStep::Form);
    assert!(wizard.artifact().expect("slot readable").is_none());
    assert!(wizard.receipt().is_none());
}

#[tokio::test]
async fn unsaved_reference_still_advances_the_wizard() {
    let repository = Arc::new(InMemoryAdmissionsRepository::seeded());
    let store = Arc::new(MemoryObjectStore::default());
    let workflow = submission_workflow(repository.clone(), store.clone());
    let reconciliation = reconciliation(
        repository.clone(),
        store,
        Arc::new(RecordingNotifier::default()),
    );
    let mut wizard = ApplyWizard::new(ReferenceSlot::new(ReadOnlyReferenceStore));
    wizard.continue_to_form().expect("open form");

    let code = wizard
        .submit(&workflow, form(), now())
        .await
        .expect("committed submission is kept")
        .reference
        .code
        .clone();

    assert_eq!(wizard.step(), ApplyStep::Reference);
    assert!(!wizard.reference_persisted());
    assert!(wizard.receipt().is_some());
    assert_eq!(repository.application_count(), 1);
    assert_eq!(
        repository
            .applicant_by_reference(&code)
            .expect("lookup")
            .map(|applicant| applicant.reference_code),
        Some(Some(code.clone()))
    );

    wizard.continue_to_payment().expect("continue");
    let view = wizard
        .payment_view(&reconciliation, now() + Duration::minutes(5))
        .expect("view");
    assert_eq!(view.summary().map(|s| s.reference.clone()), Some(code));
    wizard
        .upload_slip(
            &reconciliation,
            UploadFile::new("slip.pdf", vec![7; 32]),
            now() + Duration::minutes(10),
        )
        .await
        .expect("slip uploaded");
    assert_eq!(wizard.step(), ApplyStep::Success);
}

#[tokio::test]
async fn upload_is_rejected_outside_the_payment_step() {
    let reconciliation = reconciliation(
        Arc::new(InMemoryAdmissionsRepository::seeded()),
        Arc::new(MemoryObjectStore::default()),
        Arc::new(RecordingNotifier::default()),
    );
    let mut wizard = ApplyWizard::new(ReferenceSlot::new(MemoryReferenceStore::default()));

    let error = wizard
        .upload_slip(&reconciliation, UploadFile::new("slip.pdf", vec![1]), now())
        .await
        .expect_err("still on the info step");

    assert!(matches!(
        error,
        WizardError::InvalidTransition {
            from: ApplyStep::Info,
            ..
        }
    ));
    assert_eq!(wizard.step(), ApplyStep::Info);
}

#[tokio::test]
async fn resume_lands_on_payment_while_reference_is_valid() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("client").join("current_application.json");
    let repository = Arc::new(InMemoryAdmissionsRepository::seeded());
    let store = Arc::new(MemoryObjectStore::default());
    let workflow = submission_workflow(repository.clone(), store.clone());

    {
        let mut wizard = ApplyWizard::start_new(ReferenceSlot::new(FileReferenceStore::new(&path)))
            .expect("fresh wizard");
        wizard.continue_to_form().expect("open form");
        wizard
            .submit(&workflow, form(), now())
            .await
            .expect("submission succeeds");
    }

    let resumed = ApplyWizard::resume(
        ReferenceSlot::new(FileReferenceStore::new(&path)),
        now() + Duration::hours(30),
    )
    .expect("resume");
    assert_eq!(resumed.step(), ApplyStep::PaymentUpload);

    let stale = ApplyWizard::resume(
        ReferenceSlot::new(FileReferenceStore::new(&path)),
        now() + Duration::hours(48),
    )
    .expect("resume");
    assert_eq!(stale.step(), ApplyStep::Info);
    let reconciliation = reconciliation(repository, store, Arc::new(RecordingNotifier::default()));
    assert_eq!(
        stale
            .payment_view(&reconciliation, now() + Duration::hours(48))
            .expect("view"),
        ReconciliationView::Expired {
            reason: SessionEnd::Expired
        }
    );
}

#[tokio::test]
async fn start_new_discards_the_stored_reference() {
    let repository = Arc::new(InMemoryAdmissionsRepository::seeded());
    let workflow = submission_workflow(repository, Arc::new(MemoryObjectStore::default()));
    let slot = ReferenceSlot::new(MemoryReferenceStore::default());
    let mut wizard = ApplyWizard::new(slot);
    wizard.continue_to_form().expect("open form");
    let code = wizard
        .submit(&workflow, form(), now())
        .await
        .expect("submission succeeds")
        .reference
        .code
        .clone();

    let slot = ReferenceSlot::new(MemoryReferenceStore::default());
    slot.store(&code, now()).expect("store");
    let fresh = ApplyWizard::start_new(slot).expect("start over");

    assert_eq!(fresh.step(), ApplyStep::Info);
    assert!(fresh.artifact().expect("slot readable").is_none());
}
