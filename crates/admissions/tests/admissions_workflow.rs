use std::sync::Arc;

use admissions::workflows::applications::domain::EmergencyContact;
use admissions::workflows::applications::{
    AdmissionsServices, ApplicationForm, ApplicationQuery, ApplicationStatus, ApplyStep,
    ApplyWizard, DocumentKind, DocumentUploads, FileReferenceStore, InMemoryAdmissionsRepository,
    LocalObjectStore, LogNotifier, ObjectStore, PaymentInstructions, PaymentStatusView,
    PreviousSchool, ReconciliationView, ReferenceSlot, ReviewDecision, SessionEnd, UploadFile,
    WizardError, WorkflowSettings,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

type Services = AdmissionsServices<InMemoryAdmissionsRepository, LocalObjectStore, LogNotifier>;

fn issued_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn applicant_form(email: &str) -> ApplicationForm {
    let mut documents = DocumentUploads::default();
    documents.set(
        DocumentKind::Transcript,
        UploadFile::new("Transcript.PDF", b"%PDF-1.7 transcript".to_vec()),
    );
    documents.set(
        DocumentKind::Passport,
        UploadFile::new("passport.png", vec![0x89, b'P', b'N', b'G']),
    );

    ApplicationForm {
        first_name: "Kiran".to_string(),
        last_name: "Silva".to_string(),
        middle_name: Some("A".to_string()),
        preferred_name: None,
        birth_date: NaiveDate::from_ymd_opt(2012, 2, 20).expect("valid birth date"),
        gender: "Male".to_string(),
        citizenship_type: "resident".to_string(),
        citizenship_country: "India".to_string(),
        email: email.to_string(),
        phone: "+94 76 000 1111".to_string(),
        address_line: "88 Station Road".to_string(),
        city: "Negombo".to_string(),
        region: None,
        postal_code: None,
        country: "Sri Lanka".to_string(),
        emergency_contact: EmergencyContact {
            name: "Priya Silva".to_string(),
            relationship: "mother".to_string(),
            phone: "+94 76 000 2222".to_string(),
        },
        grade: "9".to_string(),
        intake_period: "January".to_string(),
        previous_school: PreviousSchool {
            name: "Seaside Academy".to_string(),
            location: "Negombo".to_string(),
            start_date: NaiveDate::from_ymd_opt(2018, 1, 8),
            end_date: NaiveDate::from_ymd_opt(2025, 12, 12),
            grade_completed: "8".to_string(),
        },
        has_agent: true,
        declaration_signed: true,
        documents,
    }
}

async fn services(root: &std::path::Path) -> (Arc<Services>, Arc<LocalObjectStore>) {
    let store = Arc::new(
        LocalObjectStore::new(root.join("objects"), "https://files.example.test")
            .await
            .expect("local store"),
    );
    let services = Arc::new(AdmissionsServices::new(
        Arc::new(InMemoryAdmissionsRepository::seeded()),
        Arc::clone(&store),
        Arc::new(LogNotifier),
        WorkflowSettings::default(),
        Some("token".to_string()),
    ));
    (services, store)
}

#[tokio::test]
async fn application_moves_from_submission_to_paid_approval() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (services, store) = services(temp.path()).await;
    let reference_file = temp.path().join("client").join("current_application.json");
    let settings = WorkflowSettings::default();

    let mut wizard = ApplyWizard::start_new(ReferenceSlot::new(FileReferenceStore::new(
        &reference_file,
    )))
    .expect("fresh wizard");
    wizard.continue_to_form().expect("open form");
    let receipt = wizard
        .submit(
            &services.submission,
            applicant_form("kiran.silva@example.net"),
            issued_at(),
        )
        .await
        .expect("submission succeeds")
        .clone();

    assert!(!receipt.is_incomplete());
    assert_eq!(receipt.intake_month, "January");
    assert_eq!(receipt.documents.len(), 2);
    for document in &receipt.documents {
        assert!(document.url.starts_with("https://files.example.test/"));
        let path = document
            .url
            .trim_start_matches("https://files.example.test/")
            .split_once('/')
            .map(|(_, path)| path.to_string())
            .expect("bucket prefix");
        let bytes = store
            .download(&settings.documents_bucket, &path)
            .await
            .expect("document stored on disk");
        assert!(!bytes.is_empty());
    }

    let instructions = PaymentInstructions::from_receipt(&receipt, &settings.bank).render_text();
    assert!(instructions.contains(receipt.reference.code.as_str()));
    assert!(instructions.contains(&settings.bank.account_number));

    drop(wizard);
    let mut resumed = ApplyWizard::resume(
        ReferenceSlot::new(FileReferenceStore::new(&reference_file)),
        issued_at() + Duration::hours(6),
    )
    .expect("resume from disk");
    assert_eq!(resumed.step(), ApplyStep::PaymentUpload);

    let view = resumed
        .payment_view(&services.reconciliation, issued_at() + Duration::hours(6))
        .expect("view");
    let summary = view.summary().expect("payment step is open");
    assert_eq!(summary.applicant_name, "Kiran A Silva");
    assert_eq!(summary.payment_slips_received, 0);

    let slip = resumed
        .upload_slip(
            &services.reconciliation,
            UploadFile::new("slip.jpeg", vec![0xFF, 0xD8]),
            issued_at() + Duration::hours(7),
        )
        .await
        .expect("slip accepted");
    assert_eq!(resumed.step(), ApplyStep::Success);
    assert!(slip.notified);

    let review = &services.review;
    let dossier = review
        .dossier(&receipt.application_id)
        .expect("dossier loads");
    assert_eq!(dossier.payment_slips.len(), 1);
    assert!(matches!(
        dossier.payment,
        PaymentStatusView::AwaitingApproval { .. }
    ));

    let decided_at = issued_at() + Duration::days(1);
    review
        .approve_payment(&receipt.application_id, "registrar", true, decided_at)
        .expect("payment approved");
    let approved = review
        .transition(&receipt.application_id, ReviewDecision::Approve, true, decided_at)
        .expect("application approved");
    assert_eq!(approved.status, ApplicationStatus::Approved);
    assert!(approved.payment.fee_paid);

    let mut csv = Vec::new();
    let rows = review
        .export_csv(&ApplicationQuery::default(), &mut csv)
        .expect("export");
    assert_eq!(rows, 1);
    let csv = String::from_utf8(csv).expect("utf8 csv");
    assert!(csv.contains(receipt.reference.code.as_str()));
    assert!(csv.contains("kiran.silva@example.net"));
}

#[tokio::test]
async fn stale_reference_closes_the_payment_step() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (services, store) = services(temp.path()).await;
    let reference_file = temp.path().join("current_application.json");

    let mut wizard = ApplyWizard::new(ReferenceSlot::new(FileReferenceStore::new(
        &reference_file,
    )));
    wizard.continue_to_form().expect("open form");
    wizard
        .submit(
            &services.submission,
            applicant_form("late.payer@example.net"),
            issued_at(),
        )
        .await
        .expect("submission succeeds");
    wizard.continue_to_payment().expect("continue");

    let expired_at = issued_at() + Duration::hours(49);
    assert_eq!(
        wizard
            .payment_view(&services.reconciliation, expired_at)
            .expect("view"),
        ReconciliationView::Expired {
            reason: SessionEnd::Expired
        }
    );

    let error = wizard
        .upload_slip(
            &services.reconciliation,
            UploadFile::new("slip.pdf", b"%PDF".to_vec()),
            expired_at,
        )
        .await
        .expect_err("window closed");
    assert!(matches!(error, WizardError::Reconciliation(ref err) if err.is_session_end()));
    assert_eq!(wizard.step(), ApplyStep::PaymentUpload);

    let settings = WorkflowSettings::default();
    assert!(store
        .download(&settings.payments_bucket, "anything/payment_slip/0.pdf")
        .await
        .is_err());
}
