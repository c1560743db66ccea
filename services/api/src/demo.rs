use crate::cli::reference_path;
use admissions::error::AppError;
use admissions::workflows::applications::domain::EmergencyContact;
use admissions::workflows::applications::{
    AdmissionsServices, ApplicationForm, ApplicationQuery, ApplyWizard, DocumentKind,
    DocumentUploads, FileReferenceStore, InMemoryAdmissionsRepository, LogNotifier,
    MemoryObjectStore, PaymentInstructions, PreviousSchool, ReconciliationView, ReferenceSlot,
    ReviewDecision, UploadFile, WorkflowSettings,
};
use chrono::{Duration, NaiveDate, Utc};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Grade the demo applicant applies for
    #[arg(long, default_value = "10")]
    pub(crate) grade: String,
    /// Intake key as the website submits it (september, january, july)
    #[arg(long, default_value = "september")]
    pub(crate) intake: String,
    /// Hours between issuing the reference and uploading the slip
    #[arg(long, default_value_t = 2)]
    pub(crate) upload_after_hours: i64,
    /// Stop after the payment step instead of walking through admin approval
    #[arg(long)]
    pub(crate) skip_review: bool,
    /// Applicant birth date (YYYY-MM-DD)
    #[arg(long, default_value = "2011-06-02")]
    pub(crate) birth_date: NaiveDate,
    /// Reference file to write instead of ADMISSIONS_REFERENCE_STORE
    #[arg(long)]
    pub(crate) reference_file: Option<PathBuf>,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        grade,
        intake,
        upload_after_hours,
        skip_review,
        birth_date,
        reference_file,
    } = args;
    let reference_file = reference_path(reference_file)?;

    let services = AdmissionsServices::new(
        Arc::new(InMemoryAdmissionsRepository::seeded()),
        Arc::new(MemoryObjectStore::default()),
        Arc::new(LogNotifier),
        WorkflowSettings::default(),
        None,
    );
    let bank = services.submission.settings().bank.clone();
    let mut wizard = ApplyWizard::start_new(ReferenceSlot::new(FileReferenceStore::new(
        &reference_file,
    )))?;
    let issued_at = Utc::now();

    println!("Admissions demo");
    println!("Step {}: program information", wizard.step().number());
    wizard.continue_to_form()?;
    println!("Step {}: application form", wizard.step().number());

    let receipt = wizard
        .submit(
            &services.submission,
            sample_form(&grade, &intake, birth_date),
            issued_at,
        )
        .await?;
    println!(
        "\nStep 3: reference issued for {} ({})",
        receipt.applicant_name, receipt.email
    );
    println!(
        "{}",
        PaymentInstructions::from_receipt(receipt, &bank).render_text()
    );
    println!(
        "Documents stored: {} (failed: {})",
        receipt.documents.len(),
        receipt.failed_documents.len()
    );
    if !receipt.academic_history_recorded {
        println!("Academic history could not be recorded; reviewers will see the gap.");
    }
    let application_id = receipt.application_id.clone();
    if wizard.reference_persisted() {
        println!(
            "Reference saved to {}; `reference status` shows the payment window.",
            reference_file.display()
        );
    } else {
        println!(
            "Reference could not be saved to {}; this run cannot be resumed later.",
            reference_file.display()
        );
    }

    wizard.continue_to_payment()?;
    let upload_at = issued_at + Duration::hours(upload_after_hours);
    match wizard.payment_view(&services.reconciliation, upload_at)? {
        ReconciliationView::Ready { summary } => {
            println!(
                "\nStep {}: payment upload for {} ({})",
                wizard.step().number(),
                summary.reference,
                summary.countdown.label()
            );
        }
        ReconciliationView::Expired { reason } => {
            println!("\nPayment window closed ({reason:?}); start a new application.");
            return Ok(());
        }
    }

    let slip = UploadFile::new("bank-slip.jpg", vec![0xFF, 0xD8, 0xFF, 0xE0])
        .with_content_type("image/jpeg");
    let slip_receipt = wizard
        .upload_slip(&services.reconciliation, slip, upload_at)
        .await?;
    println!(
        "Step {}: payment slip stored at {}",
        wizard.step().number(),
        slip_receipt.document.url
    );

    if skip_review {
        return Ok(());
    }

    let review = &services.review;
    let reviewed_at = upload_at + Duration::hours(1);
    let page = review.list(&ApplicationQuery::default())?;
    println!("\nAdmin review: {} application(s) on file", page.total);
    review.approve_payment(&application_id, "demo-reviewer", true, reviewed_at)?;
    let application =
        review.transition(&application_id, ReviewDecision::Approve, true, reviewed_at)?;
    let dossier = review.dossier(&application_id)?;
    println!(
        "Application {} is {} with payment {}",
        application.id,
        application.status.label(),
        dossier.payment.label()
    );

    Ok(())
}

fn sample_form(grade: &str, intake: &str, birth_date: NaiveDate) -> ApplicationForm {
    let scan = |name: &str| {
        UploadFile::new(name, b"%PDF-1.7 demo scan".to_vec()).with_content_type("application/pdf")
    };
    let mut documents = DocumentUploads::default();
    documents.set(DocumentKind::Transcript, scan("transcript.pdf"));
    documents.set(DocumentKind::Passport, scan("passport.pdf"));

    ApplicationForm {
        first_name: "Amal".to_string(),
        last_name: "Perera".to_string(),
        middle_name: None,
        preferred_name: None,
        birth_date,
        gender: "male".to_string(),
        citizenship_type: "citizen".to_string(),
        citizenship_country: "Sri Lanka".to_string(),
        email: "amal.perera@example.org".to_string(),
        phone: "+94 71 555 0100".to_string(),
        address_line: "4 Temple Lane".to_string(),
        city: "Galle".to_string(),
        region: Some("Southern".to_string()),
        postal_code: None,
        country: "Sri Lanka".to_string(),
        emergency_contact: EmergencyContact {
            name: "Nimal Perera".to_string(),
            relationship: "father".to_string(),
            phone: "+94 71 555 0101".to_string(),
        },
        grade: grade.to_string(),
        intake_period: intake.to_string(),
        previous_school: PreviousSchool {
            name: "Harbour View College".to_string(),
            location: "Galle".to_string(),
            start_date: NaiveDate::from_ymd_opt(2017, 1, 9),
            end_date: NaiveDate::from_ymd_opt(2026, 7, 31),
            grade_completed: "9".to_string(),
        },
        has_agent: false,
        declaration_signed: true,
        documents,
    }
}
