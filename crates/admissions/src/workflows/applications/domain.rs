use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Row identifier of an `applicants` record.
    ApplicantId
);
identifier!(
    /// Row identifier of an `applications` record.
    ApplicationId
);
identifier!(
    /// Row identifier of a `programs` record.
    ProgramId
);
identifier!(
    /// Row identifier of an `academic_histories` record.
    AcademicHistoryId
);
identifier!(
    /// Row identifier of an `application_documents` record.
    DocumentId
);

/// Human-presentable application reference (the applicant's `qis_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceCode(String);

impl ReferenceCode {
    /// Normalizes user-entered codes: trims, uppercases, and rejects anything outside `[A-Z0-9-]`.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.is_empty()
            || !normalized
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        {
            return None;
        }
        Some(Self(normalized))
    }

    pub(crate) fn from_generated(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Case-insensitive parse of the form value. Unknown values are rejected rather than
    /// mapped onto a default.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

/// Intake period offered on the form. The canonical month comes from a fixed lookup table in
/// which the July key lands in the May intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakePeriod {
    January,
    May,
    July,
    September,
}

impl IntakePeriod {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "january" => Some(Self::January),
            "may" => Some(Self::May),
            "july" => Some(Self::July),
            "september" => Some(Self::September),
            _ => None,
        }
    }

    pub const fn key(self) -> &'static str {
        match self {
            IntakePeriod::January => "january",
            IntakePeriod::May => "may",
            IntakePeriod::July => "july",
            IntakePeriod::September => "september",
        }
    }

    pub const fn intake_month(self) -> &'static str {
        match self {
            IntakePeriod::January => "January",
            IntakePeriod::May | IntakePeriod::July => "May",
            IntakePeriod::September => "September",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonName {
    pub first: String,
    #[serde(default)]
    pub middle: Option<String>,
    pub last: String,
    #[serde(default)]
    pub preferred: Option<String>,
}

impl PersonName {
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.first.as_str()];
        if let Some(middle) = self.middle.as_deref().filter(|value| !value.trim().is_empty()) {
            parts.push(middle);
        }
        parts.push(self.last.as_str());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citizenship {
    pub kind: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub email: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    #[serde(default)]
    pub relationship: String,
    pub phone: String,
}

/// Insert form for the `applicants` table. The reference code is deliberately absent: it is
/// attached by a second update once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplicant {
    pub name: PersonName,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub citizenship: Citizenship,
    pub contact: ContactDetails,
    pub emergency_contact: EmergencyContact,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub name: PersonName,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub citizenship: Citizenship,
    pub contact: ContactDetails,
    pub emergency_contact: EmergencyContact,
    pub reference_code: Option<ReferenceCode>,
    pub created_at: DateTime<Utc>,
}

impl Applicant {
    pub fn from_insert(id: ApplicantId, new: NewApplicant) -> Self {
        Self {
            id,
            name: new.name,
            birth_date: new.birth_date,
            gender: new.gender,
            citizenship: new.citizenship,
            contact: new.contact,
            emergency_contact: new.emergency_contact,
            reference_code: None,
            created_at: new.created_at,
        }
    }
}

/// Grade/stream pair offered by the school. Reference data, never written by the workflows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    pub grade: u8,
    pub stream: String,
}

impl Program {
    pub fn label(&self) -> String {
        format!("Grade {} ({})", self.grade, self.stream)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "Submitted",
            ApplicationStatus::UnderReview => "Under Review",
            ApplicationStatus::Approved => "Approved",
            ApplicationStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-'], "_")
            .as_str()
        {
            "submitted" => Some(Self::Submitted),
            "under_review" => Some(Self::UnderReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Fee state carried on the application row. `fee_paid` only turns true through an admin
/// payment approval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentState {
    pub fee_paid: bool,
    pub payment_reference: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl PaymentState {
    pub fn has_reference(&self) -> bool {
        self.payment_reference
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplication {
    pub applicant_id: ApplicantId,
    pub program_id: ProgramId,
    pub academic_year: String,
    pub intake_month: String,
    pub declaration_signed: bool,
    pub declaration_date: Option<NaiveDate>,
    pub has_agent: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub applicant_id: ApplicantId,
    pub program_id: ProgramId,
    pub academic_year: String,
    pub intake_month: String,
    pub status: ApplicationStatus,
    pub declaration_signed: bool,
    pub declaration_date: Option<NaiveDate>,
    pub has_agent: bool,
    pub payment: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn from_insert(id: ApplicationId, new: NewApplication) -> Self {
        Self {
            id,
            applicant_id: new.applicant_id,
            program_id: new.program_id,
            academic_year: new.academic_year,
            intake_month: new.intake_month,
            status: ApplicationStatus::Submitted,
            declaration_signed: new.declaration_signed,
            declaration_date: new.declaration_date,
            has_agent: new.has_agent,
            payment: PaymentState::default(),
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAcademicHistory {
    pub application_id: ApplicationId,
    pub school_name: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub grade_completed: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicHistory {
    pub id: AcademicHistoryId,
    pub application_id: ApplicationId,
    pub school_name: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub grade_completed: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Transcript,
    Passport,
    BirthCertificate,
    Photo,
    PaymentSlip,
}

impl DocumentKind {
    /// Documents collected by the application form, in form order.
    pub const APPLICATION_SET: [Self; 4] = [
        Self::Transcript,
        Self::Passport,
        Self::BirthCertificate,
        Self::Photo,
    ];

    /// Type tag stored on the document row and used as the storage category.
    pub const fn tag(self) -> &'static str {
        match self {
            DocumentKind::Transcript => "transcript",
            DocumentKind::Passport => "passport",
            DocumentKind::BirthCertificate => "birth_certificate",
            DocumentKind::Photo => "photo",
            DocumentKind::PaymentSlip => "payment_slip",
        }
    }

    pub fn from_tag(raw: &str) -> Option<Self> {
        match raw.trim() {
            "transcript" => Some(Self::Transcript),
            "passport" => Some(Self::Passport),
            "birth_certificate" => Some(Self::BirthCertificate),
            "photo" => Some(Self::Photo),
            "payment_slip" => Some(Self::PaymentSlip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub application_id: ApplicationId,
    pub document_type: String,
    pub file_name: String,
    pub url: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDocument {
    pub id: DocumentId,
    pub application_id: ApplicationId,
    pub document_type: String,
    pub file_name: String,
    pub url: String,
    pub size_bytes: u64,
    pub verified: bool,
    pub verified_by: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl ApplicationDocument {
    pub fn from_insert(id: DocumentId, new: NewDocument) -> Self {
        Self {
            id,
            application_id: new.application_id,
            document_type: new.document_type,
            file_name: new.file_name,
            url: new.url,
            size_bytes: new.size_bytes,
            verified: false,
            verified_by: None,
            uploaded_at: new.uploaded_at,
        }
    }

    /// Type tags have drifted over time ("Payment Slip", "bank_slip", ...), so matching is
    /// case-insensitive and by substring.
    pub fn is_payment_slip(&self) -> bool {
        let tag = self.document_type.to_ascii_lowercase();
        tag.contains("payment") || tag.contains("slip")
    }
}
