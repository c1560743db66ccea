use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, ApplicationId, Citizenship, ContactDetails, DocumentKind, EmergencyContact,
    Gender, IntakePeriod, NewAcademicHistory, NewApplicant, PersonName,
};
use super::storage::UploadFile;

/// Raw application form as posted by the public website.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub preferred_name: Option<String>,
    pub birth_date: NaiveDate,
    pub gender: String,
    pub citizenship_type: String,
    pub citizenship_country: String,
    pub email: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    pub country: String,
    pub emergency_contact: EmergencyContact,
    pub grade: String,
    pub intake_period: String,
    pub previous_school: PreviousSchool,
    #[serde(default)]
    pub has_agent: bool,
    #[serde(default)]
    pub declaration_signed: bool,
    #[serde(skip)]
    pub documents: DocumentUploads,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousSchool {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub grade_completed: String,
}

/// File fields of the form. Transcript and passport are required; the rest are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentUploads {
    pub transcript: Option<UploadFile>,
    pub passport: Option<UploadFile>,
    pub birth_certificate: Option<UploadFile>,
    pub photo: Option<UploadFile>,
}

impl DocumentUploads {
    pub const REQUIRED: [DocumentKind; 2] = [DocumentKind::Transcript, DocumentKind::Passport];

    pub fn set(&mut self, kind: DocumentKind, file: UploadFile) -> bool {
        let slot = match kind {
            DocumentKind::Transcript => &mut self.transcript,
            DocumentKind::Passport => &mut self.passport,
            DocumentKind::BirthCertificate => &mut self.birth_certificate,
            DocumentKind::Photo => &mut self.photo,
            DocumentKind::PaymentSlip => return false,
        };
        *slot = Some(file);
        true
    }

    pub fn get(&self, kind: DocumentKind) -> Option<&UploadFile> {
        match kind {
            DocumentKind::Transcript => self.transcript.as_ref(),
            DocumentKind::Passport => self.passport.as_ref(),
            DocumentKind::BirthCertificate => self.birth_certificate.as_ref(),
            DocumentKind::Photo => self.photo.as_ref(),
            DocumentKind::PaymentSlip => None,
        }
    }

    /// Non-empty uploads in form order.
    pub fn into_present(self) -> Vec<(DocumentKind, UploadFile)> {
        [
            (DocumentKind::Transcript, self.transcript),
            (DocumentKind::Passport, self.passport),
            (DocumentKind::BirthCertificate, self.birth_certificate),
            (DocumentKind::Photo, self.photo),
        ]
        .into_iter()
        .filter_map(|(kind, file)| file.filter(|f| !f.is_empty()).map(|f| (kind, f)))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("unrecognized gender '{0}'")]
    UnrecognizedGender(String),
    #[error("unrecognized intake period '{0}'")]
    UnrecognizedIntake(String),
    #[error("previous school dates are out of order ({start} is after {end})")]
    SchoolDatesOutOfOrder { start: NaiveDate, end: NaiveDate },
    #[error("{} document is required", .0.tag())]
    MissingDocument(DocumentKind),
    #[error("the declaration must be signed before submitting")]
    DeclarationNotSigned,
}

/// Form after validation: typed enums, required values present, documents split out.
#[derive(Debug, Clone)]
pub struct ValidatedForm {
    pub name: PersonName,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub citizenship: Citizenship,
    pub contact: ContactDetails,
    pub emergency_contact: EmergencyContact,
    pub grade: String,
    pub intake: IntakePeriod,
    pub previous_school: ValidatedSchool,
    pub has_agent: bool,
    pub documents: Vec<(DocumentKind, UploadFile)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSchool {
    pub name: String,
    pub location: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub grade_completed: String,
}

impl ValidatedForm {
    pub fn new_applicant(&self, now: DateTime<Utc>) -> NewApplicant {
        NewApplicant {
            name: self.name.clone(),
            birth_date: self.birth_date,
            gender: self.gender,
            citizenship: self.citizenship.clone(),
            contact: self.contact.clone(),
            emergency_contact: self.emergency_contact.clone(),
            created_at: now,
        }
    }

    pub fn new_academic_history(&self, application_id: &ApplicationId) -> NewAcademicHistory {
        NewAcademicHistory {
            application_id: application_id.clone(),
            school_name: self.previous_school.name.clone(),
            location: self.previous_school.location.clone(),
            start_date: self.previous_school.start_date,
            end_date: self.previous_school.end_date,
            grade_completed: self.previous_school.grade_completed.clone(),
        }
    }

    /// Storage namespace for this applicant's uploads.
    pub fn namespace(applicant_id: &ApplicantId) -> &str {
        applicant_id.0.as_str()
    }
}

fn required(value: &str, field: &'static str) -> Result<String, FormError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(FormError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn plausible_email(raw: &str) -> bool {
    match raw.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !raw.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl ApplicationForm {
    pub fn validate(self) -> Result<ValidatedForm, FormError> {
        let first = required(&self.first_name, "first_name")?;
        let last = required(&self.last_name, "last_name")?;

        let gender = Gender::parse(&required(&self.gender, "gender")?)
            .ok_or_else(|| FormError::UnrecognizedGender(self.gender.trim().to_string()))?;

        let citizenship = Citizenship {
            kind: required(&self.citizenship_type, "citizenship_type")?,
            country: required(&self.citizenship_country, "citizenship_country")?,
        };

        let email = required(&self.email, "email")?;
        if !plausible_email(&email) {
            return Err(FormError::InvalidEmail(email));
        }
        let contact = ContactDetails {
            email,
            phone: required(&self.phone, "phone")?,
            address_line: required(&self.address_line, "address_line")?,
            city: required(&self.city, "city")?,
            region: optional(self.region),
            postal_code: optional(self.postal_code),
            country: required(&self.country, "country")?,
        };

        let emergency_contact = EmergencyContact {
            name: required(&self.emergency_contact.name, "emergency_contact.name")?,
            relationship: self.emergency_contact.relationship.trim().to_string(),
            phone: required(&self.emergency_contact.phone, "emergency_contact.phone")?,
        };

        let grade = required(&self.grade, "grade")?;
        let intake_raw = required(&self.intake_period, "intake_period")?;
        let intake = IntakePeriod::parse(&intake_raw)
            .ok_or(FormError::UnrecognizedIntake(intake_raw))?;

        let school = self.previous_school;
        let start_date = school
            .start_date
            .ok_or(FormError::MissingField("previous_school.start_date"))?;
        let end_date = school
            .end_date
            .ok_or(FormError::MissingField("previous_school.end_date"))?;
        if start_date > end_date {
            return Err(FormError::SchoolDatesOutOfOrder {
                start: start_date,
                end: end_date,
            });
        }
        let previous_school = ValidatedSchool {
            name: required(&school.name, "previous_school.name")?,
            location: required(&school.location, "previous_school.location")?,
            start_date,
            end_date,
            grade_completed: required(&school.grade_completed, "previous_school.grade_completed")?,
        };

        for kind in DocumentUploads::REQUIRED {
            if self.documents.get(kind).map_or(true, UploadFile::is_empty) {
                return Err(FormError::MissingDocument(kind));
            }
        }

        if !self.declaration_signed {
            return Err(FormError::DeclarationNotSigned);
        }

        Ok(ValidatedForm {
            name: PersonName {
                first,
                middle: optional(self.middle_name),
                last,
                preferred: optional(self.preferred_name),
            },
            birth_date: self.birth_date,
            gender,
            citizenship,
            contact,
            emergency_contact,
            grade,
            intake,
            previous_school,
            has_agent: self.has_agent,
            documents: self.documents.into_present(),
        })
    }
}
