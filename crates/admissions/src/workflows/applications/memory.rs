use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::domain::{
    AcademicHistory, AcademicHistoryId, Applicant, ApplicantId, Application, ApplicationDocument,
    ApplicationId, DocumentId, NewAcademicHistory, NewApplicant, NewApplication, NewDocument,
    Program, ProgramId, ReferenceCode,
};
use super::repository::{AdmissionsRepository, RepositoryError};

/// Program catalogue seeded into fresh repositories: every grade in the Science stream, plus an
/// Arts stream for the final two grades.
pub fn standard_programs() -> Vec<Program> {
    let science = (1..=12u8).map(|grade| Program {
        id: ProgramId(format!("prog-{grade:02}-science")),
        grade,
        stream: "Science".to_string(),
    });
    let arts = (11..=12u8).map(|grade| Program {
        id: ProgramId(format!("prog-{grade:02}-arts")),
        grade,
        stream: "Arts".to_string(),
    });
    science.chain(arts).collect()
}

#[derive(Default)]
struct Tables {
    applicants: BTreeMap<ApplicantId, Applicant>,
    programs: BTreeMap<ProgramId, Program>,
    applications: BTreeMap<ApplicationId, Application>,
    academic_histories: BTreeMap<AcademicHistoryId, AcademicHistory>,
    documents: BTreeMap<DocumentId, ApplicationDocument>,
}

/// Process-local repository used by the HTTP service, the CLI demo, and tests.
#[derive(Default, Clone)]
pub struct InMemoryAdmissionsRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryAdmissionsRepository {
    pub fn with_programs(programs: impl IntoIterator<Item = Program>) -> Self {
        let repository = Self::default();
        if let Ok(mut tables) = repository.tables.lock() {
            for program in programs {
                tables.programs.insert(program.id.clone(), program);
            }
        }
        repository
    }

    pub fn seeded() -> Self {
        Self::with_programs(standard_programs())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }

    pub fn applicant_count(&self) -> usize {
        self.lock().map(|tables| tables.applicants.len()).unwrap_or(0)
    }

    pub fn application_count(&self) -> usize {
        self.lock()
            .map(|tables| tables.applications.len())
            .unwrap_or(0)
    }

    pub fn academic_history_count(&self) -> usize {
        self.lock()
            .map(|tables| tables.academic_histories.len())
            .unwrap_or(0)
    }

    pub fn document_count(&self) -> usize {
        self.lock().map(|tables| tables.documents.len()).unwrap_or(0)
    }
}

fn next_id() -> String {
    Uuid::new_v4().to_string()
}

impl AdmissionsRepository for InMemoryAdmissionsRepository {
    fn insert_applicant(&self, applicant: NewApplicant) -> Result<Applicant, RepositoryError> {
        let mut tables = self.lock()?;
        let stored = Applicant::from_insert(ApplicantId(next_id()), applicant);
        tables.applicants.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn assign_reference(
        &self,
        applicant_id: &ApplicantId,
        code: &ReferenceCode,
    ) -> Result<Applicant, RepositoryError> {
        let mut tables = self.lock()?;
        let taken = tables
            .applicants
            .values()
            .any(|other| other.id != *applicant_id && other.reference_code.as_ref() == Some(code));
        if taken {
            return Err(RepositoryError::Conflict);
        }

        let applicant = tables
            .applicants
            .get_mut(applicant_id)
            .ok_or(RepositoryError::NotFound)?;
        applicant.reference_code = Some(code.clone());
        Ok(applicant.clone())
    }

    fn applicant(&self, id: &ApplicantId) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self.lock()?.applicants.get(id).cloned())
    }

    fn applicant_by_reference(
        &self,
        code: &ReferenceCode,
    ) -> Result<Option<Applicant>, RepositoryError> {
        Ok(self
            .lock()?
            .applicants
            .values()
            .find(|applicant| applicant.reference_code.as_ref() == Some(code))
            .cloned())
    }

    fn program_by_grade(
        &self,
        grade: u8,
        stream: &str,
    ) -> Result<Option<Program>, RepositoryError> {
        Ok(self
            .lock()?
            .programs
            .values()
            .find(|program| program.grade == grade && program.stream.eq_ignore_ascii_case(stream))
            .cloned())
    }

    fn program(&self, id: &ProgramId) -> Result<Option<Program>, RepositoryError> {
        Ok(self.lock()?.programs.get(id).cloned())
    }

    fn insert_application(
        &self,
        application: NewApplication,
    ) -> Result<Application, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.applicants.contains_key(&application.applicant_id) {
            return Err(RepositoryError::Rejected(
                "insert or update on table \"applications\" violates foreign key constraint \"applications_applicant_id_fkey\"".to_string(),
            ));
        }
        if !tables.programs.contains_key(&application.program_id) {
            return Err(RepositoryError::Rejected(
                "insert or update on table \"applications\" violates foreign key constraint \"applications_program_id_fkey\"".to_string(),
            ));
        }

        let stored = Application::from_insert(ApplicationId(next_id()), application);
        tables.applications.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn application(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn application_for_applicant(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<Application>, RepositoryError> {
        Ok(self
            .lock()?
            .applications
            .values()
            .filter(|application| application.applicant_id == *applicant_id)
            .max_by_key(|application| application.created_at)
            .cloned())
    }

    fn applications(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(self.lock()?.applications.values().cloned().collect())
    }

    fn update_application(&self, application: Application) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.applications.get_mut(&application.id) {
            Some(existing) => {
                *existing = application;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn insert_academic_history(
        &self,
        history: NewAcademicHistory,
    ) -> Result<AcademicHistory, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.applications.contains_key(&history.application_id) {
            return Err(RepositoryError::NotFound);
        }

        let stored = AcademicHistory {
            id: AcademicHistoryId(next_id()),
            application_id: history.application_id,
            school_name: history.school_name,
            location: history.location,
            start_date: history.start_date,
            end_date: history.end_date,
            grade_completed: history.grade_completed,
        };
        tables
            .academic_histories
            .insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn academic_history(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<AcademicHistory>, RepositoryError> {
        Ok(self
            .lock()?
            .academic_histories
            .values()
            .filter(|history| history.application_id == *application_id)
            .cloned()
            .collect())
    }

    fn insert_document(
        &self,
        document: NewDocument,
    ) -> Result<ApplicationDocument, RepositoryError> {
        let mut tables = self.lock()?;
        if !tables.applications.contains_key(&document.application_id) {
            return Err(RepositoryError::NotFound);
        }

        let stored = ApplicationDocument::from_insert(DocumentId(next_id()), document);
        tables.documents.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn document(&self, id: &DocumentId) -> Result<Option<ApplicationDocument>, RepositoryError> {
        Ok(self.lock()?.documents.get(id).cloned())
    }

    fn documents(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<ApplicationDocument>, RepositoryError> {
        let mut documents: Vec<_> = self
            .lock()?
            .documents
            .values()
            .filter(|document| document.application_id == *application_id)
            .cloned()
            .collect();
        documents.sort_by_key(|document| document.uploaded_at);
        Ok(documents)
    }

    fn update_document(&self, document: ApplicationDocument) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.documents.get_mut(&document.id) {
            Some(existing) => {
                *existing = document;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}
