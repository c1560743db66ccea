//! Five-step "apply now" state machine as driven by a client.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::form::ApplicationForm;
use super::notify::Notifier;
use super::reconciliation::{
    PaymentReconciliation, ReconciliationError, ReconciliationView, SlipReceipt,
};
use super::reference::{ReferenceArtifact, ReferenceSlot, ReferenceStore, ReferenceStoreError};
use super::repository::AdmissionsRepository;
use super::storage::{ObjectStore, UploadFile};
use super::submission::{SubmissionError, SubmissionReceipt, SubmissionWorkflow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyStep {
    Info = 1,
    Form = 2,
    Reference = 3,
    PaymentUpload = 4,
    Success = 5,
}

impl ApplyStep {
    pub const fn number(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("cannot {action} from step {from:?}")]
    InvalidTransition { from: ApplyStep, action: &'static str },
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),
    #[error(transparent)]
    Store(#[from] ReferenceStoreError),
}

/// Client-side wizard. Only the Form→Reference and PaymentUpload→Success transitions have
/// side effects; back-navigation is allowed only before the submission call.
#[derive(Debug)]
pub struct ApplyWizard<K> {
    step: ApplyStep,
    slot: ReferenceSlot<K>,
    receipt: Option<SubmissionReceipt>,
    /// Artifact the slot failed to persist; used in its place for the rest of this session.
    unsaved: Option<ReferenceArtifact>,
}

impl<K: ReferenceStore> ApplyWizard<K> {
    pub fn new(slot: ReferenceSlot<K>) -> Self {
        Self {
            step: ApplyStep::Info,
            slot,
            receipt: None,
            unsaved: None,
        }
    }

    /// Starting over discards any stored reference.
    pub fn start_new(slot: ReferenceSlot<K>) -> Result<Self, WizardError> {
        slot.clear()?;
        Ok(Self::new(slot))
    }

    /// Resumption entry point: lands on the payment step when the stored reference is still
    /// valid, otherwise stays on `Info` with the stored artifact untouched.
    pub fn resume(slot: ReferenceSlot<K>, now: DateTime<Utc>) -> Result<Self, WizardError> {
        let resumable = slot
            .retrieve()?
            .is_some_and(|artifact| artifact.is_valid_at(now));
        let mut wizard = Self::new(slot);
        if resumable {
            wizard.step = ApplyStep::PaymentUpload;
        }
        Ok(wizard)
    }

    pub fn step(&self) -> ApplyStep {
        self.step
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    /// False when the submission went through but the reference could not be written to the
    /// client store; the session still works, but a later visit cannot resume it.
    pub fn reference_persisted(&self) -> bool {
        self.unsaved.is_none()
    }

    pub fn artifact(&self) -> Result<Option<ReferenceArtifact>, WizardError> {
        match &self.unsaved {
            Some(artifact) => Ok(Some(artifact.clone())),
            None => Ok(self.slot.retrieve()?),
        }
    }

    fn expect_step(&self, expected: ApplyStep, action: &'static str) -> Result<(), WizardError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(WizardError::InvalidTransition {
                from: self.step,
                action,
            })
        }
    }

    pub fn continue_to_form(&mut self) -> Result<ApplyStep, WizardError> {
        self.expect_step(ApplyStep::Info, "open the form")?;
        self.step = ApplyStep::Form;
        Ok(self.step)
    }

    pub fn back(&mut self) -> Result<ApplyStep, WizardError> {
        self.expect_step(ApplyStep::Form, "go back")?;
        self.step = ApplyStep::Info;
        Ok(self.step)
    }

    /// On failure the wizard stays on the form; the applicant resubmits. Once the workflow has
    /// committed, the wizard always advances, even if the client store rejects the reference.
    pub async fn submit<R, S>(
        &mut self,
        workflow: &SubmissionWorkflow<R, S>,
        form: ApplicationForm,
        now: DateTime<Utc>,
    ) -> Result<&SubmissionReceipt, WizardError>
    where
        R: AdmissionsRepository + 'static,
        S: ObjectStore + 'static,
    {
        self.expect_step(ApplyStep::Form, "submit")?;
        let receipt = workflow.submit(form, now).await?;
        self.step = ApplyStep::Reference;
        let saved = self
            .slot
            .store(&receipt.reference.code, receipt.reference.created_at);
        self.unsaved = match saved {
            Ok(_) => None,
            Err(err) => {
                warn!(
                    reference = %receipt.reference.code,
                    error = %err,
                    "reference not saved to the client store"
                );
                Some(receipt.reference.clone())
            }
        };
        Ok(self.receipt.insert(receipt))
    }

    pub fn continue_to_payment(&mut self) -> Result<ApplyStep, WizardError> {
        self.expect_step(ApplyStep::Reference, "continue to payment")?;
        self.step = ApplyStep::PaymentUpload;
        Ok(self.step)
    }

    pub fn payment_view<R, S, N>(
        &self,
        reconciliation: &PaymentReconciliation<R, S, N>,
        now: DateTime<Utc>,
    ) -> Result<ReconciliationView, WizardError>
    where
        R: AdmissionsRepository + 'static,
        S: ObjectStore + 'static,
        N: Notifier + 'static,
    {
        let artifact = self.artifact()?;
        Ok(reconciliation.load(artifact.as_ref(), now))
    }

    pub async fn upload_slip<R, S, N>(
        &mut self,
        reconciliation: &PaymentReconciliation<R, S, N>,
        file: UploadFile,
        now: DateTime<Utc>,
    ) -> Result<SlipReceipt, WizardError>
    where
        R: AdmissionsRepository + 'static,
        S: ObjectStore + 'static,
        N: Notifier + 'static,
    {
        self.expect_step(ApplyStep::PaymentUpload, "upload a payment slip")?;
        let artifact = self.artifact()?;
        let receipt = reconciliation
            .upload_slip(artifact.as_ref(), file, now)
            .await?;
        self.step = ApplyStep::Success;
        Ok(receipt)
    }
}
