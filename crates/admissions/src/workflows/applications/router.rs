use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::domain::{ApplicationId, DocumentId, DocumentKind, ReferenceCode};
use super::export::PaymentInstructions;
use super::form::ApplicationForm;
use super::notify::Notifier;
use super::reconciliation::{PaymentReconciliation, ReconciliationError, ReconciliationView};
use super::reference::ReferenceArtifact;
use super::repository::AdmissionsRepository;
use super::review::{AdminReview, ApplicationQuery, ReviewDecision, ReviewError};
use super::settings::WorkflowSettings;
use super::storage::{ObjectStore, UploadFile};
use super::submission::SubmissionWorkflow;

/// Request bodies carry up to four documents.
pub const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const REVIEWER_HEADER: &str = "x-reviewer";
const DEFAULT_REVIEWER: &str = "admin";

/// Everything the HTTP surface needs, sharing one repository and object store.
pub struct AdmissionsServices<R, S, N> {
    pub submission: SubmissionWorkflow<R, S>,
    pub reconciliation: PaymentReconciliation<R, S, N>,
    pub review: AdminReview<R>,
    /// Bearer token for `/api/v1/admin`; admin routes answer 401 when unset.
    pub admin_token: Option<String>,
}

impl<R, S, N> AdmissionsServices<R, S, N>
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    pub fn new(
        repository: Arc<R>,
        store: Arc<S>,
        notifier: Arc<N>,
        settings: WorkflowSettings,
        admin_token: Option<String>,
    ) -> Self {
        Self {
            submission: SubmissionWorkflow::new(
                Arc::clone(&repository),
                Arc::clone(&store),
                settings.clone(),
            ),
            reconciliation: PaymentReconciliation::new(
                Arc::clone(&repository),
                store,
                notifier,
                settings,
            ),
            review: AdminReview::new(repository),
            admin_token: admin_token.filter(|token| !token.trim().is_empty()),
        }
    }
}

/// Router builder exposing the public application flow and the admin review endpoints.
pub fn admissions_router<R, S, N>(services: Arc<AdmissionsServices<R, S, N>>) -> Router
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/admissions/applications",
            post(submit_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admissions/payments/lookup",
            post(lookup_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admissions/payments/instructions",
            post(instructions_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admissions/payments",
            post(payment_slip_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admin/applications",
            get(list_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admin/applications/:application_id",
            get(dossier_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admin/applications/:application_id/status",
            post(status_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admin/applications/:application_id/payment/approve",
            post(approve_payment_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admin/applications/:application_id/payment/reset",
            post(reset_payment_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admin/documents/:document_id/verify",
            post(verify_document_handler::<R, S, N>),
        )
        .route(
            "/api/v1/admin/exports/applications.csv",
            get(export_handler::<R, S, N>),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(services)
}

/// The reference artifact as echoed back by a client. Missing fields mean no session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientArtifact {
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub issued_at: Option<DateTime<Utc>>,
}

impl ClientArtifact {
    fn into_artifact(self) -> Option<ReferenceArtifact> {
        let reference = self.reference?;
        let issued_at = self.issued_at?;
        match ReferenceCode::parse(&reference) {
            Some(code) => Some(ReferenceArtifact::new(code, issued_at)),
            None => {
                debug!(%reference, "ignoring malformed reference artifact");
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub decision: ReviewDecision,
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirm: bool,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, axum::Json(payload)).into_response()
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> Response {
    error_response(error.status(), error.body_text())
}

async fn read_upload(
    field: axum::extract::multipart::Field<'_>,
) -> Result<UploadFile, Response> {
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field
        .file_name()
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());
    let content_type = field.content_type().map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error)?;
    let file = UploadFile::new(file_name, bytes.to_vec());
    Ok(match content_type {
        Some(content_type) => file.with_content_type(content_type),
        None => file,
    })
}

async fn read_application(multipart: &mut Multipart) -> Result<ApplicationForm, Response> {
    let mut form: Option<ApplicationForm> = None;
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "application" {
            let raw = field.text().await.map_err(multipart_error)?;
            let parsed = serde_json::from_str::<ApplicationForm>(&raw).map_err(|err| {
                error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    format!("invalid application form: {err}"),
                )
            })?;
            form = Some(parsed);
            continue;
        }

        match DocumentKind::from_tag(&name) {
            Some(kind) if DocumentKind::APPLICATION_SET.contains(&kind) => {
                uploads.push((kind, read_upload(field).await?));
            }
            _ => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("unexpected form field '{name}'"),
                ))
            }
        }
    }

    let mut form = form.ok_or_else(|| {
        error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "the application part is required",
        )
    })?;
    for (kind, file) in uploads {
        form.documents.set(kind, file);
    }
    Ok(form)
}

pub(crate) async fn submit_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    mut multipart: Multipart,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    let form = match read_application(&mut multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    match services.submission.submit(form, Utc::now()).await {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Err(error) if error.is_validation() => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, error.user_message())
        }
        Err(error) => {
            warn!(error = %error, "application submission failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, error.user_message())
        }
    }
}

pub(crate) async fn lookup_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    axum::Json(client): axum::Json<ClientArtifact>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    let artifact = client.into_artifact();
    let view = services.reconciliation.load(artifact.as_ref(), Utc::now());
    (StatusCode::OK, axum::Json(view)).into_response()
}

pub(crate) async fn instructions_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    axum::Json(client): axum::Json<ClientArtifact>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    let artifact = client.into_artifact();
    match services.reconciliation.load(artifact.as_ref(), Utc::now()) {
        ReconciliationView::Ready { summary } => {
            let instructions = PaymentInstructions::from_summary(
                &summary,
                &services.reconciliation.settings().bank,
            );
            (StatusCode::OK, Html(instructions.render_html())).into_response()
        }
        ReconciliationView::Expired { reason } => {
            let payload = json!({
                "state": "expired",
                "reason": reason,
                "error": "this reference has expired; start a new application",
            });
            (StatusCode::GONE, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn payment_slip_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    mut multipart: Multipart,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    let mut client = ClientArtifact::default();
    let mut slip: Option<UploadFile> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => return multipart_error(error),
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "reference" => match field.text().await {
                Ok(text) => client.reference = Some(text),
                Err(error) => return multipart_error(error),
            },
            "issued_at" => {
                let text = match field.text().await {
                    Ok(text) => text,
                    Err(error) => return multipart_error(error),
                };
                match text.trim().parse::<DateTime<Utc>>() {
                    Ok(issued_at) => client.issued_at = Some(issued_at),
                    Err(_) => {
                        return error_response(
                            StatusCode::UNPROCESSABLE_ENTITY,
                            format!("'{text}' is not an RFC 3339 timestamp"),
                        )
                    }
                }
            }
            "file" => {
                if slip.is_some() {
                    return error_response(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "upload exactly one payment slip file",
                    );
                }
                match read_upload(field).await {
                    Ok(file) => slip = Some(file),
                    Err(response) => return response,
                }
            }
            other => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("unexpected form field '{other}'"),
                )
            }
        }
    }

    let Some(file) = slip else {
        return error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "a payment slip file is required",
        );
    };

    let artifact = client.into_artifact();
    match services
        .reconciliation
        .upload_slip(artifact.as_ref(), file, Utc::now())
        .await
    {
        Ok(receipt) => (StatusCode::CREATED, axum::Json(receipt)).into_response(),
        Err(error) if error.is_session_end() => error_response(StatusCode::GONE, error.to_string()),
        Err(ReconciliationError::EmptyFile) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            ReconciliationError::EmptyFile.to_string(),
        ),
        Err(error @ ReconciliationError::ApplicationNotResolved(_)) => {
            error_response(StatusCode::NOT_FOUND, error.to_string())
        }
        Err(other) => {
            warn!(error = %other, "payment slip upload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

/// Checks the bearer token and returns the reviewer name for audit fields.
fn authorize<R, S, N>(
    services: &AdmissionsServices<R, S, N>,
    headers: &HeaderMap,
) -> Result<String, Response> {
    let Some(expected) = services.admin_token.as_deref() else {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "admin access is not configured",
        ));
    };
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);
    let accepted = presented
        .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())));
    if !accepted {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "missing or invalid admin token",
        ));
    }

    let reviewer = headers
        .get(REVIEWER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_REVIEWER);
    Ok(reviewer.to_string())
}

fn review_error_response(error: ReviewError) -> Response {
    match error {
        ReviewError::ConfirmationRequired | ReviewError::MissingPaymentReference(_) => {
            error_response(StatusCode::CONFLICT, error.to_string())
        }
        ReviewError::ApplicationNotFound(_) | ReviewError::DocumentNotFound(_) => {
            error_response(StatusCode::NOT_FOUND, error.to_string())
        }
        other => {
            warn!(error = %other, "admin request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

pub(crate) async fn list_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    headers: HeaderMap,
    Query(query): Query<ApplicationQuery>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    if let Err(response) = authorize(&services, &headers) {
        return response;
    }
    match services.review.list(&query) {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn dossier_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    if let Err(response) = authorize(&services, &headers) {
        return response;
    }
    match services.review.dossier(&ApplicationId(application_id)) {
        Ok(dossier) => (StatusCode::OK, axum::Json(dossier)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn status_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<StatusRequest>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    if let Err(response) = authorize(&services, &headers) {
        return response;
    }
    let id = ApplicationId(application_id);
    match services
        .review
        .transition(&id, request.decision, request.confirm, Utc::now())
    {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn approve_payment_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ConfirmRequest>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    let reviewer = match authorize(&services, &headers) {
        Ok(reviewer) => reviewer,
        Err(response) => return response,
    };
    let id = ApplicationId(application_id);
    match services
        .review
        .approve_payment(&id, &reviewer, request.confirm, Utc::now())
    {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn reset_payment_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    headers: HeaderMap,
    Path(application_id): Path<String>,
    axum::Json(request): axum::Json<ConfirmRequest>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    if let Err(response) = authorize(&services, &headers) {
        return response;
    }
    let id = ApplicationId(application_id);
    match services
        .review
        .reset_payment(&id, request.confirm, Utc::now())
    {
        Ok(application) => (StatusCode::OK, axum::Json(application)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn verify_document_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    headers: HeaderMap,
    Path(document_id): Path<String>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    let reviewer = match authorize(&services, &headers) {
        Ok(reviewer) => reviewer,
        Err(response) => return response,
    };
    match services
        .review
        .verify_document(&DocumentId(document_id), &reviewer)
    {
        Ok(document) => (StatusCode::OK, axum::Json(document)).into_response(),
        Err(error) => review_error_response(error),
    }
}

pub(crate) async fn export_handler<R, S, N>(
    State(services): State<Arc<AdmissionsServices<R, S, N>>>,
    headers: HeaderMap,
    Query(query): Query<ApplicationQuery>,
) -> Response
where
    R: AdmissionsRepository + 'static,
    S: ObjectStore + 'static,
    N: Notifier + 'static,
{
    if let Err(response) = authorize(&services, &headers) {
        return response;
    }
    let mut buffer = Vec::new();
    match services.review.export_csv(&query, &mut buffer) {
        Ok(rows) => {
            debug!(rows, "applications exported");
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (
                        header::CONTENT_DISPOSITION,
                        "attachment; filename=\"applications.csv\"",
                    ),
                ],
                buffer,
            )
                .into_response()
        }
        Err(error) => review_error_response(error),
    }
}
