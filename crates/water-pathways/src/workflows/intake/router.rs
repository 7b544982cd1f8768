use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;

use super::documents::{DocumentError, DocumentUpload};
use super::domain::{ApplicationId, ApplicationStatus, ForgivenessId};
use super::forms::FormData;
use super::service::{
    EligibilityRequest, IntakeService, StepOutcome, StepView, LATE_DOCUMENTS_PATH,
};
use super::session::SessionId;
use super::steps::Program;
use super::IntakeError;

/// Cookie carrying the wizard's [`SessionId`].
pub const SESSION_COOKIE: &str = "pathways_session";

/// Multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

/// Router exposing both wizards, late document submission and the staff JSON API.
pub fn intake_router(service: Arc<IntakeService>) -> Router {
    let body_limit = usize::try_from(service.max_upload_bytes() + MULTIPART_OVERHEAD_BYTES)
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/apply", get(start_discount))
        .route("/amnesty", get(start_amnesty))
        .route(
            LATE_DOCUMENTS_PATH,
            get(late_document_form).post(late_document_lookup),
        )
        .route("/apply/later-documents/:outcome", get(late_document_outcome))
        .route("/apply/documents/:doc_type", post(upload_document))
        .route(
            "/apply/:step",
            get(discount_step_view).post(discount_step_submit),
        )
        .route(
            "/amnesty/:step",
            get(amnesty_step_view).post(amnesty_step_submit),
        )
        .route("/api/v1/eligibility", post(estimate_handler))
        .route("/api/v1/applications/:id", get(application_handler))
        .route(
            "/api/v1/applications/:id/status",
            put(application_status_handler),
        )
        .route("/api/v1/amnesty/:id", get(amnesty_handler))
        .route("/api/v1/amnesty/:id/status", put(amnesty_status_handler))
        .route("/api/v1/documents/purge", post(purge_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(service)
}

/// Session id from the request cookie, if it carries a well-formed one.
pub(crate) fn session_from_headers(headers: &HeaderMap) -> Option<SessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| SessionId::parse(value))
}

fn session_cookie(session_id: &SessionId) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax"
    ))
    .ok()
}

fn redirect(location: &str, cookie: Option<&SessionId>) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(location) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, location);
    }
    if let Some(cookie) = cookie.and_then(session_cookie) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

fn not_found(detail: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": detail }))).into_response()
}

/// Existing session, or a fresh id the response must hand back as a cookie.
fn resolve_session(headers: &HeaderMap) -> (SessionId, bool) {
    match session_from_headers(headers) {
        Some(session_id) => (session_id, false),
        None => (SessionId::generate(), true),
    }
}

fn step_response(outcome: StepOutcome, session_id: &SessionId, issue_cookie: bool) -> Response {
    let cookie = issue_cookie.then_some(session_id);
    match outcome {
        StepOutcome::Redirect(location) => redirect(&location, cookie),
        StepOutcome::Render(view) => render(view, cookie),
    }
}

fn render(view: StepView, cookie: Option<&SessionId>) -> Response {
    let mut response = (StatusCode::OK, Json(view)).into_response();
    if let Some(cookie) = cookie.and_then(session_cookie) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

async fn start_discount(
    State(service): State<Arc<IntakeService>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    start(&service, Program::Discount, &headers)
}

async fn start_amnesty(
    State(service): State<Arc<IntakeService>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    start(&service, Program::Amnesty, &headers)
}

fn start(
    service: &IntakeService,
    program: Program,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let session_id = service.start(program, session_from_headers(headers))?;
    Ok(redirect(&program.start().path(), Some(&session_id)))
}

async fn discount_step_view(
    State(service): State<Arc<IntakeService>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    step_view(&service, Program::Discount, &slug, &headers)
}

async fn amnesty_step_view(
    State(service): State<Arc<IntakeService>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    step_view(&service, Program::Amnesty, &slug, &headers)
}

fn step_view(
    service: &IntakeService,
    program: Program,
    slug: &str,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let Some(step) = program.step(slug) else {
        return Ok(not_found(format!("unknown step '{slug}'")));
    };
    let (session_id, issue_cookie) = resolve_session(headers);
    let outcome = service.view(&session_id, step)?;
    Ok(step_response(outcome, &session_id, issue_cookie))
}

async fn discount_step_submit(
    State(service): State<Arc<IntakeService>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    step_submit(&service, Program::Discount, &slug, &headers, fields)
}

async fn amnesty_step_submit(
    State(service): State<Arc<IntakeService>>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    step_submit(&service, Program::Amnesty, &slug, &headers, fields)
}

fn step_submit(
    service: &IntakeService,
    program: Program,
    slug: &str,
    headers: &HeaderMap,
    fields: HashMap<String, String>,
) -> Result<Response, AppError> {
    let Some(step) = program.step(slug) else {
        return Ok(not_found(format!("unknown step '{slug}'")));
    };
    let (session_id, issue_cookie) = resolve_session(headers);
    let outcome = service.submit(&session_id, step, &FormData::from(fields))?;
    Ok(step_response(outcome, &session_id, issue_cookie))
}

async fn late_document_form(State(service): State<Arc<IntakeService>>) -> Response {
    render(service.late_document_view(Vec::new()), None)
}

async fn late_document_lookup(
    State(service): State<Arc<IntakeService>>,
    headers: HeaderMap,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let (session_id, issue_cookie) = resolve_session(&headers);
    let data = FormData::from(fields);
    let outcome = service.find_late_document_application(&session_id, &data)?;
    Ok(step_response(outcome, &session_id, issue_cookie))
}

async fn late_document_outcome(Path(outcome): Path<String>) -> Response {
    let message = match outcome.as_str() {
        "upload" => "We found your application. Upload your document below.",
        "no-match" => "We could not find an application matching those details.",
        "more-info" => {
            "More than one application matches. Add your address, whether you rent or own, \
             and your household size."
        }
        _ => return not_found(format!("unknown page '{outcome}'")),
    };
    (
        StatusCode::OK,
        Json(json!({ "step": outcome, "message": message })),
    )
        .into_response()
}

async fn upload_document(
    State(service): State<Arc<IntakeService>>,
    Path(doc_type): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let session_id = session_from_headers(&headers)
        .ok_or(IntakeError::Document(DocumentError::NoApplicationSelected))?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(unreadable)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(unreadable)?;
        upload = Some(DocumentUpload::new(file_name, bytes.to_vec()));
        break;
    }
    let upload = upload.ok_or(IntakeError::Document(DocumentError::MissingFile))?;

    let document = service.attach_document(&session_id, &doc_type, upload)?;
    Ok((StatusCode::CREATED, Json(document)).into_response())
}

fn unreadable(error: MultipartError) -> IntakeError {
    IntakeError::Document(DocumentError::Unreadable(error.body_text()))
}

async fn estimate_handler(
    State(service): State<Arc<IntakeService>>,
    Json(request): Json<EligibilityRequest>,
) -> Result<Response, AppError> {
    let estimate = service.estimate(&request)?;
    Ok((StatusCode::OK, Json(estimate)).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdate {
    pub status: ApplicationStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

async fn application_handler(
    State(service): State<Arc<IntakeService>>,
    Path(id): Path<u64>,
) -> Result<Response, AppError> {
    let record = service.application(ApplicationId(id))?;
    let tier = service.discount_tier(&record);
    let display = record.to_string();
    Ok((
        StatusCode::OK,
        Json(json!({
            "display": display,
            "discount_tier": tier,
            "discount_percent": tier.percent(),
            "application": record,
        })),
    )
        .into_response())
}

async fn application_status_handler(
    State(service): State<Arc<IntakeService>>,
    Path(id): Path<u64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Response, AppError> {
    let record = service.update_status(ApplicationId(id), update.status, update.notes)?;
    let tier = service.discount_tier(&record);
    let display = record.to_string();
    Ok((
        StatusCode::OK,
        Json(json!({
            "display": display,
            "discount_tier": tier,
            "discount_percent": tier.percent(),
            "application": record,
        })),
    )
        .into_response())
}

async fn amnesty_handler(
    State(service): State<Arc<IntakeService>>,
    Path(id): Path<u64>,
) -> Result<Response, AppError> {
    let record = service.amnesty_application(ForgivenessId(id))?;
    let display = record.to_string();
    Ok((
        StatusCode::OK,
        Json(json!({ "display": display, "application": record })),
    )
        .into_response())
}

async fn amnesty_status_handler(
    State(service): State<Arc<IntakeService>>,
    Path(id): Path<u64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Response, AppError> {
    let record =
        service.update_amnesty_status(ForgivenessId(id), update.status, update.notes)?;
    let display = record.to_string();
    Ok((
        StatusCode::OK,
        Json(json!({ "display": display, "application": record })),
    )
        .into_response())
}

async fn purge_handler(State(service): State<Arc<IntakeService>>) -> Result<Response, AppError> {
    let purged = service.purge_settled_documents()?;
    Ok((StatusCode::OK, Json(json!({ "purged": purged }))).into_response())
}
