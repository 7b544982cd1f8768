use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::intake::router::{intake_router, SESSION_COOKIE};
use crate::workflows::intake::session::SessionId;
use crate::workflows::intake::steps::Program;

const BOUNDARY: &str = "pathways-boundary";

async fn send(harness: &Harness, request: Request<Body>) -> Response {
    intake_router(harness.service.clone())
        .oneshot(request)
        .await
        .expect("route executes")
}

fn cookie(session_id: &SessionId) -> String {
    format!("{SESSION_COOKIE}={session_id}")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("redirect location")
}

fn form_post(uri: &str, session_id: Option<&SessionId>, body: &str) -> Request<Body> {
    let mut builder = Request::post(uri).header(
        header::CONTENT_TYPE,
        "application/x-www-form-urlencoded",
    );
    if let Some(session_id) = session_id {
        builder = builder.header(header::COOKIE, cookie(session_id));
    }
    builder.body(Body::from(body.to_string())).expect("request")
}

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

fn multipart_upload(
    uri: &str,
    session_id: &SessionId,
    file_name: &str,
    bytes: &[u8],
) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::COOKIE, cookie(session_id))
        .body(Body::from(body))
        .expect("request")
}

#[tokio::test]
async fn starting_the_wizard_sets_the_session_cookie() {
    let harness = Harness::new();

    let response = send(
        &harness,
        Request::get("/apply").body(Body::empty()).expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/apply/overview");
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("session cookie");
    assert!(set_cookie.starts_with(&format!("{SESSION_COOKIE}=")));
    assert!(set_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn guarded_step_without_cookie_redirects_to_overview() {
    let harness = Harness::new();

    let response = send(
        &harness,
        form_post("/apply/household-benefits", None, "has_household_benefits=yes"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/apply/overview");
    let issued = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .and_then(|pair| pair.split_once('='))
        .and_then(|(_, value)| SessionId::parse(value))
        .expect("cookie carries a session id");
    assert!(!harness.sessions.contains(&issued));
}

#[tokio::test]
async fn form_posts_follow_the_step_graph() {
    let harness = Harness::new();
    let session_id = harness.start(Program::Discount);

    let response = send(
        &harness,
        form_post("/apply/city-resident", Some(&session_id), "city_resident=yes"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/apply/household-size");
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn invalid_post_renders_step_with_errors() {
    let harness = Harness::new();
    let session_id = harness.start(Program::Discount);

    let response = send(
        &harness,
        form_post("/apply/city-resident", Some(&session_id), "city_resident=maybe"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["step"], "city-resident");
    assert_eq!(payload["program"], "discount");
    assert_eq!(payload["errors"][0]["field"], "city_resident");
}

#[tokio::test]
async fn unknown_step_is_not_found() {
    let harness = Harness::new();

    let response = send(
        &harness,
        Request::get("/amnesty/household-size")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn eligibility_endpoint_returns_decision() {
    let harness = Harness::new();

    let response = send(
        &harness,
        json_request(
            "POST",
            "/api/v1/eligibility",
            json!({
                "household_size": 1,
                "income": "500",
                "cadence": { "periodic": "weekly" }
            }),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["decision"]["eligible"], true);
    assert_eq!(payload["decision"]["discount_tier"], "NinetyPercent");
}

#[tokio::test]
async fn eligibility_endpoint_rejects_missing_income() {
    let harness = Harness::new();

    let response = send(
        &harness,
        json_request("POST", "/api/v1/eligibility", json!({ "household_size": 2 })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn application_lookup_and_status_update() {
    let harness = Harness::new();
    let session_id = complete_discount(&harness, Some("ana@example.com"));
    let application_id = harness
        .session(&session_id)
        .application_id
        .expect("application recorded");

    let response = send(
        &harness,
        Request::get(format!("/api/v1/applications/{application_id}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(
        payload["display"],
        format!("{application_id} - Diaz at 123 Main St")
    );
    assert_eq!(payload["discount_tier"], "NinetyPercent");
    assert_eq!(payload["discount_percent"], 90);

    let response = send(
        &harness,
        json_request(
            "PUT",
            &format!("/api/v1/applications/{application_id}/status"),
            json!({ "status": "enrolled", "notes": "verified" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["application"]["status"], "enrolled");
    assert_eq!(harness.notifier.sent().len(), 2);
}

#[tokio::test]
async fn missing_application_is_not_found() {
    let harness = Harness::new();

    let response = send(
        &harness,
        Request::get("/api/v1/amnesty/424242")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn multipart_upload_attaches_document() {
    let harness = Harness::new();
    let session_id = complete_discount(&harness, None);

    let response = send(
        &harness,
        multipart_upload("/apply/documents/income", &session_id, "stub.pdf", PDF_BYTES),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["doc_type"], "income");
    assert_eq!(payload["content_type"], "application/pdf");
}

#[tokio::test]
async fn multipart_upload_rejects_unsupported_files() {
    let harness = Harness::new();
    let session_id = complete_discount(&harness, None);

    let response = send(
        &harness,
        multipart_upload(
            "/apply/documents/income",
            &session_id,
            "stub.pdf",
            b"not really a pdf",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn late_document_pages_render() {
    let harness = Harness::new();

    let form_page = send(
        &harness,
        Request::get("/apply/later-documents")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    let outcome_page = send(
        &harness,
        Request::get("/apply/later-documents/more-info")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(form_page.status(), StatusCode::OK);
    assert_eq!(outcome_page.status(), StatusCode::OK);
    let payload = read_json_body(outcome_page).await;
    assert_eq!(payload["step"], "more-info");
}

#[tokio::test]
async fn late_document_lookup_redirects_on_no_match() {
    let harness = Harness::new();

    let response = send(
        &harness,
        form_post(
            "/apply/later-documents",
            None,
            "first_name=Ana&last_name=Diaz&zip_code=14201&phone_number=7165551234",
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/apply/later-documents/no-match");
}

#[tokio::test]
async fn purge_reports_unavailable_repository() {
    let service = service_with_applications(Arc::new(UnavailableApplications));

    let response = intake_router(service)
        .oneshot(
            Request::post("/api/v1/documents/purge")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
