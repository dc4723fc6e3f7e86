use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use student_dashboard::app::{
    AppState, NO_DATA_MESSAGE, REFRESHED_MESSAGE, SESSION_EXPIRED_MESSAGE, router,
};
use student_dashboard::{DashboardConfig, DashboardError, MemorySource};

const HEADER: &[&str] = &[
    "MM",
    "Student ID",
    "Student",
    "Date",
    "Subject",
    "Hr",
    "Teachers Name",
    "Chapter taken",
    "Type of class",
];

fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|r| r.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn april_rows() -> Vec<Vec<String>> {
    rows(&[
        HEADER,
        &["04", "ST001", "Asha Menon", "01/04", "Math", "2", "Ravi", "Algebra", "Online"],
        &["04", "ST001", "Asha Menon", "03/04", "Math", "", "Ravi", "Algebra", "Online"],
        &["04", "ST001", "Asha Menon", "05/04", "Sci", "1", "Mini", "Cells", "Offline"],
        &["05", "ST002", "Arun Kumar", "02/05", "Sci", "3", "Mini", "Cells", "Online"],
    ])
}

fn app_with(source: MemorySource) -> (Arc<AppState<MemorySource>>, Router) {
    let state = Arc::new(AppState::new(source, DashboardConfig::default()));
    let app = router(state.clone(), PathBuf::from("static"));
    (state, app)
}

async fn send(app: &Router, request: Request<Body>) -> (Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (cookie, serde_json::from_slice(&body).unwrap())
}

/// Load the page like a browser would and return the session cookie.
async fn open_session(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .unwrap()
}

fn get_state(cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/api/state");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn verify_body(month: &str, id: &str, name: &str) -> Value {
    json!({ "month": month, "student_id": id, "name": name })
}

fn messages(state: &Value) -> Vec<String> {
    state["notices"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["message"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn page_embeds_initial_state_and_sets_cookie() {
    let (_, app) = app_with(MemorySource::new("Student Data", april_rows()));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers().get(header::SET_COOKIE).unwrap();
    assert!(cookie.to_str().unwrap().starts_with("session="));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("const DASHBOARD_STATE = "));
    assert!(html.contains(r#""months":["04","05"]"#));
    assert!(html.contains("Angle Belearn: Student Dashboard"));
}

#[tokio::test]
async fn verified_student_sees_totals() {
    let (_, app) = app_with(MemorySource::new("Student Data", april_rows()));
    let cookie = open_session(&app).await;
    let (_, state) = send(&app, get_state(Some(&cookie))).await;
    assert_eq!(state["state"], "loaded");

    let (_, state) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", " st001 ", "MENON")),
    )
    .await;

    assert_eq!(state["state"], "verified");
    let summary = &state["summary"];
    assert_eq!(summary["welcome"], "Welcome, Asha Menon!");
    // The blank Hr cell is forward-filled from the row above.
    assert_eq!(summary["total_line"], "Total Hours for 04th month: 5.00");
    assert_eq!(summary["sessions"].as_array().unwrap().len(), 3);
    assert_eq!(
        summary["subject_hours"],
        json!([
            { "Subject": "Math", "Total Hours": 4.0 },
            { "Subject": "Sci", "Total Hours": 1.0 }
        ])
    );
}

#[tokio::test]
async fn failed_lookups_are_indistinguishable() {
    let (_, app) = app_with(MemorySource::new("Student Data", april_rows()));
    let cookie = open_session(&app).await;

    let (_, wrong_id) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", "st999", "asha")),
    )
    .await;
    let (_, wrong_name) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", "st001", "kumar")),
    )
    .await;

    assert_eq!(wrong_id["notices"], wrong_name["notices"]);
    assert_eq!(
        messages(&wrong_id),
        vec![DashboardError::VerificationFailed.to_string()]
    );
    assert!(wrong_id["summary"].is_null());
}

#[tokio::test]
async fn short_name_fragment_is_rejected() {
    let (_, app) = app_with(MemorySource::new("Student Data", april_rows()));
    let cookie = open_session(&app).await;

    let (_, state) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", "st001", "as")),
    )
    .await;
    assert_eq!(state["state"], "loaded");
    assert_eq!(state["notices"][0]["severity"], "warning");
}

#[tokio::test]
async fn refresh_drops_stale_rows() {
    let (app_state, app) = app_with(MemorySource::new("Student Data", april_rows()));
    let cookie = open_session(&app).await;

    let (_, state) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", "st001", "asha")),
    )
    .await;
    assert_eq!(state["state"], "verified");

    app_state.source().set_rows(rows(&[
        HEADER,
        &["06", "ST003", "Meera Nair", "01/06", "Math", "1", "Ravi", "Sets", "Online"],
    ]));
    let (_, state) = send(&app, post("/api/refresh", &cookie, json!({}))).await;
    assert_eq!(state["state"], "loaded");
    assert_eq!(state["months"], json!(["06"]));
    assert_eq!(messages(&state), vec![REFRESHED_MESSAGE.to_string()]);

    let (_, state) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", "st001", "asha")),
    )
    .await;
    assert_eq!(
        messages(&state),
        vec![DashboardError::VerificationFailed.to_string()]
    );
}

#[tokio::test]
async fn sessions_keep_their_own_cache() {
    let (app_state, app) = app_with(MemorySource::new("Student Data", april_rows()));
    let first = open_session(&app).await;

    app_state.source().set_rows(rows(&[
        HEADER,
        &["06", "ST003", "Meera Nair", "01/06", "Math", "1", "Ravi", "Sets", "Online"],
    ]));
    let second = open_session(&app).await;
    assert_ne!(second, first);
    let (_, state) = send(&app, get_state(Some(&second))).await;
    assert_eq!(state["months"], json!(["06"]));

    // The first session still sees what it loaded.
    let (cookie, state) = send(&app, get_state(Some(&first))).await;
    assert!(cookie.is_none());
    assert_eq!(state["months"], json!(["04", "05"]));
    assert_eq!(app_state.source().fetch_count(), 2);
    assert_eq!(app_state.sessions().len(), 2);
}

#[tokio::test]
async fn fetch_failure_is_reported_not_fatal() {
    let (_, app) = app_with(MemorySource::failing(
        "Student Data",
        DashboardError::SpreadsheetNotFound("abc".to_string()),
    ));

    let cookie = open_session(&app).await;
    let (_, state) = send(&app, get_state(Some(&cookie))).await;
    assert_eq!(state["state"], "loaded");
    assert_eq!(state["months"], json!([]));
    assert_eq!(
        messages(&state),
        vec![
            DashboardError::SpreadsheetNotFound("abc".to_string()).to_string(),
            NO_DATA_MESSAGE.to_string(),
        ]
    );
    assert_eq!(state["notices"][0]["severity"], "error");
}

#[tokio::test]
async fn missing_month_column_lists_columns() {
    let (_, app) = app_with(MemorySource::new(
        "Student Data",
        rows(&[&["Student", "Hr"], &["Asha", "1"]]),
    ));

    let cookie = open_session(&app).await;
    let (_, state) = send(&app, get_state(Some(&cookie))).await;
    let notices = messages(&state);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("'MM' column"));
    assert!(notices[0].contains("Student, Hr"));

    // Verifying against the same sheet does not repeat the notice.
    let (_, state) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", "st001", "asha")),
    )
    .await;
    assert_eq!(messages(&state), notices);
}

#[tokio::test]
async fn verify_after_failed_fetch_names_the_real_cause() {
    let (_, app) = app_with(MemorySource::failing(
        "Student Data",
        DashboardError::SpreadsheetNotFound("abc".to_string()),
    ));
    let cookie = open_session(&app).await;

    let (_, state) = send(
        &app,
        post("/api/verify", &cookie, verify_body("04", "st001", "asha")),
    )
    .await;
    assert_eq!(state["state"], "loaded");
    assert_eq!(
        messages(&state),
        vec![
            DashboardError::SpreadsheetNotFound("abc".to_string()).to_string(),
            NO_DATA_MESSAGE.to_string(),
        ]
    );
}

#[tokio::test]
async fn api_calls_without_a_session_do_not_fetch() {
    let (app_state, app) = app_with(MemorySource::new("Student Data", april_rows()));

    let (cookie, state) = send(&app, get_state(None)).await;
    assert!(cookie.is_none());
    assert_eq!(state["state"], "uninitialized");
    assert_eq!(messages(&state), vec![SESSION_EXPIRED_MESSAGE.to_string()]);

    let (_, state) = send(
        &app,
        post("/api/verify", "session=unknown", verify_body("04", "st001", "asha")),
    )
    .await;
    assert!(state["summary"].is_null());
    let (_, _) = send(&app, post("/api/refresh", "session=unknown", json!({}))).await;

    assert_eq!(app_state.source().fetch_count(), 0);
    assert!(app_state.sessions().is_empty());
}
