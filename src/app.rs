use axum::{
    Json, Router,
    extract::State,
    response::{Html, IntoResponse},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::DashboardConfig;
use crate::dashboard::{Dashboard, DashboardState};
use crate::error::{DashboardError, Severity};
use crate::report::StudentSummary;
use crate::session::{SESSION_COOKIE, SessionStore, SharedDashboard};
use crate::sheets::{GoogleSheetsClient, SheetSource};

const DASHBOARD_HTML: &str = include_str!("./static/dashboard.html");

pub const NO_DATA_MESSAGE: &str = "No data available. Please check the data source.";
pub const REFRESHED_MESSAGE: &str = "Data refreshed successfully!";
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please reload the page.";

pub struct AppState<S> {
    source: S,
    sessions: SessionStore,
    config: DashboardConfig,
}

impl<S: SheetSource> AppState<S> {
    pub fn new(source: S, config: DashboardConfig) -> Self {
        let sessions = SessionStore::new(config.columns.clone(), config.session_ttl());
        Self {
            source,
            sessions,
            config,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }
}

/// A message shown above the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    fn success(message: &str) -> Self {
        Self {
            severity: Severity::Success,
            message: message.to_string(),
        }
    }

    fn warning(message: &str) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.to_string(),
        }
    }
}

impl From<&DashboardError> for Notice {
    fn from(err: &DashboardError) -> Self {
        Self {
            severity: err.severity(),
            message: err.to_string(),
        }
    }
}

/// A verified student's results with the display lines already formatted.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryView {
    pub welcome: String,
    pub total_line: String,
    #[serde(flatten)]
    pub summary: StudentSummary,
}

impl From<&StudentSummary> for SummaryView {
    fn from(summary: &StudentSummary) -> Self {
        Self {
            welcome: summary.welcome_line(),
            total_line: summary.total_hours_line(),
            summary: summary.clone(),
        }
    }
}

/// Everything the page needs to draw itself.
#[derive(Debug, Clone, Serialize)]
pub struct PageState {
    pub title: String,
    pub logo_url: Option<String>,
    pub state: DashboardState,
    pub months: Vec<String>,
    pub last_refreshed: Option<String>,
    pub notices: Vec<Notice>,
    pub summary: Option<SummaryView>,
}

impl PageState {
    /// Describe a dashboard. Load errors and an empty table become notices.
    fn build(dashboard: &Dashboard, config: &DashboardConfig) -> Self {
        let mut notices = Vec::new();
        let mut months = Vec::new();

        if let Some(snapshot) = dashboard.snapshot() {
            if let Some(err) = &snapshot.load_error {
                notices.push(Notice::from(err));
            }
            if snapshot.table.is_empty() {
                notices.push(Notice::warning(NO_DATA_MESSAGE));
            } else {
                match dashboard.months() {
                    Ok(found) => months = found,
                    Err(err) => notices.push(Notice::from(&err)),
                }
            }
        }

        Self {
            title: config.title.clone(),
            logo_url: config.logo_url.clone(),
            state: dashboard.state(),
            months,
            last_refreshed: dashboard
                .snapshot()
                .map(|s| s.fetched_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            notices,
            summary: dashboard.summary().map(SummaryView::from),
        }
    }

    /// State for an API call that carries no live session.
    fn expired(config: &DashboardConfig) -> Self {
        Self {
            title: config.title.clone(),
            logo_url: config.logo_url.clone(),
            state: DashboardState::Uninitialized,
            months: Vec::new(),
            last_refreshed: None,
            notices: vec![Notice::warning(SESSION_EXPIRED_MESSAGE)],
            summary: None,
        }
    }

    /// Add a notice unless the same message is already shown.
    fn notify(&mut self, notice: Notice) {
        if !self.notices.iter().any(|n| n.message == notice.message) {
            self.notices.push(notice);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub month: String,
    #[serde(default)]
    pub student_id: String,
    #[serde(default)]
    pub name: String,
}

pub fn router<S: SheetSource + 'static>(state: Arc<AppState<S>>, static_dir: PathBuf) -> Router {
    Router::new()
        .route("/", get(serve_dashboard::<S>))
        .route("/api/state", get(get_state::<S>))
        .route("/api/verify", post(verify_student::<S>))
        .route("/api/refresh", post(refresh_data::<S>))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
}

pub async fn run(config: DashboardConfig) -> anyhow::Result<()> {
    let source = GoogleSheetsClient::from_config(&config);
    let bind_addr = config.bind_addr.clone();
    let static_dir = config.static_dir.clone();
    let app_state = Arc::new(AppState::new(source, config));

    let app = router(app_state, static_dir);

    let listener = TcpListener::bind(&bind_addr).await?;
    log::info!("Listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Find the caller's session, starting one (and setting its cookie) if needed.
fn session_for<S>(state: &AppState<S>, jar: CookieJar) -> (CookieJar, SharedDashboard) {
    let existing = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let (session_id, dashboard, created) = state.sessions.get_or_create(existing.as_deref());

    let jar = if created {
        jar.add(
            Cookie::build((SESSION_COOKIE, session_id))
                .path("/")
                .http_only(true),
        )
    } else {
        jar
    };
    (jar, dashboard)
}

/// The caller's live session. API calls never start one; only the page does.
fn live_session<S>(state: &AppState<S>, jar: &CookieJar) -> Option<SharedDashboard> {
    jar.get(SESSION_COOKIE)
        .and_then(|c| state.sessions.get(c.value()))
}

fn render_page(page: &PageState) -> String {
    // Keep "</script>" inside JSON strings from closing the tag.
    let json = serde_json::to_string(page)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/");

    DASHBOARD_HTML.replace(
        "</head>",
        &format!(
            "    <script>const DASHBOARD_STATE = {};</script>\n</head>",
            json
        ),
    )
}

async fn serve_dashboard<S: SheetSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
) -> impl IntoResponse {
    let (jar, dashboard) = session_for(&state, jar);
    let mut dashboard = dashboard.lock().await;
    dashboard.ensure_loaded(&state.source).await;

    let page = PageState::build(&dashboard, &state.config);
    (jar, Html(render_page(&page)))
}

async fn get_state<S: SheetSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
) -> Json<PageState> {
    let Some(dashboard) = live_session(&state, &jar) else {
        return Json(PageState::expired(&state.config));
    };
    let mut dashboard = dashboard.lock().await;
    dashboard.ensure_loaded(&state.source).await;

    Json(PageState::build(&dashboard, &state.config))
}

async fn refresh_data<S: SheetSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
) -> Json<PageState> {
    let Some(dashboard) = live_session(&state, &jar) else {
        return Json(PageState::expired(&state.config));
    };
    let mut dashboard = dashboard.lock().await;

    let outcome = dashboard.refresh(&state.source).await;
    let mut page = PageState::build(&dashboard, &state.config);
    if outcome.is_ok() {
        page.notices.insert(0, Notice::success(REFRESHED_MESSAGE));
    }

    Json(page)
}

async fn verify_student<S: SheetSource + 'static>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Json(request): Json<VerifyRequest>,
) -> Json<PageState> {
    let Some(dashboard) = live_session(&state, &jar) else {
        return Json(PageState::expired(&state.config));
    };
    let mut dashboard = dashboard.lock().await;
    dashboard.ensure_loaded(&state.source).await;

    let outcome = dashboard
        .verify_input(&request.month, &request.student_id, &request.name)
        .map(|_| ());
    if let Err(err) = &outcome {
        log::info!("Verification rejected: {}", err);
    }

    let mut page = PageState::build(&dashboard, &state.config);
    if let Err(err) = outcome {
        page.notify(Notice::from(&err));
    }

    Json(page)
}
