use crate::annotate::TermAnnotator;
use crate::course::{Glossary, PromptLibrary};
use crate::progress::{NewUser, ProgressStore, ProgressUpdate, RegisterError};
use crate::router::{self, ContentRouter, render_glossary_cards};
use crate::tooltip::{ANCHOR_GAP, EDGE_MARGIN};
use askama::Template;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::info;

type SharedState = Arc<AppState>;

pub struct AppState {
    pub router: ContentRouter,
    pub annotator: TermAnnotator,
    pub store: ProgressStore,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            router: ContentRouter::embedded(),
            annotator: TermAnnotator::new(Glossary::entries()),
            store: ProgressStore::new(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
    let state = Arc::new(AppState::new());
    let router = build_router(state);
    info!(addr = %config.addr, "Binding HTTP listener");
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "message": self.message });
        (self.status, Json(payload)).into_response()
    }
}

impl From<RegisterError> for ApiError {
    fn from(value: RegisterError) -> Self {
        ApiError::bad_request(value.to_string())
    }
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/content/:token", get(content_fragment))
        .route("/glossary/cards", get(glossary_cards))
        .route("/api/glossary/search", get(api_glossary_search))
        .route("/api/glossary/terms", get(api_glossary_terms))
        .route("/api/prompts", get(api_prompts))
        .route("/api/auth/register", post(api_register))
        .route("/api/auth/login", post(api_login))
        .route("/api/progress", get(api_progress_index).post(api_progress_update))
        .route("/api/progress/:user_id/:module_id", get(api_module_progress))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

struct NavLink {
    token: &'static str,
    label: &'static str,
}

static NAV_LABELS: &[(&str, &str)] = &[
    ("introduction", "과정 소개"),
    ("core_principles", "핵심 원칙"),
    ("4d_framework", "4D 프레임워크"),
    ("delegation", "위임"),
    ("description", "기술"),
    ("discernment", "분별"),
    ("diligence", "책임"),
    ("use_cases", "활용 사례"),
    ("prompt_library", "프롬프트"),
    ("glossary", "용어집"),
];

async fn home() -> ShellTemplate {
    let nav = NAV_LABELS
        .iter()
        .map(|(token, label)| NavLink { token, label })
        .collect();
    ShellTemplate {
        nav,
        edge_margin: EDGE_MARGIN,
        anchor_gap: ANCHOR_GAP,
        default_token: router::DEFAULT_TOKEN,
        version: env!("CARGO_PKG_VERSION"),
    }
}

/// Navigates the content region and annotates the injected fragment. Fetch
/// failures surface as the router's localized error panel, never as a 5xx.
async fn content_fragment(
    State(state): State<SharedState>,
    Path(token): Path<String>,
) -> impl IntoResponse {
    let html = state.router.navigate(&token);
    Html(state.annotator.annotate(&html))
}

#[derive(Debug, Deserialize)]
struct CardsParams {
    q: Option<String>,
}

/// HTML partial behind the glossary page's live search box.
async fn glossary_cards(Query(params): Query<CardsParams>) -> impl IntoResponse {
    let query = params.q.unwrap_or_default();
    Html(render_glossary_cards(&Glossary::search(&query)))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<usize>,
}

async fn api_glossary_search(Query(params): Query<SearchParams>) -> impl IntoResponse {
    let query = params.q.unwrap_or_default();
    let limit = params.limit.unwrap_or(50).clamp(1, 100);
    let results: Vec<_> = Glossary::search(&query).into_iter().take(limit).collect();
    Json(json!({
        "query": query,
        "limit": limit,
        "results": results,
    }))
}

async fn api_glossary_terms() -> impl IntoResponse {
    Json(Glossary::definitions())
}

async fn api_prompts() -> impl IntoResponse {
    Json(PromptLibrary::categories())
}

async fn api_register(
    State(state): State<SharedState>,
    Json(new_user): Json<NewUser>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.store.register(new_user)?;
    Ok(Json(json!({
        "user": { "id": user.id, "username": user.username, "email": user.email }
    })))
}

#[derive(Debug, Deserialize)]
struct LoginParams {
    email: String,
    password: String,
}

async fn api_login(
    State(state): State<SharedState>,
    Json(params): Json<LoginParams>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .store
        .login(&params.email, &params.password)
        .ok_or_else(|| ApiError::unauthorized("이메일 또는 비밀번호가 잘못되었습니다"))?;
    Ok(Json(json!({
        "user": { "id": user.id, "username": user.username, "email": user.email }
    })))
}

#[derive(Debug, Deserialize)]
struct ProgressIndexParams {
    user_id: Option<u32>,
}

async fn api_progress_index(
    State(state): State<SharedState>,
    Query(params): Query<ProgressIndexParams>,
) -> impl IntoResponse {
    // The original service pinned the demo user; keep 1 as the default.
    let user_id = params.user_id.unwrap_or(1);
    Json(state.store.user_progress(user_id))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressWrite {
    user_id: u32,
    module_id: String,
    completed: Option<bool>,
    time_spent: Option<u32>,
    assessment_data: Option<serde_json::Value>,
}

async fn api_progress_update(
    State(state): State<SharedState>,
    Json(write): Json<ProgressWrite>,
) -> impl IntoResponse {
    let record = state.store.update_progress(
        write.user_id,
        &write.module_id,
        ProgressUpdate {
            completed: write.completed,
            time_spent: write.time_spent,
            assessment_data: write.assessment_data,
        },
    );
    Json(record)
}

async fn api_module_progress(
    State(state): State<SharedState>,
    Path((user_id, module_id)): Path<(u32, String)>,
) -> impl IntoResponse {
    // Serializes to `null` when the pair has no record yet, as the original
    // endpoint did.
    Json(state.store.module_progress(user_id, &module_id))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "fluency-web" }))
}

#[derive(Template)]
#[template(
    source = r##"<!DOCTYPE html>
<html lang="ko">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>AI 플루언시 과정</title>
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    <style>
      .content-card { background: white; border-radius: 0.75rem; box-shadow: 0 1px 3px rgba(15, 23, 42, 0.1); }
      .tooltip-term { border-bottom: 2px dotted #2563eb; cursor: help; }
      #tooltip-popup {
        display: none;
        position: absolute;
        max-width: 320px;
        background: #0f172a;
        color: #f8fafc;
        font-size: 0.875rem;
        line-height: 1.5;
        padding: 0.75rem 1rem;
        border-radius: 0.5rem;
        z-index: 50;
      }
      .nav-link.active { color: #1d4ed8; font-weight: 700; }
    </style>
  </head>
  <body class="bg-slate-50 text-slate-900">
    <header class="bg-white border-b border-slate-200 sticky top-0 z-40">
      <nav class="max-w-5xl mx-auto flex flex-wrap gap-4 px-4 py-3 text-sm text-slate-600" aria-label="과정 메뉴">
        {% for link in nav %}
        <a href="#{{ link.token }}" class="nav-link hover:text-blue-700" data-token="{{ link.token }}">{{ link.label }}</a>
        {% endfor %}
      </nav>
    </header>
    <main id="main-content" class="max-w-5xl mx-auto px-4"></main>
    <footer class="max-w-5xl mx-auto px-4 py-8 text-xs text-slate-400">AI 플루언시 v{{ version }}</footer>
    <script>
      var EDGE_MARGIN = {{ edge_margin }};
      var ANCHOR_GAP = {{ anchor_gap }};
      var DEFAULT_TOKEN = '{{ default_token }}';
      var termMapPromise = fetch('/api/glossary/terms').then(function (response) {
        return response.json();
      });

      function currentToken() {
        var hash = window.location.hash.replace('#', '');
        return hash || DEFAULT_TOKEN;
      }

      function updateActiveNav(token) {
        var links = document.querySelectorAll('.nav-link');
        links.forEach(function (link) {
          link.classList.toggle('active', link.dataset.token === token);
        });
      }

      function wireGlossarySearch() {
        var input = document.getElementById('glossary-search');
        var container = document.getElementById('glossary-container');
        if (!input || !container) return;
        input.addEventListener('input', function (event) {
          fetch('/glossary/cards?q=' + encodeURIComponent(event.target.value))
            .then(function (response) { return response.text(); })
            .then(function (cards) { container.innerHTML = cards; });
        });
      }

      var navTicket = 0;

      function navigate() {
        var token = currentToken();
        var main = document.getElementById('main-content');
        if (!main) return;
        var ticket = ++navTicket;
        fetch('/content/' + encodeURIComponent(token))
          .then(function (response) { return response.text(); })
          .then(function (fragment) {
            // A newer navigation has been issued; drop this stale result.
            if (ticket !== navTicket) return;
            main.innerHTML = fragment;
            updateActiveNav(token);
            wireGlossarySearch();
          });
      }

      function ensureTooltip() {
        var el = document.getElementById('tooltip-popup');
        if (!el) {
          el = document.createElement('div');
          el.id = 'tooltip-popup';
          document.body.appendChild(el);
        }
        return el;
      }

      document.body.addEventListener('mouseover', function (event) {
        var target = event.target;
        if (!target.classList || !target.classList.contains('tooltip-term')) return;
        termMapPromise.then(function (terms) {
          var description = terms[target.textContent];
          if (!description) return;
          var el = ensureTooltip();
          el.textContent = description;
          el.style.display = 'block';
          var rect = target.getBoundingClientRect();
          var top = rect.bottom + window.scrollY + ANCHOR_GAP;
          var left = rect.left + window.scrollX + rect.width / 2 - el.offsetWidth / 2;
          if (left < EDGE_MARGIN) left = EDGE_MARGIN;
          if (left + el.offsetWidth > window.innerWidth - EDGE_MARGIN) {
            left = window.innerWidth - el.offsetWidth - EDGE_MARGIN;
          }
          if (top + el.offsetHeight > window.innerHeight + window.scrollY) {
            top = rect.top + window.scrollY - el.offsetHeight - ANCHOR_GAP;
          }
          el.style.top = top + 'px';
          el.style.left = left + 'px';
        });
      });

      document.body.addEventListener('mouseout', function (event) {
        if (!event.target.classList || !event.target.classList.contains('tooltip-term')) return;
        var el = document.getElementById('tooltip-popup');
        if (el) el.style.display = 'none';
      });

      document.body.addEventListener('click', function (event) {
        var button = event.target.closest('.copy-btn');
        if (!button || button.disabled) return;
        var container = button.closest('.prompt-container');
        if (!container) return;
        var pre = container.querySelector('pre');
        if (!pre) return;
        var label = button.querySelector('span');
        navigator.clipboard.writeText(pre.innerText).then(function () {
          if (label) label.textContent = '복사 완료!';
          button.disabled = true;
          setTimeout(function () {
            if (label) label.textContent = '복사하기';
            button.disabled = false;
          }, 2000);
        }).catch(function () {
          if (label) label.textContent = '복사 실패';
        });
      });

      window.addEventListener('hashchange', navigate);
      document.addEventListener('DOMContentLoaded', navigate);
    </script>
  </body>
</html>"##,
    ext = "html"
)]
struct ShellTemplate {
    nav: Vec<NavLink>,
    edge_margin: f64,
    anchor_gap: f64,
    default_token: &'static str,
    version: &'static str,
}
