use crate::actions::{
    self, ActionForm, ActionType, SessionDisplayState, SessionPhase, WordQuery, validate_api_key,
    validate_context,
};
use crate::config::ModelConfig;
use crate::error::LexicaError;
use crate::flows::{self, SuggestionQuery};
use crate::gate::{API_KEY_STORAGE_KEY, KeyGate};
use crate::llm::{Credential, ModelClient};
use crate::schema::{SuggestionResult, SuggestionType};
use crate::session::{SESSION_COOKIE, SessionStore, generate_session_id, is_valid_session_id};
use crate::tone::Tone;
use askama::Html as HtmlEscaper;
use askama::{MarkupDisplay, Template};
use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use cookie::{Cookie, CookieBuilder, SameSite};
use include_dir::{Dir, include_dir};
use markdown::{Options as MarkdownOptions, to_html_with_options};
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

type SharedState = Arc<AppState>;
type SafeJson = MarkupDisplay<HtmlEscaper, String>;

static STATIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

#[derive(Clone)]
pub struct AppState {
    pub client: ModelClient,
    pub sessions: SessionStore,
    pub theme: WebTheme,
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    main_class: &'static str,
    card_class: &'static str,
    eyebrow_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    panel_class: &'static str,
    input_class: &'static str,
    button_class: &'static str,
    link_button_class: &'static str,
    chip_class: &'static str,
    copy_button_class: &'static str,
    error_class: &'static str,
    notice_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "bg-slate-50 text-slate-900",
                main_class: "min-h-screen flex flex-col items-center justify-start py-10 px-4",
                card_class: "max-w-3xl w-full space-y-6",
                eyebrow_class: "uppercase tracking-wide text-sm text-slate-500",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                panel_class: "bg-white shadow rounded p-5 space-y-3",
                input_class: "w-full rounded-md border border-slate-300 px-3 py-2",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
                link_button_class: "text-sm text-slate-500 underline hover:text-slate-800",
                chip_class: "inline-block rounded-full bg-slate-200 px-3 py-1 text-sm text-slate-700 hover:bg-slate-300",
                copy_button_class: "text-xs text-slate-400 hover:text-slate-700",
                error_class: "rounded border border-red-300 bg-red-50 px-4 py-3 text-red-800",
                notice_class: "rounded border border-sky-300 bg-sky-50 px-4 py-3 text-sky-800",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                main_class: "container py-5",
                card_class: "mx-auto col-lg-8",
                eyebrow_class: "text-uppercase text-muted mb-2",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                panel_class: "card card-body mb-4",
                input_class: "form-control",
                button_class: "btn btn-primary px-4 py-2",
                link_button_class: "btn btn-link btn-sm",
                chip_class: "badge rounded-pill text-bg-secondary me-1",
                copy_button_class: "btn btn-sm btn-link p-0 me-2 text-secondary",
                error_class: "alert alert-danger",
                notice_class: "alert alert-info",
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub base_url: String,
    pub model: ModelConfig,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
            model: ModelConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let client = ModelClient::gemini(&config.model);
    let state = Arc::new(AppState {
        client,
        sessions: SessionStore::default(),
        theme: config.theme,
        base_url: config.base_url.clone(),
    });
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        model = %config.model.model,
        base = %config.base_url,
        "Binding HTTP listener"
    );
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
}

impl From<LexicaError> for ApiError {
    fn from(err: LexicaError) -> Self {
        let status = match err {
            LexicaError::Validation(_) | LexicaError::StaleContext(_) => StatusCode::BAD_REQUEST,
            LexicaError::MissingCredential => StatusCode::UNAUTHORIZED,
            LexicaError::Provider(_)
            | LexicaError::SchemaMismatch { .. }
            | LexicaError::EmptyOutput => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/key", post(store_key))
        .route("/key/forget", post(forget_key))
        .route("/action", post(submit_action))
        .route("/api/lookup", post(api_lookup))
        .route("/api/suggest", post(api_suggest))
        .route("/sw.js", get(service_worker))
        .route("/manifest.json", get(web_manifest))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
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

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "wordcraft-lexica" }))
}

// --- cookies ---------------------------------------------------------------

fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

fn stored_key(headers: &HeaderMap) -> KeyGate {
    let stored = read_cookie(headers, API_KEY_STORAGE_KEY).and_then(|raw| {
        percent_decode_str(&raw)
            .decode_utf8()
            .ok()
            .map(|value| value.into_owned())
    });
    KeyGate::from_stored(stored.as_deref())
}

/// Existing session id, or a fresh one that still needs a `Set-Cookie`.
fn session_id(headers: &HeaderMap) -> (String, bool) {
    match read_cookie(headers, SESSION_COOKIE).filter(|id| is_valid_session_id(id)) {
        Some(id) => (id, false),
        None => (generate_session_id(), true),
    }
}

fn private_cookie(name: &'static str, value: String) -> CookieBuilder<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
}

/// The key outlives the browser session; it stays until the user forgets it.
fn key_cookie(credential: &Credential) -> Cookie<'static> {
    private_cookie(API_KEY_STORAGE_KEY, encode_component(credential.as_str()))
        .permanent()
        .build()
}

fn session_cookie(id: &str) -> Cookie<'static> {
    private_cookie(SESSION_COOKIE, id.to_string()).build()
}

fn with_cookies(mut response: Response, cookies: &[Cookie<'_>]) -> Response {
    for cookie in cookies {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(cookie = cookie.name(), error = %err, "dropping unencodable cookie"),
        }
    }
    response
}

// --- pages -----------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct HomeParams {
    word: Option<String>,
}

async fn home(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<HomeParams>,
) -> Response {
    let gate = stored_key(&headers);
    if !gate.is_ready() {
        return Html(render_gate(&state, &gate.begin_entry())).into_response();
    }
    let (id, fresh) = session_id(&headers);
    let display = state.sessions.load(&id);
    let view = PageView::from_state(&display, params.word.as_deref());
    let page = Html(render_main(&state, &view)).into_response();
    if fresh {
        with_cookies(page, &[session_cookie(&id)])
    } else {
        page
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyForm {
    api_key: Option<String>,
}

async fn store_key(State(state): State<SharedState>, Form(form): Form<KeyForm>) -> Response {
    let gate = KeyGate::NoKey
        .begin_entry()
        .submit(form.api_key.as_deref().unwrap_or_default());
    match gate.credential() {
        Some(credential) => {
            info!("api key stored for browser session");
            with_cookies(Redirect::to("/").into_response(), &[key_cookie(credential)])
        }
        None => (StatusCode::BAD_REQUEST, Html(render_gate(&state, &gate))).into_response(),
    }
}

async fn forget_key(State(state): State<SharedState>, headers: HeaderMap) -> Response {
    if let Some(id) = read_cookie(&headers, SESSION_COOKIE).filter(|id| is_valid_session_id(id)) {
        state.sessions.forget(&id);
    }
    let mut removal = Cookie::build((API_KEY_STORAGE_KEY, "")).path("/").build();
    removal.make_removal();
    with_cookies(Redirect::to("/").into_response(), &[removal])
}

async fn submit_action(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Form(mut form): Form<ActionForm>,
) -> Response {
    if form
        .api_key
        .as_deref()
        .is_none_or(|key| key.trim().is_empty())
    {
        form.api_key = stored_key(&headers)
            .credential()
            .map(|credential| credential.as_str().to_string());
    }

    let (id, fresh) = session_id(&headers);
    // Detached from the request so an abandoned POST still lands its result.
    let task = {
        let state = Arc::clone(&state);
        let id = id.clone();
        tokio::spawn(async move {
            let previous = state.sessions.load(&id);
            let next = actions::dispatch(&state.client, &previous, &form).await;
            info!(
                action = form.action_type.as_deref().unwrap_or("unknown"),
                phase = ?next.phase,
                sessions = state.sessions.len(),
                "form action handled"
            );
            state.sessions.save(&id, next);
        })
    };
    if let Err(err) = task.await {
        warn!(error = %err, "form action task did not complete");
    }

    let redirect = Redirect::to("/").into_response();
    if fresh {
        with_cookies(redirect, &[session_cookie(&id)])
    } else {
        redirect
    }
}

// --- JSON API --------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest {
    word: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LookupPayload {
    word: String,
    synonyms: Vec<String>,
    antonyms: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuggestRequest {
    original_word: Option<String>,
    context: Option<String>,
    tone: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
    #[serde(default)]
    antonyms: Vec<String>,
    api_key: Option<String>,
}

/// Body key first, then the key-gate cookie. Absent everywhere is a 401.
fn api_credential(headers: &HeaderMap, body_key: Option<&str>) -> Result<Credential, ApiError> {
    let from_body = body_key
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string);
    let raw = from_body.or_else(|| {
        stored_key(headers)
            .credential()
            .map(|credential| credential.as_str().to_string())
    });
    match raw {
        Some(raw) => validate_api_key(Some(&raw)).map_err(|err| {
            ApiError::bad_request(format!("A valid API Key is required. {err}"))
        }),
        None => Err(LexicaError::MissingCredential.into()),
    }
}

async fn api_lookup(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<LookupRequest>,
) -> Result<Json<LookupPayload>, ApiError> {
    let query = WordQuery::parse(request.word.as_deref())?;
    let credential = api_credential(&headers, request.api_key.as_deref())?;
    let (synonyms, antonyms) = actions::lookup_word(&state.client, &query.word, &credential).await?;
    Ok(Json(LookupPayload {
        word: query.word,
        synonyms: synonyms.synonyms,
        antonyms: antonyms.antonyms,
    }))
}

async fn api_suggest(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(request): Json<SuggestRequest>,
) -> Result<Json<SuggestionResult>, ApiError> {
    let original = WordQuery::parse(request.original_word.as_deref())?;
    let context = validate_context(request.context.as_deref())?;
    let tone = Tone::from_field(request.tone.as_deref())?;
    let credential = api_credential(&headers, request.api_key.as_deref())?;
    let query = SuggestionQuery {
        original_word: original.word,
        context,
        tone,
        synonyms: request.synonyms,
        antonyms: request.antonyms,
    };
    let result = flows::suggest_best_word(&state.client, &query, &credential).await?;
    Ok(Json(result))
}

// --- static assets ---------------------------------------------------------

async fn service_worker() -> Response {
    static_asset("sw.js")
}

async fn web_manifest() -> Response {
    static_asset("manifest.json")
}

fn static_asset(path: &str) -> Response {
    let Some(file) = STATIC_ASSETS.get_file(path) else {
        return ApiError {
            status: StatusCode::NOT_FOUND,
            message: format!("No asset named {path:?}"),
        }
        .into_response();
    };
    let content_type = match path.rsplit('.').next() {
        Some("js") => mime::APPLICATION_JAVASCRIPT_UTF_8.to_string(),
        Some("json") => mime::APPLICATION_JSON.to_string(),
        _ => mime::APPLICATION_OCTET_STREAM.to_string(),
    };
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        file.contents(),
    )
        .into_response()
}

// --- rendering -------------------------------------------------------------

#[derive(Debug, Clone)]
struct WordLink {
    word: String,
    href: String,
}

#[derive(Debug, Clone)]
struct ToneOption {
    value: &'static str,
    selected: bool,
}

#[derive(Debug, Clone)]
struct SuggestionView {
    word: Option<String>,
    kind: SuggestionType,
    explanation_html: String,
}

/// Everything the main template reads, flattened out of the session state.
#[derive(Debug, Clone)]
struct PageView {
    search_value: String,
    pending: Option<&'static str>,
    search_pending: &'static str,
    suggestion_pending: &'static str,
    error: Option<String>,
    message: Option<String>,
    result_word: Option<String>,
    synonyms: Vec<WordLink>,
    antonyms: Vec<WordLink>,
    show_suggestion_form: bool,
    context: String,
    tones: Vec<ToneOption>,
    suggestion: Option<SuggestionView>,
    suggestion_error: Option<String>,
}

fn pending_label(phase: SessionPhase) -> Option<&'static str> {
    match phase {
        SessionPhase::Searching => Some("Searching for words…"),
        SessionPhase::SuggestionPending => Some("Finding the best word…"),
        _ => None,
    }
}

impl PageView {
    fn from_state(state: &SessionDisplayState, prefill: Option<&str>) -> Self {
        let result_word = state.search_word.clone();
        let search_value = prefill
            .map(str::trim)
            .filter(|word| !word.is_empty())
            .map(str::to_string)
            .or_else(|| result_word.clone())
            .unwrap_or_default();
        let pending_for =
            |action: ActionType| pending_label(state.pending(action).phase).unwrap_or_default();
        let suggestion = state.suggestion.as_ref().map(|result| SuggestionView {
            word: result.suggested_word.clone(),
            kind: result.suggestion_type,
            explanation_html: render_markdown_str(&result.explanation).unwrap_or_default(),
        });
        Self {
            search_value,
            pending: pending_label(state.phase),
            search_pending: pending_for(ActionType::FetchWordData),
            suggestion_pending: pending_for(ActionType::FetchWordSuggestion),
            error: state.error.clone(),
            message: state.message.clone(),
            synonyms: word_links(&state.synonyms),
            antonyms: word_links(&state.antonyms),
            show_suggestion_form: state.has_results(),
            context: state.context_provided.clone().unwrap_or_default(),
            tones: Tone::ALL
                .iter()
                .map(|tone| ToneOption {
                    value: tone.label(),
                    selected: *tone == state.selected_tone,
                })
                .collect(),
            suggestion,
            suggestion_error: state.suggestion_error.clone(),
            result_word,
        }
    }
}

fn word_links(words: &[String]) -> Vec<WordLink> {
    words
        .iter()
        .map(|word| WordLink {
            word: word.clone(),
            href: format!("/?word={}", encode_component(word)),
        })
        .collect()
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn markdown_options() -> MarkdownOptions {
    // Explanations come from the model; raw HTML stays escaped.
    MarkdownOptions::gfm()
}

fn render_markdown_str(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let options = markdown_options();
    let html = to_html_with_options(trimmed, &options)
        .unwrap_or_else(|_| MarkupDisplay::new_unsafe(trimmed, HtmlEscaper).to_string());
    Some(html)
}

fn app_json_ld(base_url: &str) -> SafeJson {
    let body = serde_json::to_string_pretty(&json!({
        "@context": "https://schema.org",
        "@type": "WebApplication",
        "name": "Wordcraft Lexica",
        "url": base_url,
        "applicationCategory": "ReferenceApplication",
        "description": "Synonyms, antonyms and contextual word suggestions.",
    }))
    .unwrap_or_else(|_| "{}".to_string());
    MarkupDisplay::new_safe(body, HtmlEscaper)
}

fn render_main(state: &AppState, view: &PageView) -> String {
    let template = MainTemplate {
        chrome: Chrome::new(state.theme),
        view,
        canonical_url: &state.base_url,
        json_ld: app_json_ld(&state.base_url),
        model: state.client.model_name(),
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(state.theme, err.to_string()))
}

fn render_gate(state: &AppState, gate: &KeyGate) -> String {
    let template = GateTemplate {
        chrome: Chrome::new(state.theme),
        error: gate.error().map(str::to_string),
    };
    template
        .render()
        .unwrap_or_else(|err| render_error_page(state.theme, err.to_string()))
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let chrome = Chrome::new(theme);
    let template = ErrorTemplate {
        chrome,
        message: message.into(),
    };
    template
        .render()
        .unwrap_or_else(|_| "<h1>Something went wrong</h1>".to_string())
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Wordcraft Lexica{% if view.result_word.is_some() %} • {{ view.result_word.as_ref().unwrap() }}{% endif %}</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
    <link rel="manifest" href="/manifest.json">
    <link rel="canonical" href="{{ canonical_url }}">
    <script type="application/ld+json">
    {{ json_ld }}
    </script>
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <header>
          <p class="{{ chrome.eyebrow_class }}">Powered by {{ model }}</p>
          <h1 class="{{ chrome.headline_class }}">Wordcraft Lexica</h1>
          <p class="{{ chrome.lede_class }}">Find synonyms and antonyms, then let the model pick the best word for your sentence.</p>
        </header>

        <section id="search" class="{{ chrome.panel_class }}">
          <form method="post" action="/action" data-pending="{{ view.search_pending }}">
            <input type="hidden" name="actionType" value="fetchWordData">
            <label for="word" class="font-semibold form-label">Word</label>
            <input id="word" name="word" type="text" maxlength="50" required class="{{ chrome.input_class }}" value="{{ view.search_value }}">
            <button type="submit" class="{{ chrome.button_class }} mt-3">Search</button>
          </form>
        </section>

        <p id="pending" class="{{ chrome.notice_class }}" role="status"{% if view.pending.is_none() %} hidden{% endif %}>{% if view.pending.is_some() %}{{ view.pending.as_ref().unwrap() }}{% endif %}</p>
        {% if view.error.is_some() %}
        <p class="{{ chrome.error_class }}" role="alert">{{ view.error.as_ref().unwrap() }}</p>
        {% endif %}
        {% if view.message.is_some() %}
        <p class="{{ chrome.notice_class }}">{{ view.message.as_ref().unwrap() }}</p>
        {% endif %}

        {% if view.show_suggestion_form %}
        <section id="results" class="{{ chrome.panel_class }}">
          <h2 class="text-xl font-semibold">Results for “{{ view.result_word.as_ref().unwrap() }}”</h2>
          <div>
            <h3 class="font-semibold">Synonyms</h3>
            {% if view.synonyms.is_empty() %}
            <p class="text-slate-500">No synonyms found.</p>
            {% else %}
            <p class="flex flex-wrap gap-2">
              {% for link in view.synonyms %}<span class="inline-flex items-center gap-1"><a class="{{ chrome.chip_class }}" href="{{ link.href }}">{{ link.word }}</a><button type="button" class="{{ chrome.copy_button_class }}" data-word="{{ link.word }}" aria-label="Copy {{ link.word }}" title="Copy">⧉</button></span>{% endfor %}
            </p>
            {% endif %}
          </div>
          <div>
            <h3 class="font-semibold">Antonyms</h3>
            {% if view.antonyms.is_empty() %}
            <p class="text-slate-500">No antonyms found.</p>
            {% else %}
            <p class="flex flex-wrap gap-2">
              {% for link in view.antonyms %}<span class="inline-flex items-center gap-1"><a class="{{ chrome.chip_class }}" href="{{ link.href }}">{{ link.word }}</a><button type="button" class="{{ chrome.copy_button_class }}" data-word="{{ link.word }}" aria-label="Copy {{ link.word }}" title="Copy">⧉</button></span>{% endfor %}
            </p>
            {% endif %}
          </div>
        </section>

        <section id="suggestion" class="{{ chrome.panel_class }}">
          <h2 class="text-xl font-semibold">Suggest the best word</h2>
          <form method="post" action="/action" class="space-y-3" data-pending="{{ view.suggestion_pending }}">
            <input type="hidden" name="actionType" value="fetchWordSuggestion">
            <input type="hidden" name="originalWord" value="{{ view.result_word.as_ref().unwrap() }}">
            <label for="context" class="font-semibold form-label">Your sentence or context</label>
            <textarea id="context" name="context" rows="3" minlength="5" maxlength="500" required class="{{ chrome.input_class }}">{{ view.context }}</textarea>
            <label for="tone" class="font-semibold form-label">Tone</label>
            <select id="tone" name="tone" class="{{ chrome.input_class }}">
              {% for option in view.tones %}
              <option value="{{ option.value }}"{% if option.selected %} selected{% endif %}>{{ option.value }}</option>
              {% endfor %}
            </select>
            <button type="submit" class="{{ chrome.button_class }}">Suggest</button>
          </form>
          {% if view.suggestion_error.is_some() %}
          <p class="{{ chrome.error_class }}" role="alert">{{ view.suggestion_error.as_ref().unwrap() }}</p>
          {% endif %}
          {% if view.suggestion.is_some() %}
          {% let suggestion = view.suggestion.as_ref().unwrap() %}
          <div class="bg-slate-100 rounded p-4">
            {% if suggestion.word.is_some() %}
            <p class="text-2xl font-bold">{{ suggestion.word.as_ref().unwrap() }} <span class="text-sm text-slate-500">({{ suggestion.kind }})</span></p>
            {% else %}
            <p class="font-semibold">No suitable word found.</p>
            {% endif %}
            <div class="prose prose-slate max-w-none">{{ suggestion.explanation_html|safe }}</div>
          </div>
          {% endif %}
        </section>
        {% endif %}

        <form method="post" action="/key/forget">
          <button type="submit" class="{{ chrome.link_button_class }}">Forget my API key</button>
        </form>
      </div>
    </main>
    <script>
      if ('serviceWorker' in navigator) {
        navigator.serviceWorker.register('/sw.js');
      }
      document.querySelectorAll('form[data-pending]').forEach(function (form) {
        form.addEventListener('submit', function () {
          var banner = document.getElementById('pending');
          banner.textContent = form.dataset.pending;
          banner.hidden = false;
        });
      });
      document.querySelectorAll('button[data-word]').forEach(function (button) {
        button.addEventListener('click', function () {
          if (navigator.clipboard) {
            navigator.clipboard.writeText(button.dataset.word).then(function () {
              button.textContent = '✓';
              setTimeout(function () { button.textContent = '⧉'; }, 2000);
            });
          }
        });
      });
    </script>
  </body>
</html>"#,
    ext = "html"
)]
struct MainTemplate<'a> {
    chrome: Chrome,
    view: &'a PageView,
    canonical_url: &'a str,
    json_ld: SafeJson,
    model: &'a str,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Wordcraft Lexica • API Key</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
    <link rel="manifest" href="/manifest.json">
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <p class="{{ chrome.eyebrow_class }}">Wordcraft Lexica</p>
        <h1 class="{{ chrome.headline_class }}">Enter your API key</h1>
        <p class="{{ chrome.lede_class }}">Your Google AI key is kept in a cookie on this browser and sent with each request. It is never stored on the server.</p>
        <form method="post" action="/key" class="{{ chrome.panel_class }}">
          <label for="apiKey" class="font-semibold form-label">API Key</label>
          <input id="apiKey" name="apiKey" type="password" autocomplete="off" class="{{ chrome.input_class }}">
          {% if error.is_some() %}
          <p class="{{ chrome.error_class }}" role="alert">{{ error.as_ref().unwrap() }}</p>
          {% endif %}
          <button type="submit" class="{{ chrome.button_class }}">Save key</button>
        </form>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct GateTemplate {
    chrome: Chrome,
    error: Option<String>,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Wordcraft Lexica • Error</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <div class="{{ chrome.card_class }}">
        <h1 class="{{ chrome.headline_class }}">Something went wrong</h1>
        <p class="{{ chrome.lede_class }}">{{ message }}</p>
        <a href="/" class="{{ chrome.button_class }}">Back to home</a>
      </div>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ErrorTemplate {
    chrome: Chrome,
    message: String,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use crate::llm::{FakeReply, FakeTransport, GenerateRequest, ModelTransport};
    use axum::{body, body::Body, http::Request};
    use std::time::Duration;
    use tower::ServiceExt;

    const KEY: &str = "test-key-1234567890";

    fn happy_transport() -> FakeTransport {
        FakeTransport::new()
            .with_reply(
                "list of synonyms",
                FakeReply::json(json!({"synonyms": ["joyful", "glad"]})),
            )
            .with_reply(
                "list of antonyms",
                FakeReply::json(json!({"antonyms": ["sad", "unhappy"]})),
            )
            .with_reply(
                "single best word",
                FakeReply::json(json!({
                    "suggestedWord": "elated",
                    "suggestionType": "synonym",
                    "explanation": "**Elated** suits a formal sentence."
                })),
            )
    }

    /// Never answers, like a provider that stalls mid-request.
    #[derive(Debug)]
    struct StalledTransport;

    #[async_trait::async_trait]
    impl ModelTransport for StalledTransport {
        async fn generate(
            &self,
            _request: GenerateRequest<'_>,
        ) -> Result<Option<String>, LexicaError> {
            std::future::pending().await
        }

        fn provider_name(&self) -> &'static str {
            "stalled"
        }
    }

    fn router_with(transport: Arc<dyn ModelTransport>) -> Router {
        let state = Arc::new(AppState {
            client: ModelClient::new(transport, "test-model"),
            sessions: SessionStore::default(),
            theme: WebTheme::Tailwind,
            base_url: "http://127.0.0.1:8080".to_string(),
        });
        build_router(state)
    }

    fn test_router(transport: FakeTransport) -> (Router, Arc<FakeTransport>) {
        let fake = Arc::new(transport);
        (router_with(fake.clone()), fake)
    }

    fn set_cookie(response: &Response, name: &str) -> Option<Cookie<'static>> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| Cookie::parse(value.to_string()).ok())
            .find(|cookie| cookie.name() == name)
    }

    fn get_with_cookies(cookies: &str) -> Request<Body> {
        Request::get("/")
            .header(header::COOKIE, cookies)
            .body(Body::empty())
            .unwrap()
    }

    fn key_cookie_header() -> String {
        format!("{API_KEY_STORAGE_KEY}={KEY}")
    }

    fn set_cookie_value(response: &Response, name: &str) -> Option<String> {
        set_cookie(response, name).map(|cookie| cookie.value().to_string())
    }

    async fn body_text(response: Response) -> String {
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn form_post(uri: &str, cookie: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(header::COOKIE, cookie)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn json_post(uri: &str, payload: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_service_name() {
        let (router, _) = test_router(FakeTransport::new());
        let response = router
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(payload["service"], "wordcraft-lexica");
    }

    #[tokio::test]
    async fn home_without_key_shows_the_gate() {
        let (router, _) = test_router(FakeTransport::new());
        let response = router
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let html = body_text(response).await;
        assert!(html.contains("action=\"/key\""));
        assert!(!html.contains("actionType"));
    }

    #[tokio::test]
    async fn storing_a_key_sets_the_gate_cookie() {
        let (router, _) = test_router(FakeTransport::new());
        let response = router
            .clone()
            .oneshot(form_post("/key", "", "apiKey=%20my-key-1234567%20"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let stored = set_cookie_value(&response, API_KEY_STORAGE_KEY).unwrap();
        assert_eq!(
            percent_decode_str(&stored).decode_utf8().unwrap(),
            "my-key-1234567"
        );

        let blank = router
            .oneshot(form_post("/key", "", "apiKey=%20%20"))
            .await
            .unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(blank).await.contains("API Key cannot be empty."));
    }

    #[tokio::test]
    async fn stored_key_cookie_outlives_the_browser_session() {
        let (router, _) = test_router(happy_transport());
        let response = router
            .clone()
            .oneshot(form_post("/key", "", "apiKey=my-key-1234567"))
            .await
            .unwrap();
        let raw = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find(|value| value.starts_with(API_KEY_STORAGE_KEY))
            .unwrap()
            .to_string();
        assert!(raw.contains("Max-Age="), "{raw}");
        assert!(raw.contains("Expires="), "{raw}");
        let key = set_cookie(&response, API_KEY_STORAGE_KEY).unwrap();
        assert!(key.max_age().is_some_and(|age| age.whole_days() > 365));
        assert_eq!(key.http_only(), Some(true));

        let response = router
            .oneshot(form_post(
                "/action",
                &key_cookie_header(),
                "actionType=fetchWordData&word=happy",
            ))
            .await
            .unwrap();
        let session = set_cookie(&response, SESSION_COOKIE).unwrap();
        assert!(session.max_age().is_none());
    }

    #[tokio::test]
    async fn abandoned_search_does_not_leave_a_pending_banner() {
        let router = router_with(Arc::new(StalledTransport));
        let session = generate_session_id();
        let cookies = format!("{}; {SESSION_COOKIE}={session}", key_cookie_header());

        let abandoned = tokio::time::timeout(
            Duration::from_millis(200),
            router.clone().oneshot(form_post(
                "/action",
                &cookies,
                "actionType=fetchWordData&word=happy",
            )),
        )
        .await;
        assert!(abandoned.is_err());

        let page = router.oneshot(get_with_cookies(&cookies)).await.unwrap();
        let html = body_text(page).await;
        assert!(html.contains(r#"role="status" hidden></p>"#));
        assert!(!html.contains("Results for"));
    }

    #[tokio::test]
    async fn forgetting_the_key_clears_the_session_display() {
        let (router, _) = test_router(happy_transport());
        let session = generate_session_id();
        let cookies = format!("{}; {SESSION_COOKIE}={session}", key_cookie_header());
        router
            .clone()
            .oneshot(form_post(
                "/action",
                &cookies,
                "actionType=fetchWordData&word=happy",
            ))
            .await
            .unwrap();
        let html = body_text(router.clone().oneshot(get_with_cookies(&cookies)).await.unwrap()).await;
        assert!(html.contains("joyful"));

        let response = router
            .clone()
            .oneshot(form_post("/key/forget", &cookies, ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let html = body_text(router.oneshot(get_with_cookies(&cookies)).await.unwrap()).await;
        assert!(!html.contains("joyful"));
        assert!(!html.contains("Results for"));
    }

    #[tokio::test]
    async fn forgetting_the_key_expires_the_cookie() {
        let (router, _) = test_router(FakeTransport::new());
        let response = router
            .oneshot(form_post("/key/forget", &key_cookie_header(), ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            set_cookie_value(&response, API_KEY_STORAGE_KEY).as_deref(),
            Some("")
        );
    }

    #[tokio::test]
    async fn search_then_suggest_through_the_form_flow() {
        let (router, fake) = test_router(happy_transport());
        let response = router
            .clone()
            .oneshot(form_post(
                "/action",
                &key_cookie_header(),
                "actionType=fetchWordData&word=happy",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let session = set_cookie_value(&response, SESSION_COOKIE).unwrap();
        let cookies = format!("{}; {SESSION_COOKIE}={session}", key_cookie_header());

        let page = router
            .clone()
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookies)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let html = body_text(page).await;
        assert!(html.contains("joyful"));
        assert!(html.contains("unhappy"));
        assert!(html.contains("word=joyful"));
        assert!(html.contains(r#"data-word="joyful""#));
        assert!(html.contains("navigator.clipboard.writeText"));
        assert!(html.contains(r#"data-pending="Searching for words…""#));

        let response = router
            .clone()
            .oneshot(form_post(
                "/action",
                &cookies,
                "actionType=fetchWordSuggestion&originalWord=happy&tone=Formal&context=She+felt+___+after+the+news",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let page = router
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookies)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let html = body_text(page).await;
        assert!(html.contains("elated"));
        assert!(html.contains("<strong>Elated</strong>"));
        assert!(html.contains("value=\"Formal\" selected"));
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test]
    async fn action_without_any_key_reports_validation_error() {
        let (router, fake) = test_router(happy_transport());
        let response = router
            .clone()
            .oneshot(form_post("/action", "", "actionType=fetchWordData&word=happy"))
            .await
            .unwrap();
        let session = set_cookie_value(&response, SESSION_COOKIE).unwrap();
        let cookies = format!("{}; {SESSION_COOKIE}={session}", key_cookie_header());
        let html = body_text(
            router
                .oneshot(
                    Request::get("/")
                        .header(header::COOKIE, &cookies)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap(),
        )
        .await;
        assert!(html.contains("A valid API Key is required. API Key seems too short."));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn api_lookup_returns_both_lists() {
        let (router, _) = test_router(happy_transport());
        let response = router
            .oneshot(json_post(
                "/api/lookup",
                json!({"word": "happy", "apiKey": KEY}),
            ))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: LookupPayload = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(payload.word, "happy");
        assert_eq!(payload.synonyms, vec!["joyful", "glad"]);
        assert_eq!(payload.antonyms, vec!["sad", "unhappy"]);
    }

    #[tokio::test]
    async fn api_errors_map_to_statuses() {
        let (router, fake) = test_router(
            FakeTransport::new().with_default_reply(FakeReply::Fail("quota exceeded".into())),
        );
        let cases = [
            (json!({"word": "", "apiKey": KEY}), StatusCode::BAD_REQUEST),
            (json!({"word": "happy"}), StatusCode::UNAUTHORIZED),
            (json!({"word": "happy", "apiKey": "short"}), StatusCode::BAD_REQUEST),
            (json!({"word": "happy", "apiKey": KEY}), StatusCode::BAD_GATEWAY),
        ];
        for (payload, expected) in cases {
            let response = router
                .clone()
                .oneshot(json_post("/api/lookup", payload.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), expected, "payload {payload}");
            if expected != StatusCode::BAD_GATEWAY {
                assert_eq!(fake.calls(), 0, "payload {payload}");
            }
        }
        assert!(fake.calls() >= 1);
    }

    #[tokio::test]
    async fn api_suggest_short_circuits_without_candidates() {
        let (router, fake) = test_router(happy_transport());
        let response = router
            .oneshot(json_post(
                "/api/suggest",
                json!({
                    "originalWord": "happy",
                    "context": "She felt ___ after the news",
                    "synonyms": [],
                    "antonyms": [],
                    "apiKey": KEY
                }),
            ))
            .await
            .unwrap();
        assert!(response.status().is_success());
        let payload: SuggestionResult = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(payload.suggestion_type, SuggestionType::None);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn service_worker_is_served_as_javascript() {
        let (router, _) = test_router(FakeTransport::new());
        let response = router
            .oneshot(Request::get("/sw.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_success());
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("application/javascript"));
        assert!(body_text(response).await.contains("wordcraft-lexica-cache-v1"));
    }

    #[test]
    fn explanation_markdown_escapes_raw_html() {
        let html = render_markdown_str("Use <script>alert(1)</script> **boldly**").unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("<strong>boldly</strong>"));
    }

    #[test]
    fn word_links_are_percent_encoded() {
        let links = word_links(&["over the moon".to_string()]);
        assert_eq!(links[0].href, "/?word=over%20the%20moon");
    }
}
