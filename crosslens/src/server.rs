use std::sync::Arc;

use anyhow::{anyhow, Result};
use rocket::figment::Figment;
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::{status, Redirect};
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, post, routes, Build, Request, Rocket, State};
use serde_json::{json, Value};

use common::ServerConfig;

use crate::context::build_context;
use crate::cors::{preflight, Cors};
use crate::error::ServiceError;
use crate::extraction::ExtractionEngine;
use crate::frames::analyze_frames;
use crate::llm::LlmProvider;
use crate::models::{
    ContextBuildRequest, ContextBuildResponse, FramesAnalyzeRequest, FramesAnalyzeResponse,
    GenerationRequest, GenerationResponse,
};
use crate::podcast::{generate_audio, PodcastServices, PodcastSettings};
use crate::tts::TtsProvider;

/// State of the CrossLens analysis backend.
pub struct AppState {
    pub llm: Arc<dyn LlmProvider>,
    pub engine: Arc<dyn ExtractionEngine>,
    pub concurrency: usize,
}

/// State of the podcast service.
pub struct PodcastState {
    pub llm: Arc<dyn LlmProvider>,
    pub engine: Arc<dyn ExtractionEngine>,
    pub tts: Arc<dyn TtsProvider>,
    pub settings: PodcastSettings,
}

#[get("/health")]
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[post("/v1/context/build", data = "<body>")]
async fn context_build(
    state: &State<AppState>,
    body: Json<ContextBuildRequest>,
) -> Result<Json<ContextBuildResponse>, ServiceError> {
    build_context(state.llm.as_ref(), &body).await.map(Json)
}

#[post("/v1/frames/analyze", data = "<body>")]
async fn frames_analyze(
    state: &State<AppState>,
    body: Json<FramesAnalyzeRequest>,
) -> Result<Json<FramesAnalyzeResponse>, ServiceError> {
    analyze_frames(state.llm.as_ref(), state.engine.as_ref(), state.concurrency, &body)
        .await
        .map(Json)
}

/// Redirect root to static index.html
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

#[post("/api/generate", data = "<body>")]
async fn podcast_generate(
    state: &State<PodcastState>,
    body: Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, ServiceError> {
    let services = PodcastServices {
        llm: state.llm.as_ref(),
        tts: state.tts.as_ref(),
        engine: state.engine.as_ref(),
    };
    generate_audio(services, &state.settings, &body).await.map(Json)
}

/// Rocket's own failures (unknown route, malformed JSON body) use the same
/// `{"detail": ...}` shape as [`ServiceError`].
#[catch(default)]
fn json_catcher(status: Status, _req: &Request<'_>) -> status::Custom<Json<Value>> {
    let detail = status.reason().unwrap_or("Request failed");
    status::Custom(status, Json(json!({ "detail": detail })))
}

/// Rocket figment with `[server]` bind/port merged over Rocket's defaults.
pub fn figment(server: Option<&ServerConfig>) -> Figment {
    let mut fig = rocket::Config::figment();
    if let Some(server) = server {
        if let Some(bind) = &server.bind {
            fig = fig.merge(("address", bind.clone()));
        }
        if let Some(port) = server.port {
            fig = fig.merge(("port", port));
        }
    }
    fig
}

pub fn crosslens_rocket(fig: Figment, state: AppState, cors: Cors) -> Rocket<Build> {
    rocket::custom(fig)
        .manage(state)
        .attach(cors)
        .mount("/", routes![health, context_build, frames_analyze, preflight])
        .register("/", catchers![json_catcher])
}

/// The static directory must exist before this is called.
pub fn podcast_rocket(fig: Figment, state: PodcastState) -> Rocket<Build> {
    let static_dir = state.settings.static_dir.clone();
    rocket::custom(fig)
        .manage(state)
        .mount("/", routes![index_redirect, health, podcast_generate])
        .mount("/static", FileServer::from(static_dir))
        .register("/", catchers![json_catcher])
}

/// Run `rocket` until shutdown (SIGINT/SIGTERM etc.).
pub async fn launch(rocket: Rocket<Build>) -> Result<()> {
    tracing::info!("Starting Rocket HTTP server");
    rocket
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
