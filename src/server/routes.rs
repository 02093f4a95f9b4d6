//! Route handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use super::{error::ApiError, profile::TtsRequest, AppState, Profile};
use crate::{
    engine::{SpeechEngine, Synthesis, VoiceKey},
    language::Language,
    wav::pcm_to_wav,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run `key`'s engine load on the blocking pool.
async fn load_blocking(state: &Arc<AppState>, key: VoiceKey) -> anyhow::Result<Arc<dyn SpeechEngine>> {
    let st = state.clone();
    tokio::task::spawn_blocking(move || st.engine(key))
        .await
        .map_err(|e| anyhow::anyhow!("model load task failed: {e}"))?
}

// ─────────────────────────────────────────────────────────────────────────────
// POST /tts, POST /api/tts
// ─────────────────────────────────────────────────────────────────────────────

pub async fn tts(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let profile = state.profile();
    let Json(req) = payload
        .map_err(|e| profile.error(StatusCode::BAD_REQUEST, format!("invalid request body: {}", e.body_text())))?;
    let plan = profile.plan(&req)?;

    let text_chars = req.text.chars().count();
    info!(voice = %plan.key, chars = text_chars, speed = plan.options.speed, "synthesis request");

    let st = state.clone();
    let key = plan.key;
    let options = plan.options.clone();
    let text = req.text;
    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<Synthesis> {
        let engine = st.engine(key)?;
        engine.synthesize(&text, &options)
    })
    .await
    .map_err(|e| profile.error(StatusCode::INTERNAL_SERVER_ERROR, format!("synthesis task failed: {e}")))?;

    let synthesis = result.map_err(|e| {
        error!(voice = %key, error = %format!("{e:#}"), "synthesis failed");
        profile.error(StatusCode::INTERNAL_SERVER_ERROR, format!("TTS generation failed: {e:#}"))
    })?;
    if synthesis.pcm.is_empty() {
        warn!(voice = %key, "engine produced no audio, returning an empty WAV");
    }

    let wav = pcm_to_wav(&synthesis.pcm, synthesis.format);
    info!(
        voice = %key,
        bytes = wav.len(),
        duration_secs = synthesis.duration_secs(),
        "synthesis done"
    );

    let extra = profile.response_headers(&plan, &synthesis, text_chars, wav.len());
    let mut response = ([(header::CONTENT_TYPE, "audio/wav")], wav).into_response();
    for (name, value) in extra {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(HeaderName::from_static(name), value);
        }
    }
    Ok(response)
}

// ─────────────────────────────────────────────────────────────────────────────
// GET /health
// ─────────────────────────────────────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    let profile = state.profile();
    let service = profile.service_name();

    match profile {
        Profile::Melo => match load_blocking(&state, VoiceKey::Default).await {
            Ok(_) => Json(json!({ "status": "ok", "service": service, "version": VERSION })).into_response(),
            Err(e) => profile
                .error(StatusCode::SERVICE_UNAVAILABLE, format!("Service unavailable: {e:#}"))
                .into_response(),
        },
        Profile::MeloMultilang => Json(json!({
            "status": "ok",
            "service": service,
            "version": VERSION,
            "supported_languages": language_codes(profile),
        }))
        .into_response(),
        Profile::MeloZhEn => match load_blocking(&state, VoiceKey::Language(Language::ZH)).await {
            Ok(_) => Json(json!({
                "status": "ok",
                "service": service,
                "version": VERSION,
                "supported_languages": language_codes(profile),
            }))
            .into_response(),
            Err(e) => profile
                .error(StatusCode::INTERNAL_SERVER_ERROR, format!("Service unavailable: {e:#}"))
                .into_response(),
        },
        Profile::Piper | Profile::PiperDual => piper_health(&state).await,
    }
}

fn language_codes(profile: Profile) -> Vec<&'static str> {
    profile.languages().iter().map(|l| l.code()).collect()
}

async fn piper_health(state: &Arc<AppState>) -> Response {
    let profile = state.profile();
    let model_dir = state.config.piper.model_dir.display().to_string();

    let mut voices = Map::new();
    let mut warnings = Vec::new();
    for key in profile.voice_keys() {
        let Some(path) = state.loader().locate(key) else {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "service": profile.service_name(),
                    "error": format!("model file not found for voice '{key}'"),
                    "suggested_path": model_dir,
                })),
            )
                .into_response();
        };

        let mut entry = json!({ "model_path": path });
        match load_blocking(state, key).await {
            Ok(engine) => {
                entry["engine"] = json!(engine.name());
                entry["speakers"] = json!(engine.speakers());
            }
            Err(e) => {
                let warning = format!("model load failed: {e:#}");
                entry["warning"] = json!(warning);
                warnings.push(warning);
            }
        }
        voices.insert(key.to_string(), entry);
    }

    let mut body = json!({
        "status": "ok",
        "service": profile.service_name(),
        "model_dir": model_dir,
        "voices": voices,
    });
    if !warnings.is_empty() {
        body["warning"] = json!(warnings.join("; "));
    }
    Json(body).into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// GET /languages, GET /models, GET /
// ─────────────────────────────────────────────────────────────────────────────

pub async fn languages(State(state): State<Arc<AppState>>) -> Json<Value> {
    let profile = state.profile();
    let entries: Vec<Value> = profile
        .languages()
        .iter()
        .map(|lang| match profile {
            Profile::MeloZhEn => json!({
                "code": lang.code(),
                "name": lang.native_name(),
                "description": match lang {
                    Language::EN => "English (speakers: EN-US, EN-BR, EN_INDIA, EN-AU, EN-Default)",
                    _ => "Mandarin Chinese, mixed Chinese-English text supported",
                },
            }),
            _ => json!({
                "code": lang.code(),
                "name": lang.native_name(),
                "aliases": lang.aliases(),
            }),
        })
        .collect();
    Json(json!({ "supported_languages": entries }))
}

pub async fn models(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "models": state.loader().list_models() }))
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    let profile = state.profile();
    Json(json!({
        "service": profile.service_name(),
        "version": VERSION,
        "uptime_secs": state.uptime_secs(),
        "endpoints": {
            "POST /tts": "synthesise speech; body {text, lang?, speaker?, speed?}",
            "GET /health": "service health",
        },
        "max_text_length": profile.max_text_chars(),
    }))
}
