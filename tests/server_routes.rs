//! Router tests against an in-memory engine.

#![cfg(feature = "server")]

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::{bail, Result};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use ttsgate::{
    server::{preload, router, AppState, Profile, ServerConfig},
    wav::{AudioFormat, WavHeader},
    EngineLoader, Gender, SpeechEngine, Synthesis, SynthesisOptions, VoiceKey,
};

// ─────────────────────────────────────────────────────────────────────────────
// Fakes
// ─────────────────────────────────────────────────────────────────────────────

/// Emits one 16-bit sample per input character, punctuation excluded.
struct ToneEngine {
    key: VoiceKey,
}

impl SpeechEngine for ToneEngine {
    fn name(&self) -> &str {
        "tone"
    }

    fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Synthesis> {
        if text.contains("boom") {
            bail!("engine exploded");
        }
        let pcm = text
            .chars()
            .filter(|c| !c.is_ascii_punctuation())
            .flat_map(|c| (c as u16).to_le_bytes())
            .collect();
        Ok(Synthesis {
            pcm,
            format: AudioFormat::mono16(22_050),
            speaker: options.speaker.clone().or_else(|| Some(self.key.to_string())),
        })
    }

    fn speakers(&self) -> Vec<String> {
        vec!["amy".into(), "bob".into()]
    }
}

#[derive(Default)]
struct FakeLoader {
    loads: AtomicUsize,
    broken: bool,
    missing: bool,
}

impl EngineLoader for FakeLoader {
    fn load(&self, key: VoiceKey) -> Result<Arc<dyn SpeechEngine>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            bail!("model weights unreadable");
        }
        Ok(Arc::new(ToneEngine { key }))
    }

    fn locate(&self, key: VoiceKey) -> Option<String> {
        (!self.missing).then(|| format!("/models/{key}.onnx"))
    }

    fn list_models(&self) -> Vec<String> {
        vec!["zh_CN-huayan-medium.onnx".into()]
    }
}

fn app_with(profile: Profile, loader: FakeLoader) -> (Router, Arc<FakeLoader>) {
    let loader = Arc::new(loader);
    let state = AppState::new(ServerConfig::new(profile), loader.clone());
    (router(Arc::new(state)), loader)
}

fn app(profile: Profile) -> Router {
    app_with(profile, FakeLoader::default()).0
}

async fn post_json(app: Router, uri: &str, body: &str) -> axum::response::Response {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn get(app: Router, uri: &str) -> axum::response::Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(resp: &'a axum::response::Response, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

// ─────────────────────────────────────────────────────────────────────────────
// Synthesis
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn piper_returns_wav() {
    let resp = post_json(app(Profile::Piper), "/api/tts", r#"{"text":"你好"}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "content-type"), Some("audio/wav"));
    assert!(header(&resp, "content-disposition").is_none());

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let wav = WavHeader::parse(&bytes).unwrap();
    assert_eq!(wav.format.sample_rate, 22_050);
    assert_eq!(wav.data_size, 4);
    assert_eq!(bytes.len(), 48);
}

#[tokio::test]
async fn piper_rejects_empty_text_with_error_field() {
    let resp = post_json(app(Profile::Piper), "/api/tts", r#"{"text":""}"#).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(body["error"].is_string());
    assert!(body.get("detail").is_none());
}

#[tokio::test]
async fn melo_errors_use_detail_field() {
    let resp = post_json(app(Profile::MeloMultilang), "/tts", r#"{"text":""}"#).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["detail"].is_string());
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let resp = post_json(app(Profile::Piper), "/api/tts", "not json").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());
}

#[tokio::test]
async fn melo_length_limit() {
    let text = "a".repeat(501);
    let resp = post_json(app(Profile::Melo), "/tts", &format!(r#"{{"text":"{text}"}}"#)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let text = "好".repeat(500);
    let resp = post_json(app(Profile::Melo), "/tts", &format!(r#"{{"text":"{text}"}}"#)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-text-length"), Some("500"));
    assert_eq!(header(&resp, "x-audio-size"), Some("1044"));
    assert_eq!(header(&resp, "content-disposition"), Some("attachment; filename=speech.wav"));
}

#[tokio::test]
async fn multilang_headers_and_alias() {
    let resp = post_json(
        app(Profile::MeloMultilang),
        "/tts",
        r#"{"text":"hello","lang":"en","speaker":"EN-BR","extra":1}"#,
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-language"), Some("EN"));
    assert_eq!(header(&resp, "x-speaker-id"), Some("1"));
}

#[tokio::test]
async fn zh_en_falls_back_to_zh() {
    let resp = post_json(app(Profile::MeloZhEn), "/tts", r#"{"text":"bonjour","lang":"FR"}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header(&resp, "x-language"), Some("ZH"));
}

#[tokio::test]
async fn dual_gender_selection() {
    let (app, loader) = app_with(Profile::PiperDual, FakeLoader::default());

    let resp = post_json(app.clone(), "/api/tts", r#"{"text":"hi"}"#).await;
    assert_eq!(header(&resp, "x-gender"), Some(Gender::Female.as_str()));

    let resp = post_json(app.clone(), "/api/tts", r#"{"text":"hi","gender":"male"}"#).await;
    assert_eq!(header(&resp, "x-gender"), Some("male"));

    let resp = post_json(app.clone(), "/api/tts", r#"{"text":"hi","gender":"robot"}"#).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // Female again: served from the cache.
    let resp = post_json(app, "/api/tts", r#"{"text":"again"}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn invalid_speed_rejected() {
    let resp = post_json(app(Profile::Piper), "/api/tts", r#"{"text":"hi","speed":-1}"#).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_speed_means_default() {
    let resp = post_json(app(Profile::MeloMultilang), "/tts", r#"{"text":"hi","speed":0}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = post_json(app(Profile::Piper), "/api/tts", r#"{"text":"hi","speed":0.0}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn silent_output_is_empty_wav() {
    let resp = post_json(app(Profile::Piper), "/api/tts", r#"{"text":"..."}"#).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.len(), 44);
    assert_eq!(WavHeader::parse(&bytes).unwrap().data_size, 0);
}

#[tokio::test]
async fn synthesis_failure_is_500() {
    let resp = post_json(app(Profile::Piper), "/api/tts", r#"{"text":"boom"}"#).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert!(body["error"].as_str().unwrap().contains("engine exploded"));
}

#[tokio::test]
async fn load_failure_is_500_and_retried() {
    let (app, loader) = app_with(Profile::Piper, FakeLoader { broken: true, ..FakeLoader::default() });
    for _ in 0..2 {
        let resp = post_json(app.clone(), "/api/tts", r#"{"text":"hi"}"#).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Auxiliary routes
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn melo_health_unavailable_is_503() {
    let (app, _) = app_with(Profile::Melo, FakeLoader { broken: true, ..FakeLoader::default() });
    let resp = get(app, "/health").await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(resp).await["detail"].is_string());
}

#[tokio::test]
async fn zh_en_health() {
    let resp = get(app(Profile::MeloZhEn), "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["supported_languages"], serde_json::json!(["ZH", "EN"]));

    let (app, _) = app_with(Profile::MeloZhEn, FakeLoader { broken: true, ..FakeLoader::default() });
    assert_eq!(get(app, "/health").await.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn multilang_health_is_static() {
    let (app, loader) = app_with(Profile::MeloMultilang, FakeLoader { broken: true, ..FakeLoader::default() });
    let resp = get(app, "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["supported_languages"].as_array().unwrap().len(), 6);
    assert_eq!(loader.loads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn piper_health_missing_model() {
    let (app, _) = app_with(Profile::Piper, FakeLoader { missing: true, ..FakeLoader::default() });
    let resp = get(app, "/health").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["suggested_path"], "tts-services/models");
}

#[tokio::test]
async fn piper_health_load_failure_is_warning() {
    let (app, _) = app_with(Profile::PiperDual, FakeLoader { broken: true, ..FakeLoader::default() });
    let resp = get(app, "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "ok");
    assert!(body["warning"].is_string());
    assert!(body["voices"]["male"]["model_path"].is_string());
}

#[tokio::test]
async fn piper_health_reports_loaded_voice() {
    let resp = get(app(Profile::Piper), "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body.get("warning").is_none());
    assert_eq!(body["voices"]["default"]["engine"], "tone");
    assert_eq!(body["voices"]["default"]["speakers"], serde_json::json!(["amy", "bob"]));
}

#[tokio::test]
async fn failed_preload_still_serves() {
    let loader = Arc::new(FakeLoader { broken: true, ..FakeLoader::default() });
    let state = Arc::new(AppState::new(ServerConfig::new(Profile::PiperDual), loader.clone()));

    preload(state.clone()).await;
    assert_eq!(loader.loads.load(Ordering::SeqCst), 2);

    let resp = get(router(state), "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(json_body(resp).await["warning"].is_string());
    // Failed preloads are retried, not cached.
    assert_eq!(loader.loads.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn languages_and_models() {
    let body = json_body(get(app(Profile::MeloMultilang), "/languages").await).await;
    let langs = body["supported_languages"].as_array().unwrap();
    assert_eq!(langs.len(), 6);
    assert!(langs.iter().any(|l| l["code"] == "JP" && l["aliases"].as_array().unwrap().contains(&"ja".into())));

    let body = json_body(get(app(Profile::Piper), "/models").await).await;
    assert_eq!(body["models"][0], "zh_CN-huayan-medium.onnx");

    // Routes belong to their profile only.
    assert_eq!(get(app(Profile::Piper), "/languages").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn melo_root_lists_endpoints() {
    let body = json_body(get(app(Profile::Melo), "/").await).await;
    assert_eq!(body["service"], "Melo TTS");
    assert!(body["endpoints"]["POST /tts"].is_string());
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let resp = app(Profile::Piper)
        .oneshot(
            Request::get("/models")
                .header("origin", "http://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(header(&resp, "access-control-allow-origin"), Some("*"));
}
