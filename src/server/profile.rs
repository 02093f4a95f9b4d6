//! Server profiles: one per supported deployment shape.
//!
//! A profile fixes the route layout, the validation rules, how a request is
//! mapped to a cached voice, the response headers, and the error body shape.

use axum::http::StatusCode;
use serde::Deserialize;
use tracing::warn;

use super::error::{ApiError, ErrorStyle};
use crate::{
    engine::{Synthesis, SynthesisOptions, VoiceKey},
    language::{Gender, Language},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Profile {
    /// MeloTTS, one Chinese checkpoint; `lang` only picks the speaker.
    Melo,
    /// MeloTTS, one checkpoint per language (ZH EN JP ES FR KR).
    MeloMultilang,
    /// MeloTTS, Chinese and English only.
    MeloZhEn,
    /// Piper, a single voice.
    Piper,
    /// Piper, a male and a female voice.
    PiperDual,
}

/// JSON body of a synthesis request.  Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtsRequest {
    #[serde(default)]
    pub text: String,
    pub lang: Option<String>,
    pub speaker: Option<String>,
    pub speed: Option<f32>,
    pub gender: Option<String>,
}

/// What a validated request resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub key: VoiceKey,
    pub options: SynthesisOptions,
    pub language: Option<Language>,
    pub gender: Option<Gender>,
}

const ZH_EN: [Language; 2] = [Language::ZH, Language::EN];

impl Profile {
    pub fn service_name(self) -> &'static str {
        match self {
            Profile::Melo => "Melo TTS",
            Profile::MeloMultilang => "Melo TTS Multi-Language",
            Profile::MeloZhEn => "Melo TTS ZH/EN",
            Profile::Piper => "piper-tts",
            Profile::PiperDual => "piper-tts-dual",
        }
    }

    pub fn is_piper(self) -> bool {
        matches!(self, Profile::Piper | Profile::PiperDual)
    }

    pub fn tts_route(self) -> &'static str {
        if self.is_piper() {
            "/api/tts"
        } else {
            "/tts"
        }
    }

    pub fn default_port(self) -> u16 {
        if self.is_piper() {
            5000
        } else {
            7860
        }
    }

    pub fn max_text_chars(self) -> Option<usize> {
        match self {
            Profile::Melo => Some(500),
            Profile::MeloMultilang | Profile::MeloZhEn => Some(1000),
            Profile::Piper | Profile::PiperDual => None,
        }
    }

    /// Path of the profile's informational route.
    pub fn info_route(self) -> &'static str {
        match self {
            Profile::Melo => "/",
            Profile::MeloMultilang | Profile::MeloZhEn => "/languages",
            Profile::Piper | Profile::PiperDual => "/models",
        }
    }

    /// `(method, path, purpose)` for every route the profile serves.
    pub fn routes(self) -> [(&'static str, &'static str, &'static str); 3] {
        let info = match self {
            Profile::Melo => "service information",
            Profile::MeloMultilang | Profile::MeloZhEn => "supported languages",
            Profile::Piper | Profile::PiperDual => "installed voices",
        };
        [
            ("POST", self.tts_route(), "synthesise speech"),
            ("GET", "/health", "service health"),
            ("GET", self.info_route(), info),
        ]
    }

    pub fn error_style(self) -> ErrorStyle {
        if self.is_piper() {
            ErrorStyle::Error
        } else {
            ErrorStyle::Detail
        }
    }

    /// Languages advertised by `/health` and `/languages`.
    pub fn languages(self) -> &'static [Language] {
        match self {
            Profile::MeloMultilang => &Language::ALL,
            Profile::MeloZhEn => &ZH_EN,
            Profile::Melo | Profile::Piper | Profile::PiperDual => &[],
        }
    }

    /// Voices whose model files `/health` checks and startup preloads.
    pub fn voice_keys(self) -> Vec<VoiceKey> {
        match self {
            Profile::Piper | Profile::Melo => vec![VoiceKey::Default],
            Profile::PiperDual => Gender::ALL.iter().map(|g| VoiceKey::Gender(*g)).collect(),
            Profile::MeloMultilang | Profile::MeloZhEn => vec![VoiceKey::Language(Language::ZH)],
        }
    }

    pub fn error(self, status: StatusCode, message: impl Into<String>) -> ApiError {
        ApiError::new(status, message, self.error_style())
    }

    fn bad_request(self, message: impl Into<String>) -> ApiError {
        self.error(StatusCode::BAD_REQUEST, message)
    }

    /// Validate `req` and resolve the voice it needs.
    pub fn plan(self, req: &TtsRequest) -> Result<Plan, ApiError> {
        let empty = match self {
            Profile::Melo => req.text.trim().is_empty(),
            _ => req.text.is_empty(),
        };
        if empty {
            return Err(self.bad_request(if self.is_piper() {
                "missing text parameter"
            } else {
                "text must not be empty"
            }));
        }
        if let Some(max) = self.max_text_chars() {
            if req.text.chars().count() > max {
                return Err(self.bad_request(format!("text must not exceed {max} characters")));
            }
        }

        // 0 means "unset", like an absent field.
        let speed = match req.speed {
            None => 1.0,
            Some(s) if s == 0.0 => 1.0,
            Some(s) => s,
        };
        if !(speed.is_finite() && speed > 0.0) {
            return Err(self.bad_request("speed must be a positive number"));
        }
        let lang_code = req.lang.as_deref().unwrap_or("ZH");

        let (key, language, gender, speaker) = match self {
            Profile::Melo => {
                // Single checkpoint: the language code doubles as speaker name.
                let speaker = req.speaker.clone().unwrap_or_else(|| lang_code.to_string());
                (VoiceKey::Default, None, None, Some(speaker))
            }
            Profile::MeloMultilang => {
                let lang = Language::from_code_or_default(lang_code);
                (VoiceKey::Language(lang), Some(lang), None, req.speaker.clone())
            }
            Profile::MeloZhEn => {
                let lang = match Language::lookup(&lang_code.to_uppercase()) {
                    Some(lang) if ZH_EN.contains(&lang) => lang,
                    _ => {
                        warn!(lang = lang_code, "unsupported language, using ZH");
                        Language::ZH
                    }
                };
                (VoiceKey::Language(lang), Some(lang), None, None)
            }
            Profile::Piper => (VoiceKey::Default, None, None, req.speaker.clone()),
            Profile::PiperDual => {
                let gender = match req.gender.as_deref() {
                    None => Gender::Female,
                    Some(g) => Gender::parse(g).ok_or_else(|| {
                        self.bad_request(format!("invalid gender '{g}', expected male or female"))
                    })?,
                };
                (VoiceKey::Gender(gender), None, Some(gender), req.speaker.clone())
            }
        };

        Ok(Plan {
            key,
            options: SynthesisOptions { speaker, speed },
            language,
            gender,
        })
    }

    /// Extra headers for a successful synthesis response.
    pub fn response_headers(
        self,
        plan: &Plan,
        synthesis: &Synthesis,
        text_chars: usize,
        wav_len: usize,
    ) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if !self.is_piper() {
            headers.push(("content-disposition", "attachment; filename=speech.wav".to_string()));
        }
        match self {
            Profile::Melo => {
                headers.push(("x-text-length", text_chars.to_string()));
                headers.push(("x-audio-size", wav_len.to_string()));
            }
            Profile::MeloMultilang => {
                if let Some(lang) = plan.language {
                    headers.push(("x-language", lang.code().to_string()));
                    let id = synthesis
                        .speaker
                        .as_deref()
                        .and_then(|s| lang.speaker_id(s))
                        .unwrap_or(0);
                    headers.push(("x-speaker-id", id.to_string()));
                }
            }
            Profile::MeloZhEn => {
                if let Some(lang) = plan.language {
                    headers.push(("x-language", lang.code().to_string()));
                }
            }
            Profile::Piper => {}
            Profile::PiperDual => {
                if let Some(gender) = plan.gender {
                    headers.push(("x-gender", gender.as_str().to_string()));
                }
            }
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::AudioFormat;

    fn req(text: &str) -> TtsRequest {
        TtsRequest { text: text.to_string(), ..TtsRequest::default() }
    }

    #[test]
    fn test_empty_text_rejected() {
        for profile in [Profile::MeloMultilang, Profile::Piper, Profile::PiperDual] {
            let err = profile.plan(&req("")).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
        }
        // Only the single-model server trims before checking.
        assert!(Profile::Melo.plan(&req("   ")).is_err());
        assert!(Profile::MeloZhEn.plan(&req("   ")).is_ok());
    }

    #[test]
    fn test_length_limits_count_chars() {
        let chinese = "好".repeat(500);
        assert!(Profile::Melo.plan(&req(&chinese)).is_ok());
        assert!(Profile::Melo.plan(&req(&"好".repeat(501))).is_err());
        assert!(Profile::MeloMultilang.plan(&req(&"a".repeat(1000))).is_ok());
        assert!(Profile::MeloZhEn.plan(&req(&"a".repeat(1001))).is_err());
        assert!(Profile::Piper.plan(&req(&"a".repeat(10_000))).is_ok());
    }

    #[test]
    fn test_speed_validation() {
        let mut r = req("hi");
        r.speed = Some(0.0);
        assert_eq!(Profile::Piper.plan(&r).unwrap().options.speed, 1.0);
        r.speed = Some(-0.5);
        assert!(Profile::Piper.plan(&r).is_err());
        r.speed = Some(f32::INFINITY);
        assert!(Profile::MeloZhEn.plan(&r).is_err());
        r.speed = Some(f32::NAN);
        assert!(Profile::MeloMultilang.plan(&r).is_err());
        r.speed = Some(1.25);
        assert_eq!(Profile::Piper.plan(&r).unwrap().options.speed, 1.25);
    }

    #[test]
    fn test_multilang_aliases() {
        let mut r = req("こんにちは");
        r.lang = Some("ja".into());
        assert_eq!(Profile::MeloMultilang.plan(&r).unwrap().key, VoiceKey::Language(Language::JP));
        r.lang = Some("xx".into());
        assert_eq!(Profile::MeloMultilang.plan(&r).unwrap().key, VoiceKey::Language(Language::ZH));
        r.lang = None;
        assert_eq!(Profile::MeloMultilang.plan(&r).unwrap().language, Some(Language::ZH));
    }

    #[test]
    fn test_zh_en_upper_and_fallback() {
        let mut r = req("hello");
        r.lang = Some("en".into());
        assert_eq!(Profile::MeloZhEn.plan(&r).unwrap().key, VoiceKey::Language(Language::EN));
        r.lang = Some("FR".into());
        assert_eq!(Profile::MeloZhEn.plan(&r).unwrap().key, VoiceKey::Language(Language::ZH));
    }

    #[test]
    fn test_melo_single_uses_lang_as_speaker() {
        let mut r = req("你好");
        r.lang = Some("EN".into());
        let plan = Profile::Melo.plan(&r).unwrap();
        assert_eq!(plan.key, VoiceKey::Default);
        assert_eq!(plan.options.speaker.as_deref(), Some("EN"));
    }

    #[test]
    fn test_dual_gender() {
        let mut r = req("你好");
        assert_eq!(Profile::PiperDual.plan(&r).unwrap().key, VoiceKey::Gender(Gender::Female));
        r.gender = Some("MALE".into());
        assert_eq!(Profile::PiperDual.plan(&r).unwrap().key, VoiceKey::Gender(Gender::Male));
        r.gender = Some("other".into());
        assert_eq!(Profile::PiperDual.plan(&r).unwrap_err().status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_headers() {
        let mut r = req("hello");
        r.lang = Some("en".into());
        let plan = Profile::MeloMultilang.plan(&r).unwrap();
        let synthesis = Synthesis {
            pcm: vec![0; 4],
            format: AudioFormat::mono16(44_100),
            speaker: Some("EN-BR".into()),
        };
        let headers = Profile::MeloMultilang.response_headers(&plan, &synthesis, 5, 48);
        assert!(headers.contains(&("x-language", "EN".to_string())));
        assert!(headers.contains(&("x-speaker-id", "1".to_string())));

        let plan = Profile::Piper.plan(&r).unwrap();
        assert!(Profile::Piper.response_headers(&plan, &synthesis, 5, 48).is_empty());
    }

    #[test]
    fn test_routes_and_ports() {
        assert_eq!(Profile::Piper.tts_route(), "/api/tts");
        assert_eq!(Profile::MeloZhEn.tts_route(), "/tts");
        assert_eq!(Profile::PiperDual.default_port(), 5000);
        assert_eq!(Profile::Melo.default_port(), 7860);
    }

    #[test]
    fn test_route_list_includes_info_route() {
        let paths: Vec<_> = Profile::Piper.routes().iter().map(|(_, p, _)| *p).collect();
        assert_eq!(paths, vec!["/api/tts", "/health", "/models"]);
        assert_eq!(Profile::MeloZhEn.routes()[2].1, "/languages");
        assert_eq!(Profile::Melo.routes()[2], ("GET", "/", "service information"));
    }
}
