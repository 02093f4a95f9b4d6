//! # ttsgate
//!
//! Small HTTP servers in front of local text-to-speech engines:
//! [MeloTTS](https://github.com/myshell-ai/MeloTTS) and
//! [Piper](https://github.com/rhasspy/piper).
//!
//! ## Quick start
//!
//! ```no_run
//! use ttsgate::{engine::{piper::{PiperLoader, PiperSettings}, EngineLoader, SynthesisOptions, VoiceKey}, wav};
//!
//! let loader = PiperLoader::new(PiperSettings::new("tts-services/models"));
//! let engine = loader.load(VoiceKey::Default).unwrap();
//! let audio = engine.synthesize("你好，世界", &SynthesisOptions::default()).unwrap();
//! let bytes = wav::pcm_to_wav(&audio.pcm, audio.format);
//! std::fs::write("hello.wav", bytes).unwrap();
//! ```
//!
//! ## Server profiles
//! | Profile          | Synthesis route | Models keyed by            |
//! |------------------|-----------------|----------------------------|
//! | `melo`           | `POST /tts`     | one Chinese checkpoint     |
//! | `melo-multilang` | `POST /tts`     | language (ZH EN JP ES FR KR) |
//! | `melo-zh-en`     | `POST /tts`     | language (ZH EN)           |
//! | `piper`          | `POST /api/tts` | a single voice             |
//! | `piper-dual`     | `POST /api/tts` | gender (male, female)      |
//!
//! ## Engines
//! * **MeloTTS** runs through its `melo` command-line tool.
//! * **Piper** runs in-process on ONNX Runtime with the `onnx` feature
//!   (needs `libespeak-ng`), and otherwise through the `piper` executable.

pub mod cache;

// Voice download pulls in hf-hub, which is desktop-only.
#[cfg(not(any(target_os = "ios", target_os = "android")))]
pub mod download;

pub mod engine;
pub mod language;
pub mod organize;
pub mod phonemes;
#[cfg(feature = "onnx")]
pub mod phonemize;
#[cfg(feature = "server")]
pub mod server;
pub mod wav;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use cache::ModelCache;
pub use engine::{EngineLoader, SpeechEngine, Synthesis, SynthesisOptions, VoiceKey};
pub use language::{Gender, Language};

/// Wrap raw PCM in a 44-byte RIFF/WAVE header.
pub use wav::{pcm_to_wav, AudioFormat};
