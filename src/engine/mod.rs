//! Speech engines and the loaders that construct them.
//!
//! An engine turns text into raw PCM; the server wraps the PCM in a WAV
//! container.  Loaders build engines for a [`VoiceKey`] and are called at
//! most once per key thanks to [`ModelCache`](crate::cache::ModelCache).

use std::{fmt, sync::Arc};

use anyhow::Result;

use crate::{
    language::{Gender, Language},
    wav::{pcm_to_wav, AudioFormat},
};

pub mod melo;
pub mod piper;
#[cfg(feature = "onnx")]
pub mod piper_onnx;

/// Per-request synthesis knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOptions {
    /// Engine-specific speaker name (or numeric id for Piper).
    pub speaker: Option<String>,
    /// Speaking-rate multiplier; 1.0 is the model's natural pace.
    pub speed: f32,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self { speaker: None, speed: 1.0 }
    }
}

/// Raw audio produced by an engine.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Little-endian interleaved PCM.
    pub pcm: Vec<u8>,
    pub format: AudioFormat,
    /// Speaker actually used, when the engine resolved one.
    pub speaker: Option<String>,
}

impl Synthesis {
    pub fn duration_secs(&self) -> f32 {
        self.format.duration_secs(self.pcm.len())
    }

    pub fn into_wav(self) -> Vec<u8> {
        pcm_to_wav(&self.pcm, self.format)
    }
}

pub trait SpeechEngine: Send + Sync {
    /// Short label for logs and health output.
    fn name(&self) -> &str;

    fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Synthesis>;

    /// Speaker names the engine accepts.
    fn speakers(&self) -> Vec<String> {
        Vec::new()
    }
}

/// What a cached model is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VoiceKey {
    Default,
    Language(Language),
    Gender(Gender),
}

impl fmt::Display for VoiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceKey::Default => f.write_str("default"),
            VoiceKey::Language(lang) => write!(f, "{lang}"),
            VoiceKey::Gender(gender) => write!(f, "{gender}"),
        }
    }
}

/// Builds engines on demand.
pub trait EngineLoader: Send + Sync {
    fn load(&self, key: VoiceKey) -> Result<Arc<dyn SpeechEngine>>;

    /// Where the model for `key` would come from (file path or command),
    /// without loading it.  `None` when no model can be located.
    fn locate(&self, key: VoiceKey) -> Option<String>;

    /// Model files available to this loader.
    fn list_models(&self) -> Vec<String> {
        Vec::new()
    }
}
