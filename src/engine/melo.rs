//! MeloTTS through its `melo` command-line tool.
//!
//! MeloTTS only exists as a Python package; its CLI writes a WAV file:
//!
//! ```text
//! melo --language EN --speaker EN-US --speed 1.0 --device auto -- "text" out.wav
//! ```
//!
//! Each language is its own checkpoint with its own speaker table (see
//! [`Language::speakers`]).  The engine writes into a temporary file and
//! decodes it back to PCM so every engine hands the server the same shape.

use std::{
    path::{Path, PathBuf},
    process::Command,
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use super::{EngineLoader, SpeechEngine, Synthesis, SynthesisOptions, VoiceKey};
use crate::{language::Language, wav::decode_wav_file};

pub const DEFAULT_DEVICE: &str = "auto";

/// The requested speaker if the checkpoint has it, else the language default.
pub fn resolve_speaker(language: Language, requested: Option<&str>) -> &'static str {
    requested
        .and_then(|name| language.speakers().into_iter().find(|s| *s == name))
        .unwrap_or_else(|| language.default_speaker())
}

pub struct MeloCli {
    binary: PathBuf,
    language: Language,
    device: String,
    label: String,
}

impl MeloCli {
    pub fn new(binary: PathBuf, language: Language, device: impl Into<String>) -> Self {
        let label = format!("melo:{}", language);
        Self { binary, language, device: device.into(), label }
    }

    fn command(&self, text: &str, speaker: &str, speed: f32, output: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--language")
            .arg(self.language.code())
            .arg("--speaker")
            .arg(speaker)
            .arg("--speed")
            .arg(speed.to_string())
            .arg("--device")
            .arg(&self.device)
            .arg("--")
            .arg(text)
            .arg(output);
        cmd
    }
}

impl SpeechEngine for MeloCli {
    fn name(&self) -> &str {
        &self.label
    }

    fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Synthesis> {
        let speaker = resolve_speaker(self.language, options.speaker.as_deref());
        let out = tempfile::Builder::new()
            .prefix("melo-")
            .suffix(".wav")
            .tempfile()
            .context("Cannot create temporary WAV file")?;

        debug!(language = %self.language, speaker, speed = options.speed, "running melo");
        let output = self
            .command(text, speaker, options.speed, out.path())
            .output()
            .with_context(|| format!("Cannot run melo: {}", self.binary.display()))?;
        if !output.status.success() {
            bail!(
                "melo exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let (pcm, format) = decode_wav_file(out.path())?;
        Ok(Synthesis { pcm, format, speaker: Some(speaker.to_string()) })
    }

    fn speakers(&self) -> Vec<String> {
        self.language.speakers().into_iter().map(String::from).collect()
    }
}

/// Builds one [`MeloCli`] per language.
#[derive(Debug, Clone)]
pub struct MeloLoader {
    /// Explicit `melo` executable; otherwise looked up on `PATH`.
    pub binary: Option<PathBuf>,
    pub device: String,
}

impl Default for MeloLoader {
    fn default() -> Self {
        Self { binary: None, device: DEFAULT_DEVICE.to_string() }
    }
}

impl MeloLoader {
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        match &self.binary {
            Some(bin) => which::which(bin)
                .with_context(|| format!("melo executable not usable: {}", bin.display())),
            None => which::which("melo").context(
                "melo executable not found on PATH; install MeloTTS: \
                 pip install git+https://github.com/myshell-ai/MeloTTS.git",
            ),
        }
    }

    fn language_for(key: VoiceKey) -> Result<Language> {
        match key {
            VoiceKey::Default => Ok(Language::ZH),
            VoiceKey::Language(lang) => Ok(lang),
            VoiceKey::Gender(gender) => bail!("MeloTTS voices are chosen by language, not gender ({gender})"),
        }
    }
}

impl EngineLoader for MeloLoader {
    fn load(&self, key: VoiceKey) -> Result<Arc<dyn SpeechEngine>> {
        let language = Self::language_for(key)?;
        let binary = self.resolve_binary()?;
        info!(language = %language, binary = %binary.display(), speakers = ?language.speakers(), "MeloTTS model ready");
        Ok(Arc::new(MeloCli::new(binary, language, self.device.clone())))
    }

    fn locate(&self, key: VoiceKey) -> Option<String> {
        Self::language_for(key).ok()?;
        self.resolve_binary().ok().map(|p| p.display().to_string())
    }

    fn list_models(&self) -> Vec<String> {
        Language::ALL.iter().map(|l| l.code().to_string()).collect()
    }
}
