//! Piper voices: config parsing, model discovery, and the command-line runner.
//!
//! A Piper voice is a pair of files:
//!
//! * `<voice>.onnx` — the VITS model
//! * `<voice>.onnx.json` — sample rate, speakers, espeak voice, phoneme ids
//!
//! [`PiperLoader`] locates the model for a [`VoiceKey`] and builds an engine
//! for it.  With the `onnx` feature the voice runs in-process
//! ([`PiperOnnx`](super::piper_onnx::PiperOnnx)); otherwise (or if that fails)
//! the `piper` executable is driven with `--output-raw` and its stdout is the
//! raw 16-bit PCM.

use std::{
    collections::HashMap,
    io::Write,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{EngineLoader, SpeechEngine, Synthesis, SynthesisOptions, VoiceKey};
use crate::{language::Gender, phonemes::PhonemeIdMap, wav::AudioFormat};

/// Preferred voices, looked up inside the model directory in this order.
pub const PREFERRED_MODELS: &[&str] = &[
    "zh_CN-huayan-medium.onnx",
    "xiaoyan-medium.onnx",
    "zh_CN-xiaoyan-medium.onnx",
];

pub const DEFAULT_MALE_MODEL: &str = "zh_CN-chaowen-medium.onnx";
pub const DEFAULT_FEMALE_MODEL: &str = "zh_CN-huayan-medium.onnx";

// ─────────────────────────────────────────────────────────────────────────────
// <voice>.onnx.json
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AudioSection {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EspeakSection {
    pub voice: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceSection {
    #[serde(default = "default_noise_scale")]
    pub noise_scale: f32,
    #[serde(default = "default_length_scale")]
    pub length_scale: f32,
    #[serde(default = "default_noise_w")]
    pub noise_w: f32,
}

fn default_sample_rate() -> u32 {
    22_050
}
fn default_noise_scale() -> f32 {
    0.667
}
fn default_length_scale() -> f32 {
    1.0
}
fn default_noise_w() -> f32 {
    0.8
}
fn default_num_speakers() -> u32 {
    1
}
fn default_phoneme_type() -> String {
    "espeak".to_string()
}

impl Default for AudioSection {
    fn default() -> Self {
        Self { sample_rate: default_sample_rate() }
    }
}

impl Default for EspeakSection {
    fn default() -> Self {
        Self { voice: "en-us".to_string() }
    }
}

impl Default for InferenceSection {
    fn default() -> Self {
        Self {
            noise_scale: default_noise_scale(),
            length_scale: default_length_scale(),
            noise_w: default_noise_w(),
        }
    }
}

/// Deserialised `<voice>.onnx.json`.  Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub audio: AudioSection,
    #[serde(default)]
    pub espeak: EspeakSection,
    #[serde(default)]
    pub inference: InferenceSection,
    /// `"espeak"` or `"text"` (raw code points are the phonemes).
    #[serde(default = "default_phoneme_type")]
    pub phoneme_type: String,
    #[serde(default)]
    pub phoneme_id_map: PhonemeIdMap,
    #[serde(default = "default_num_speakers")]
    pub num_speakers: u32,
    #[serde(default)]
    pub speaker_id_map: HashMap<String, i64>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            audio: AudioSection::default(),
            espeak: EspeakSection::default(),
            inference: InferenceSection::default(),
            phoneme_type: default_phoneme_type(),
            phoneme_id_map: PhonemeIdMap::new(),
            num_speakers: default_num_speakers(),
            speaker_id_map: HashMap::new(),
        }
    }
}

impl VoiceConfig {
    /// Load the config that sits next to `model_path`.
    ///
    /// A missing file yields the defaults (22.05 kHz, one speaker), which is
    /// enough for the command-line runner.
    pub fn load_for(model_path: &Path) -> Result<Self> {
        let path = config_path(model_path);
        if !path.exists() {
            warn!(config = %path.display(), "voice config missing, using defaults");
            return Ok(Self::default());
        }
        let bytes = std::fs::read(&path)
            .with_context(|| format!("Cannot read voice config: {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse voice config: {}", path.display()))
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::mono16(self.audio.sample_rate)
    }

    /// `length_scale` for a speed multiplier: faster speech, shorter phonemes.
    pub fn length_scale(&self, speed: f32) -> f32 {
        self.inference.length_scale / speed
    }

    /// Resolve a requested speaker to a numeric id.
    ///
    /// Single-speaker voices ignore the request.  Multi-speaker voices accept
    /// a name from `speaker_id_map` or a numeric id below `num_speakers`.
    pub fn resolve_speaker(&self, speaker: Option<&str>) -> Result<Option<i64>> {
        if self.num_speakers <= 1 {
            return Ok(None);
        }
        let Some(speaker) = speaker else {
            return Ok(None);
        };
        if let Some(&id) = self.speaker_id_map.get(speaker) {
            return Ok(Some(id));
        }
        match speaker.parse::<i64>() {
            Ok(id) if (0..self.num_speakers as i64).contains(&id) => Ok(Some(id)),
            _ => bail!(
                "Unknown speaker '{}'. Available: {:?}",
                speaker,
                self.speaker_names()
            ),
        }
    }

    /// Speaker names ordered by id.
    pub fn speaker_names(&self) -> Vec<String> {
        let mut names: Vec<(&String, &i64)> = self.speaker_id_map.iter().collect();
        names.sort_by_key(|(_, id)| **id);
        names.into_iter().map(|(name, _)| name.clone()).collect()
    }
}

/// `voice.onnx` → `voice.onnx.json`.
pub fn config_path(model_path: &Path) -> PathBuf {
    let mut name = model_path.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}

// ─────────────────────────────────────────────────────────────────────────────
// Model discovery
// ─────────────────────────────────────────────────────────────────────────────

fn is_usable_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

/// First existing, non-empty model among the preferred names in `model_dir`,
/// then among `fallbacks`.
pub fn find_model(model_dir: &Path, preferred: &[&str], fallbacks: &[PathBuf]) -> Option<PathBuf> {
    preferred
        .iter()
        .map(|name| model_dir.join(name))
        .chain(fallbacks.iter().cloned())
        .find(|p| is_usable_file(p))
}

/// Fallback locations outside the model directory.
pub fn fallback_models() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join("piper-models").join("xiaoyan-medium.onnx"));
    }
    paths.push(PathBuf::from("models").join("xiaoyan-medium.onnx"));
    paths
}

/// Sorted `.onnx` file names in `model_dir`; empty when it does not exist.
pub fn list_models(model_dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(model_dir) else {
        return Vec::new();
    };
    let mut models: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".onnx"))
        .collect();
    models.sort();
    models
}

// ─────────────────────────────────────────────────────────────────────────────
// Command-line runner
// ─────────────────────────────────────────────────────────────────────────────

/// A voice synthesised by spawning the `piper` executable per request.
pub struct PiperCli {
    binary: PathBuf,
    model_path: PathBuf,
    config: VoiceConfig,
    label: String,
}

impl PiperCli {
    pub fn new(binary: PathBuf, model_path: PathBuf, config: VoiceConfig) -> Self {
        let label = format!("piper-cli:{}", file_label(&model_path));
        Self { binary, model_path, config, label }
    }

    fn command(&self, options: &SynthesisOptions) -> Result<Command> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--model")
            .arg(&self.model_path)
            .arg("--output-raw")
            .arg("--length-scale")
            .arg(self.config.length_scale(options.speed).to_string());
        if let Some(id) = self.config.resolve_speaker(options.speaker.as_deref())? {
            cmd.arg("--speaker").arg(id.to_string());
        }
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());
        Ok(cmd)
    }
}

impl SpeechEngine for PiperCli {
    fn name(&self) -> &str {
        &self.label
    }

    fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Synthesis> {
        let mut child = self
            .command(options)?
            .spawn()
            .with_context(|| format!("Cannot run piper: {}", self.binary.display()))?;

        // Feed stdin from another thread so a full stdout pipe cannot stall us.
        let mut stdin = child.stdin.take().context("piper stdin unavailable")?;
        let input = text.as_bytes().to_vec();
        let writer = std::thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output().context("piper did not finish")?;
        let written = writer.join();

        if !output.status.success() {
            bail!(
                "piper exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        match written {
            Ok(result) => result.context("Failed to write text to piper")?,
            Err(_) => bail!("piper stdin writer panicked"),
        }
        debug!(bytes = output.stdout.len(), model = %self.model_path.display(), "piper output");

        Ok(Synthesis {
            pcm: output.stdout,
            format: self.config.format(),
            speaker: options.speaker.clone(),
        })
    }

    fn speakers(&self) -> Vec<String> {
        self.config.speaker_names()
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Loader
// ─────────────────────────────────────────────────────────────────────────────

/// Where Piper models and the executable live.
#[derive(Debug, Clone)]
pub struct PiperSettings {
    pub model_dir: PathBuf,
    /// Explicit model for [`VoiceKey::Default`]; skips discovery.
    pub model: Option<PathBuf>,
    /// Model file per gender, relative to `model_dir` unless absolute.
    pub gender_models: HashMap<Gender, PathBuf>,
    /// Explicit `piper` executable.
    pub binary: Option<PathBuf>,
}

impl PiperSettings {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        let gender_models = HashMap::from([
            (Gender::Male, PathBuf::from(DEFAULT_MALE_MODEL)),
            (Gender::Female, PathBuf::from(DEFAULT_FEMALE_MODEL)),
        ]);
        Self { model_dir: model_dir.into(), model: None, gender_models, binary: None }
    }
}

pub struct PiperLoader {
    settings: PiperSettings,
}

impl PiperLoader {
    pub fn new(settings: PiperSettings) -> Self {
        Self { settings }
    }

    pub fn model_path(&self, key: VoiceKey) -> Option<PathBuf> {
        match key {
            VoiceKey::Default => match &self.settings.model {
                Some(path) => is_usable_file(path).then(|| path.clone()),
                None => find_model(&self.settings.model_dir, PREFERRED_MODELS, &fallback_models()),
            },
            VoiceKey::Gender(gender) => {
                let file = self.settings.gender_models.get(&gender)?;
                let path = self.settings.model_dir.join(file);
                is_usable_file(&path).then_some(path)
            }
            VoiceKey::Language(_) => None,
        }
    }

    /// The `piper` executable: configured path, then `PATH`, then
    /// `<model_dir>/../piper/piper`.
    pub fn resolve_binary(&self) -> Result<PathBuf> {
        if let Some(bin) = &self.settings.binary {
            return which::which(bin)
                .with_context(|| format!("piper executable not usable: {}", bin.display()));
        }
        if let Ok(bin) = which::which("piper") {
            return Ok(bin);
        }
        let bundled_dir = self
            .settings
            .model_dir
            .parent()
            .map(|p| p.join("piper"))
            .unwrap_or_else(|| PathBuf::from("piper"));
        for name in ["piper", "piper.exe"] {
            if let Ok(bin) = which::which(bundled_dir.join(name)) {
                return Ok(bin);
            }
        }
        bail!("piper executable not found on PATH or in {}", bundled_dir.display())
    }

    #[cfg(feature = "onnx")]
    fn load_native(&self, model_path: &Path, config: &VoiceConfig) -> Option<Arc<dyn SpeechEngine>> {
        match super::piper_onnx::PiperOnnx::load(model_path, config.clone()) {
            Ok(voice) => Some(Arc::new(voice)),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "ONNX runtime unavailable, trying piper executable");
                None
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    fn load_native(&self, _model_path: &Path, _config: &VoiceConfig) -> Option<Arc<dyn SpeechEngine>> {
        None
    }
}

impl EngineLoader for PiperLoader {
    fn load(&self, key: VoiceKey) -> Result<Arc<dyn SpeechEngine>> {
        let Some(model_path) = self.model_path(key) else {
            bail!(
                "No Piper model found for voice '{}'; download one into {}",
                key,
                self.settings.model_dir.display()
            );
        };
        info!(voice = %key, model = %model_path.display(), "loading Piper voice");
        let config = VoiceConfig::load_for(&model_path)?;

        if let Some(engine) = self.load_native(&model_path, &config) {
            return Ok(engine);
        }

        let binary = self.resolve_binary()?;
        info!(binary = %binary.display(), "using piper executable");
        Ok(Arc::new(PiperCli::new(binary, model_path, config)))
    }

    fn locate(&self, key: VoiceKey) -> Option<String> {
        self.model_path(key).map(|p| p.display().to_string())
    }

    fn list_models(&self) -> Vec<String> {
        list_models(&self.settings.model_dir)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
