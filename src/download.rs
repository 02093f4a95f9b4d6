//! Piper voice downloader.
//!
//! Voices live in the `rhasspy/piper-voices` HuggingFace repository under
//! `<family>/<lang_REGION>/<name>/<quality>/<voice>.onnx[.json]`, e.g.
//! `zh/zh_CN/huayan/medium/zh_CN-huayan-medium.onnx`.  Files are fetched into
//! the HuggingFace cache and then copied into the server's model directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use hf_hub::api::sync::Api;
use tracing::info;

pub const VOICES_REPO: &str = "rhasspy/piper-voices";

/// A parsed voice name such as `zh_CN-huayan-medium`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceName {
    pub lang_region: String,
    pub name: String,
    pub quality: String,
}

impl VoiceName {
    pub fn parse(voice: &str) -> Result<Self> {
        let voice = voice.trim().trim_end_matches(".onnx");
        let (lang_region, rest) = voice.split_once('-').context("missing '-' after language")?;
        let (name, quality) = rest.rsplit_once('-').context("missing quality suffix")?;

        let valid_lang = lang_region
            .split_once('_')
            .is_some_and(|(l, r)| !l.is_empty() && !r.is_empty());
        if !valid_lang || name.is_empty() || quality.is_empty() {
            bail!("Malformed voice name '{voice}', expected lang_REGION-name-quality");
        }
        Ok(Self {
            lang_region: lang_region.to_string(),
            name: name.to_string(),
            quality: quality.to_string(),
        })
    }

    pub fn family(&self) -> &str {
        self.lang_region.split('_').next().unwrap_or(&self.lang_region)
    }

    pub fn file_stem(&self) -> String {
        format!("{}-{}-{}", self.lang_region, self.name, self.quality)
    }

    /// Repository path of the model file.
    pub fn model_repo_path(&self) -> String {
        format!(
            "{}/{}/{}/{}/{}.onnx",
            self.family(),
            self.lang_region,
            self.name,
            self.quality,
            self.file_stem()
        )
    }

    pub fn config_repo_path(&self) -> String {
        format!("{}.json", self.model_repo_path())
    }
}

/// Download `voice` and place `<voice>.onnx` + `<voice>.onnx.json` in
/// `model_dir`.  Returns the model path.
pub fn download_voice(voice: &str, model_dir: &Path) -> Result<PathBuf> {
    let voice = VoiceName::parse(voice)?;
    let api = Api::new().context("Failed to initialise HuggingFace Hub client")?;
    let repo = api.model(VOICES_REPO.to_string());

    std::fs::create_dir_all(model_dir)
        .with_context(|| format!("Cannot create model directory: {}", model_dir.display()))?;

    let mut model_path = PathBuf::new();
    for remote in [voice.model_repo_path(), voice.config_repo_path()] {
        info!(file = %remote, repo = VOICES_REPO, "downloading");
        let cached = repo
            .get(&remote)
            .with_context(|| format!("Failed to download '{}' from '{}'", remote, VOICES_REPO))?;
        let file_name = remote.rsplit('/').next().unwrap_or(&remote);
        let target = model_dir.join(file_name);
        std::fs::copy(&cached, &target)
            .with_context(|| format!("Cannot copy {} to {}", cached.display(), target.display()))?;
        if remote.ends_with(".onnx") {
            model_path = target;
        }
    }

    info!(model = %model_path.display(), "voice installed");
    Ok(model_path)
}
