//! Documentation mover: files loose in a project root go into `docs/…`.
//!
//! The mapping is `file name → target directory` (relative to the root).
//! Sources that are missing and targets that already exist are skipped;
//! nothing is ever overwritten.  A failed move is recorded and the rest of
//! the mapping still runs.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

/// Built-in mapping for the project's historical top-level notes.
const DEFAULT_MAPPING: &[(&str, &str)] = &[
    ("DEVELOPMENT_DESIGN_PLAN.md", "docs/development/"),
    ("IDEAS_AND_DISCUSSIONS.md", "docs/development/"),
    ("MULTI_CHANNEL_IMPLEMENTATION.md", "docs/features/"),
    ("MULTI_CHANNEL_USAGE.md", "docs/features/"),
    ("MULTI_CHANNEL_VOICE.md", "docs/features/"),
    ("MULTI_PLAYER_CONCURRENT_SPEECH.md", "docs/features/"),
    ("CHAT_BUBBLE_SYNC_IMPLEMENTATION.md", "docs/features/"),
    ("CHAT_PERFORMANCE_OPTIMIZATION.md", "docs/features/"),
    ("CHAT_QUEUE_OPTIMIZATION.md", "docs/features/"),
    ("CHAT_SYSTEM_REFACTOR_PLAN.md", "docs/features/"),
    ("DIALECT_MAPPING_TRAINING.md", "docs/features/"),
    ("NANCHANG_DIALECT_IMPLEMENTATION.md", "docs/features/"),
    ("LLM_REQUEST_QUEUE_OPTIMIZATION.md", "docs/features/"),
    ("LLM_TRAINING_PLAN.md", "docs/features/"),
    ("TRAINING_DATA_GUIDE.md", "docs/features/"),
    ("COMPLETE_SYSTEM_ARCHITECTURE.md", "docs/architecture/"),
    ("SYSTEM_ANNOUNCEMENT_REFACTOR.md", "docs/architecture/"),
    ("FIX_403_ERROR.md", "docs/fixes/"),
    ("FIX_AUDIO_ISSUES.md", "docs/fixes/"),
    ("FIX_VOICE_QUICK.md", "docs/fixes/"),
    ("FIXES_SUMMARY.md", "docs/fixes/"),
    ("SUMMARY_FIXES.md", "docs/fixes/"),
    ("QUICK_FIX_AUDIO.md", "docs/fixes/"),
    ("SIMPLE_VOICE_FIX.md", "docs/fixes/"),
    ("VOICE_INSTALL_FIX.md", "docs/fixes/"),
    ("ELECTRON_AUDIO_FIX.md", "docs/fixes/"),
    ("ELECTRON_RESOURCE_FIX.md", "docs/fixes/"),
    ("ELECTRON_UBUNTU_ENCODING_FIX.md", "docs/fixes/"),
    ("GIT_SETUP.md", "docs/setup/"),
    ("GITHUB_AUTH.md", "docs/setup/"),
    ("INSTALL_ELECTRON.md", "docs/setup/"),
    ("ELECTRON_SETUP.md", "docs/setup/"),
    ("WINDOWS_MIGRATION.md", "docs/setup/"),
    ("FIX-WSL-NODE.md", "docs/setup/"),
    ("fix-wsl-network.md", "docs/setup/"),
    ("check-server.md", "docs/setup/"),
    ("CHROME_DEBUG.md", "docs/setup/"),
    ("PASTE_TOKEN_GUIDE.md", "docs/setup/"),
    ("TEST_STRATEGY.md", "docs/testing/"),
    ("TEST_SUMMARY.md", "docs/testing/"),
    ("TEST_SUMMARY_MCTS.md", "docs/testing/"),
    ("MCTS_TRAINING_PLAN.md", "docs/testing/"),
    ("MCTS_TUNING.md", "docs/testing/"),
    ("MCTS_TUNING_TIME.md", "docs/testing/"),
    ("DEALING_IMPROVEMENT_PLAN.md", "docs/testing/"),
    ("GAME_LOGIC_REVIEW.md", "docs/testing/"),
    ("I18N_PLAN.md", "docs/testing/"),
    ("REFACTOR_PLAN.md", "docs/testing/"),
    ("REFACTOR_STATUS.md", "docs/testing/"),
    ("REFACTOR_TEST_REPORT.md", "docs/testing/"),
];

/// `file name → target directory`, iterated in the order entries were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocMapping(Vec<(String, String)>);

impl DocMapping {
    pub fn builtin() -> Self {
        Self(
            DEFAULT_MAPPING
                .iter()
                .map(|(file, dir)| (file.to_string(), dir.to_string()))
                .collect(),
        )
    }

    /// Load a mapping from a JSON object `{"FILE.md": "docs/dir/", …}`,
    /// keeping the file's key order.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read mapping: {}", path.display()))?;
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse mapping: {}", path.display()))?;

        let mut mapping = Self::default();
        for (file, dir) in map {
            let Some(dir) = dir.as_str() else {
                bail!("Target for '{}' must be a string in {}", file, path.display());
            };
            mapping.insert(file, dir);
        }
        Ok(mapping)
    }

    /// Add an entry; an existing file keeps its position and gets the new dir.
    pub fn insert(&mut self, file: impl Into<String>, dir: impl Into<String>) {
        let (file, dir) = (file.into(), dir.into());
        match self.0.iter_mut().find(|(f, _)| *f == file) {
            Some(entry) => entry.1 = dir,
            None => self.0.push((file, dir)),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, d)| (f.as_str(), d.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizeReport {
    pub moved: Vec<PathBuf>,
    pub skipped: Vec<String>,
    /// `(file, error)` for moves that failed.
    pub failed: Vec<(String, String)>,
}

fn move_one(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    if std::fs::rename(source, target).is_ok() {
        return Ok(());
    }
    // rename fails across filesystems; copy then remove.
    std::fs::copy(source, target)
        .with_context(|| format!("Cannot copy {} to {}", source.display(), target.display()))?;
    std::fs::remove_file(source).with_context(|| format!("Cannot remove {}", source.display()))
}

/// Move every mapped file found directly under `root`.
pub fn organize(root: &Path, mapping: &DocMapping) -> OrganizeReport {
    let mut report = OrganizeReport::default();

    for (file, dir) in mapping.iter() {
        let source = root.join(file);
        let target = root.join(dir).join(file);

        if !source.is_file() {
            warn!(file, "source missing, skipped");
            report.skipped.push(file.to_string());
            continue;
        }
        if target.exists() {
            warn!(file, target = %target.display(), "target exists, skipped");
            report.skipped.push(file.to_string());
            continue;
        }

        match move_one(&source, &target) {
            Ok(()) => {
                info!(file, dir, "moved");
                report.moved.push(target);
            }
            Err(e) => {
                warn!(file, error = %format!("{e:#}"), "move failed");
                report.failed.push((file.to_string(), format!("{e:#}")));
            }
        }
    }

    info!(
        moved = report.moved.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "documentation organised"
    );
    report
}
