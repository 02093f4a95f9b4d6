//! In-process Piper runner (`onnx` feature).
//!
//! Uses [`ort`] (ONNX Runtime Rust bindings).  Piper's VITS graph takes its
//! inputs positionally:
//!
//! | Name            | Shape          | dtype   |
//! |-----------------|----------------|---------|
//! | `input`         | `[1, seq_len]` | int64   |
//! | `input_lengths` | `[1]`          | int64   |
//! | `scales`        | `[3]`          | float32 |
//! | `sid`           | `[1]`          | int64 (multi-speaker voices only) |
//!
//! `scales` is `[noise_scale, length_scale, noise_w]`.  The output is the
//! float waveform, which is peak-normalised to 16-bit PCM.

use std::{path::Path, sync::Mutex};

use anyhow::{anyhow, Context, Result};
use ort::{session::Session, value::Tensor};
use tracing::debug;

use super::{piper::VoiceConfig, SpeechEngine, Synthesis, SynthesisOptions};
use crate::{
    phonemes::{phonemes_to_ids, split_sentences},
    phonemize::phonemize,
    wav::float_to_pcm16,
};

pub struct PiperOnnx {
    session: Mutex<Session>,
    config: VoiceConfig,
    label: String,
}

impl PiperOnnx {
    pub fn load(model_path: &Path, config: VoiceConfig) -> Result<Self> {
        let session = Session::builder()
            .context("Failed to create ORT session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Cannot load ONNX model: {}", model_path.display()))?;

        let label = format!(
            "piper-onnx:{}",
            model_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        );
        Ok(Self { session: Mutex::new(session), config, label })
    }

    fn sentence_phonemes(&self, sentence: &str) -> Result<String> {
        if self.config.phoneme_type == "text" {
            return Ok(sentence.to_string());
        }
        phonemize(sentence, &self.config.espeak.voice)
            .with_context(|| format!("Phonemisation failed for {:?}", sentence))
    }

    fn infer(&self, ids: Vec<i64>, length_scale: f32, speaker_id: Option<i64>) -> Result<Vec<f32>> {
        let seq_len = ids.len();
        let inference = &self.config.inference;

        let t_input = Tensor::<i64>::from_array(([1usize, seq_len], ids))
            .context("Failed to build input tensor")?;
        let t_lengths = Tensor::<i64>::from_array(([1usize], vec![seq_len as i64]))
            .context("Failed to build input_lengths tensor")?;
        let t_scales = Tensor::<f32>::from_array((
            [3usize],
            vec![inference.noise_scale, length_scale, inference.noise_w],
        ))
        .context("Failed to build scales tensor")?;

        let mut session = self.session.lock().map_err(|_| anyhow!("ORT session mutex poisoned"))?;
        let outputs = match speaker_id {
            Some(sid) => {
                let t_sid = Tensor::<i64>::from_array(([1usize], vec![sid]))
                    .context("Failed to build sid tensor")?;
                session.run(ort::inputs![t_input, t_lengths, t_scales, t_sid])
            }
            None => session.run(ort::inputs![t_input, t_lengths, t_scales]),
        }
        .context("ONNX inference failed")?;

        let (_shape, audio) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract audio tensor")?;
        Ok(audio.to_vec())
    }
}

impl SpeechEngine for PiperOnnx {
    fn name(&self) -> &str {
        &self.label
    }

    fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<Synthesis> {
        let speaker_id = self.config.resolve_speaker(options.speaker.as_deref())?;
        let length_scale = self.config.length_scale(options.speed);

        let mut audio = Vec::new();
        for sentence in split_sentences(text) {
            let phonemes = self.sentence_phonemes(&sentence)?;
            let ids = phonemes_to_ids(&phonemes, &self.config.phoneme_id_map);
            debug!(sentence = %sentence, ids = ids.len(), "piper sentence");
            audio.extend(self.infer(ids, length_scale, speaker_id)?);
        }

        Ok(Synthesis {
            pcm: float_to_pcm16(&audio, true),
            format: self.config.format(),
            speaker: options.speaker.clone(),
        })
    }

    fn speakers(&self) -> Vec<String> {
        self.config.speaker_names()
    }
}
