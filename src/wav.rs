//! PCM ⇄ WAV container helpers.
//!
//! Every engine hands back raw little-endian PCM plus an [`AudioFormat`];
//! [`pcm_to_wav`] wraps it in the canonical 44-byte RIFF header:
//!
//! | Offset | Field           | Value                               |
//! |--------|-----------------|-------------------------------------|
//! | 0      | `RIFF`          |                                     |
//! | 4      | riff size (u32) | `44 + data_len - 8`                 |
//! | 8      | `WAVE`          |                                     |
//! | 12     | `fmt `          |                                     |
//! | 16     | fmt size (u32)  | `16`                                |
//! | 20     | format (u16)    | `1` (integer PCM)                   |
//! | 22     | channels (u16)  |                                     |
//! | 24     | sample rate     |                                     |
//! | 28     | byte rate (u32) | `rate * channels * width`           |
//! | 32     | block align     | `channels * width`                  |
//! | 34     | bits per sample | `width * 8`                         |
//! | 36     | `data`          |                                     |
//! | 40     | data size (u32) | `data_len`                          |

use std::path::Path;

use anyhow::{Context, Result};
use thiserror::Error;

/// Length of the header written by [`pcm_to_wav`].
pub const HEADER_LEN: usize = 44;

const FMT_CHUNK_LEN: u32 = 16;
const FORMAT_PCM: u16 = 1;

/// Shape of a PCM payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    /// Bytes per sample (2 for 16-bit PCM).
    pub sample_width: u16,
}

impl AudioFormat {
    /// 16-bit mono at `sample_rate`.
    pub const fn mono16(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 1, sample_width: 2 }
    }

    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.sample_width)
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(self.block_align() as u32)
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_width.saturating_mul(8)
    }

    /// Duration of `pcm_len` bytes of audio in this format.
    pub fn duration_secs(&self, pcm_len: usize) -> f32 {
        match self.byte_rate() {
            0 => 0.0,
            rate => pcm_len as f32 / rate as f32,
        }
    }
}

impl Default for AudioFormat {
    /// Piper's default output: 22.05 kHz 16-bit mono.
    fn default() -> Self {
        Self::mono16(22_050)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Wrap raw PCM bytes in a 44-byte WAV header.
///
/// Pure and total: the payload is copied verbatim after the header.  Size
/// fields saturate at `u32::MAX` when the payload is too large for RIFF.
pub fn pcm_to_wav(pcm: &[u8], format: AudioFormat) -> Vec<u8> {
    let data_size = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let riff_size = data_size.saturating_add(HEADER_LEN as u32 - 8);

    let mut out = Vec::with_capacity(HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&format.channels.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&format.byte_rate().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample().to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_size.to_le_bytes());
    debug_assert_eq!(out.len(), HEADER_LEN);

    out.extend_from_slice(pcm);
    out
}

/// Convert float samples in `[-1, 1]` to 16-bit little-endian PCM.
///
/// With `normalize`, samples are first scaled so the loudest one reaches full
/// scale (the peak is floored at 0.01 so near-silence is not amplified into
/// noise).
pub fn float_to_pcm16(samples: &[f32], normalize: bool) -> Vec<u8> {
    let gain = if normalize {
        let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        1.0 / peak.max(0.01)
    } else {
        1.0
    };
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let s16 = (s * gain * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        out.extend_from_slice(&s16.to_le_bytes());
    }
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("WAV data too short: {0} bytes, need {HEADER_LEN}")]
    TooShort(usize),
    #[error("missing {0:?} tag")]
    MissingTag(&'static str),
    #[error("unsupported audio format code {0}")]
    UnsupportedFormat(u16),
}

/// Fields recovered from a canonical 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub format: AudioFormat,
    pub riff_size: u32,
    pub data_size: u32,
}

impl WavHeader {
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, WavError> {
        if bytes.len() < HEADER_LEN {
            return Err(WavError::TooShort(bytes.len()));
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        for (offset, tag) in [(0, "RIFF"), (8, "WAVE"), (12, "fmt "), (36, "data")] {
            if &bytes[offset..offset + 4] != tag.as_bytes() {
                return Err(WavError::MissingTag(tag));
            }
        }
        let code = u16_at(20);
        if code != FORMAT_PCM {
            return Err(WavError::UnsupportedFormat(code));
        }

        Ok(Self {
            format: AudioFormat {
                channels: u16_at(22),
                sample_rate: u32_at(24),
                sample_width: u16_at(34) / 8,
            },
            riff_size: u32_at(4),
            data_size: u32_at(40),
        })
    }
}

/// Read any WAV file into little-endian PCM bytes plus its format.
///
/// Integer files keep their sample width; float files are converted to 16-bit.
pub fn decode_wav_file(path: &Path) -> Result<(Vec<u8>, AudioFormat)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Cannot open WAV: {}", path.display()))?;
    let spec = reader.spec();

    match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples = reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("WAV read error")?;
            let format = AudioFormat {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                sample_width: 2,
            };
            Ok((float_to_pcm16(&samples, false), format))
        }
        hound::SampleFormat::Int => {
            let width = spec.bits_per_sample.div_ceil(8);
            let mut pcm = Vec::new();
            for sample in reader.samples::<i32>() {
                let sample = sample.context("WAV read error")?;
                let bytes = sample.to_le_bytes();
                if width == 1 {
                    // 8-bit WAV is unsigned.
                    pcm.push((sample + 128) as u8);
                } else {
                    pcm.extend_from_slice(&bytes[..width as usize]);
                }
            }
            let format = AudioFormat {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                sample_width: width,
            };
            Ok((pcm, format))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
