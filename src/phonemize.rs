//! Phonemisation through the `libespeak-ng` C library (`onnx` feature).
//!
//! Piper voices are trained on espeak-ng IPA output; each voice names the
//! espeak voice it expects in its config (`en-us`, `cmn`, `de`, …).  The
//! library is driven directly rather than through a subprocess so one
//! initialisation serves every request.
//!
//! espeak-ng keeps global state and is not thread-safe: every call goes
//! through [`LOCK`], and the active voice is switched only when a request
//! asks for a different one.

use std::{
    ffi::{CStr, CString},
    os::raw::{c_char, c_int, c_void},
    sync::Mutex,
};

use anyhow::{anyhow, bail, Result};
use once_cell::sync::OnceCell;

// Linking is handled by build.rs.
extern "C" {
    fn espeak_ng_InitializePath(path: *const c_char);
    fn espeak_ng_Initialize(context: *mut c_void) -> c_int;
    fn espeak_ng_SetVoiceByName(name: *const c_char) -> c_int;

    /// Advances `textptr` clause by clause; sets it to NULL at the end.
    /// The returned buffer is overwritten by the next call.
    fn espeak_TextToPhonemes(
        textptr: *mut *const c_void,
        textmode: c_int,
        phonememode: c_int,
    ) -> *const c_char;
}

const CHARS_UTF8: c_int = 1;
const PHONEMES_IPA: c_int = 0x02;

/// Guards every library call; holds the currently selected voice.
static LOCK: Mutex<Option<String>> = Mutex::new(None);

static INIT: OnceCell<std::result::Result<(), String>> = OnceCell::new();

fn do_init() -> std::result::Result<(), String> {
    // A null path lets espeak-ng honour `ESPEAK_DATA_PATH` or its built-in default.
    let status = unsafe {
        espeak_ng_InitializePath(std::ptr::null());
        espeak_ng_Initialize(std::ptr::null_mut())
    };
    if status != 0 {
        return Err(format!("espeak_ng_Initialize failed (status {:#010x})", status));
    }
    Ok(())
}

/// Convert `text` to IPA using the espeak-ng voice `voice`.
///
/// Clauses are joined with single spaces, matching
/// `espeak-ng --ipa -q -v <voice>`.
pub fn phonemize(text: &str, voice: &str) -> Result<String> {
    let mut active = LOCK.lock().unwrap_or_else(|p| p.into_inner());

    INIT.get_or_init(do_init)
        .as_ref()
        .map_err(|e| anyhow!("espeak-ng: {}", e))?;

    if active.as_deref() != Some(voice) {
        let voice_c =
            CString::new(voice).map_err(|_| anyhow!("voice name contains a null byte"))?;
        let rc = unsafe { espeak_ng_SetVoiceByName(voice_c.as_ptr()) };
        if rc != 0 {
            bail!("espeak_ng_SetVoiceByName({voice:?}) failed (rc {rc})");
        }
        *active = Some(voice.to_string());
    }

    let text_c = CString::new(text).map_err(|_| anyhow!("text contains a null byte"))?;
    let mut current: *const c_void = text_c.as_ptr() as *const c_void;
    let mut parts: Vec<String> = Vec::new();

    unsafe {
        while !current.is_null() {
            let phonemes_ptr = espeak_TextToPhonemes(&mut current, CHARS_UTF8, PHONEMES_IPA);
            if phonemes_ptr.is_null() {
                continue;
            }
            let chunk = CStr::from_ptr(phonemes_ptr)
                .to_str()
                .map_err(|_| anyhow!("espeak-ng returned non-UTF-8 phonemes"))?
                .trim()
                .to_owned();
            if !chunk.is_empty() {
                parts.push(chunk);
            }
        }
    }

    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phonemize_english() {
        let ipa = phonemize("Hello world", "en-us").expect("phonemize failed");
        assert!(!ipa.is_empty());
    }

    #[test]
    fn test_voice_switch() {
        let en = phonemize("one", "en-us").unwrap();
        let de = phonemize("eins", "de").unwrap();
        assert!(!en.is_empty() && !de.is_empty());
        assert!(phonemize("x", "no-such-voice").is_err());
    }

    #[test]
    fn test_phonemize_empty() {
        let ipa = phonemize("", "en-us").unwrap();
        assert!(ipa.trim().is_empty());
    }
}
