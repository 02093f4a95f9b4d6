//! Phoneme → model-id mapping for Piper voices, plus the sentence splitter
//! used to feed the synthesizer one sentence at a time.
//!
//! Unlike a fixed vocabulary, every Piper voice ships its own
//! `phoneme_id_map` (in `<voice>.onnx.json`).  A phoneme may map to several
//! ids.  The sequence handed to the model is framed as:
//!
//! ```text
//! ^ _ p1 _ p2 _ … pn _ $
//! ```
//!
//! where `^`/`$` are the begin/end markers and `_` is the pad symbol
//! interspersed after every phoneme.  Phonemes missing from the map are
//! silently skipped.

use std::collections::HashMap;

pub const BOS: &str = "^";
pub const EOS: &str = "$";
pub const PAD: &str = "_";

/// A voice's phoneme → id table.
pub type PhonemeIdMap = HashMap<String, Vec<i64>>;

/// Sentence terminators, Latin and CJK.
const TERMINATORS: &[char] = &['.', '!', '?', '。', '！', '？', '；', '\n'];

/// Convert a phoneme string to the framed id sequence.
///
/// Each Unicode scalar value is one phoneme (Piper's convention).
pub fn phonemes_to_ids(phonemes: &str, id_map: &PhonemeIdMap) -> Vec<i64> {
    let mut ids = Vec::with_capacity(phonemes.chars().count() * 2 + 3);
    let pad = id_map.get(PAD);

    if let Some(bos) = id_map.get(BOS) {
        ids.extend_from_slice(bos);
    }
    if let Some(pad) = pad {
        ids.extend_from_slice(pad);
    }

    let mut buf = [0u8; 4];
    for ch in phonemes.chars() {
        let Some(phoneme_ids) = id_map.get(ch.encode_utf8(&mut buf) as &str) else {
            continue;
        };
        ids.extend_from_slice(phoneme_ids);
        if let Some(pad) = pad {
            ids.extend_from_slice(pad);
        }
    }

    if let Some(eos) = id_map.get(EOS) {
        ids.extend_from_slice(eos);
    }
    ids
}

/// Split `text` into sentences, keeping each terminator with its sentence.
///
/// Sentences made only of whitespace and terminators are dropped; a trailing
/// fragment without a terminator is kept as its own sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        if ch != '\n' {
            current.push(ch);
        }
        if TERMINATORS.contains(&ch) {
            push_sentence(&mut sentences, &current);
            current.clear();
        }
    }
    push_sentence(&mut sentences, &current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, raw: &str) {
    let sentence = raw.trim();
    if sentence.chars().any(|c| !c.is_whitespace() && !TERMINATORS.contains(&c)) {
        sentences.push(sentence.to_string());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn id_map() -> PhonemeIdMap {
        [("^", vec![1]), ("$", vec![2]), ("_", vec![0]), ("a", vec![14]), ("b", vec![15, 16])]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_framing() {
        assert_eq!(phonemes_to_ids("ab", &id_map()), vec![1, 0, 14, 0, 15, 16, 0, 2]);
    }

    #[test]
    fn test_empty_input_is_just_markers() {
        assert_eq!(phonemes_to_ids("", &id_map()), vec![1, 0, 2]);
    }

    #[test]
    fn test_unknown_phonemes_skipped() {
        assert_eq!(phonemes_to_ids("aɛa", &id_map()), vec![1, 0, 14, 0, 14, 0, 2]);
    }

    #[test]
    fn test_map_without_pad() {
        let mut map = id_map();
        map.remove(PAD);
        assert_eq!(phonemes_to_ids("aa", &map), vec![1, 14, 14, 2]);
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("Hello world. How are you?  Fine");
        assert_eq!(s, vec!["Hello world.", "How are you?", "Fine"]);
    }

    #[test]
    fn test_split_cjk() {
        let s = split_sentences("你好。今天天气很好！\n再见");
        assert_eq!(s, vec!["你好。", "今天天气很好！", "再见"]);
    }

    #[test]
    fn test_split_blank() {
        assert!(split_sentences(" .. \n ").is_empty());
    }
}
