//! Voice selection keys: MeloTTS languages and Piper voice genders.

use std::fmt;

use serde::Serialize;

/// Languages shipped as MeloTTS checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Language {
    ZH,
    EN,
    JP,
    ES,
    FR,
    KR,
}

/// Every accepted spelling → language.  Codes are case-sensitive: only the
/// upper-case code and the listed lower-case aliases match.
const ALIASES: &[(&str, Language)] = &[
    ("ZH", Language::ZH),
    ("EN", Language::EN),
    ("JP", Language::JP),
    ("ES", Language::ES),
    ("FR", Language::FR),
    ("KR", Language::KR),
    ("zh", Language::ZH),
    ("en", Language::EN),
    ("jp", Language::JP),
    ("ja", Language::JP),
    ("es", Language::ES),
    ("fr", Language::FR),
    ("kr", Language::KR),
    ("ko", Language::KR),
];

const EN_SPEAKERS: &[&str] = &["EN-US", "EN-BR", "EN_INDIA", "EN-AU", "EN-Default"];

impl Language {
    pub const ALL: [Language; 6] = [
        Language::ZH,
        Language::EN,
        Language::JP,
        Language::ES,
        Language::FR,
        Language::KR,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::ZH => "ZH",
            Language::EN => "EN",
            Language::JP => "JP",
            Language::ES => "ES",
            Language::FR => "FR",
            Language::KR => "KR",
        }
    }

    /// Name of the language in the language itself.
    pub fn native_name(self) -> &'static str {
        match self {
            Language::ZH => "中文",
            Language::EN => "English",
            Language::JP => "日本語",
            Language::ES => "Español",
            Language::FR => "Français",
            Language::KR => "한국어",
        }
    }

    /// Lower-case aliases accepted by [`Language::lookup`].
    pub fn aliases(self) -> Vec<&'static str> {
        ALIASES
            .iter()
            .filter(|(alias, lang)| *lang == self && *alias != self.code())
            .map(|(alias, _)| *alias)
            .collect()
    }

    pub fn lookup(code: &str) -> Option<Language> {
        ALIASES.iter().find(|(alias, _)| *alias == code).map(|(_, lang)| *lang)
    }

    /// [`Language::lookup`], falling back to Chinese for unknown codes.
    pub fn from_code_or_default(code: &str) -> Language {
        Self::lookup(code).unwrap_or(Language::ZH)
    }

    /// Speaker names in the language's MeloTTS checkpoint, in id order.
    pub fn speakers(self) -> Vec<&'static str> {
        match self {
            Language::EN => EN_SPEAKERS.to_vec(),
            other => vec![other.code()],
        }
    }

    /// The speaker named after the language, or the checkpoint's first speaker.
    pub fn default_speaker(self) -> &'static str {
        let speakers = self.speakers();
        speakers
            .iter()
            .find(|s| **s == self.code())
            .or_else(|| speakers.first())
            .copied()
            .unwrap_or(self.code())
    }

    /// Numeric MeloTTS speaker id for `name`, if the checkpoint has it.
    pub fn speaker_id(self, name: &str) -> Option<usize> {
        self.speakers().iter().position(|s| *s == name)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Voice gender for two-voice Piper deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Male, Gender::Female];

    pub fn parse(value: &str) -> Option<Gender> {
        match value.trim().to_ascii_lowercase().as_str() {
            "male" | "m" | "男" => Some(Gender::Male),
            "female" | "f" | "女" => Some(Gender::Female),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
