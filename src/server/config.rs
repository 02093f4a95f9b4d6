//! Server configuration.

use std::{path::PathBuf, sync::Arc};

use super::profile::Profile;
use crate::engine::{
    melo::MeloLoader,
    piper::{PiperLoader, PiperSettings},
    EngineLoader,
};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_MODEL_DIR: &str = "tts-services/models";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub profile: Profile,
    pub host: String,
    pub port: u16,
    /// Used by the Piper profiles.
    pub piper: PiperSettings,
    /// Used by the MeloTTS profiles.
    pub melo: MeloLoader,
}

impl ServerConfig {
    /// Defaults for `profile`: all interfaces, the profile's port, and
    /// models under `tts-services/models`.
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            host: DEFAULT_HOST.to_string(),
            port: profile.default_port(),
            piper: PiperSettings::new(PathBuf::from(DEFAULT_MODEL_DIR)),
            melo: MeloLoader::default(),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The engine loader matching the profile.
    pub fn loader(&self) -> Arc<dyn EngineLoader> {
        if self.profile.is_piper() {
            Arc::new(PiperLoader::new(self.piper.clone()))
        } else {
            Arc::new(self.melo.clone())
        }
    }
}
