//! `ttsgate` command-line entry point.
//!
//! ```text
//! ttsgate serve --profile piper-dual --model-dir tts-services/models
//! ttsgate serve --profile melo-multilang --port 7860
//! ttsgate download zh_CN-huayan-medium
//! ttsgate organize-docs --root .
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ttsgate::{
    language::Gender,
    organize::{organize, DocMapping},
    server::{self, Profile, ServerConfig},
};

#[derive(Parser, Debug)]
#[command(name = "ttsgate", version, about = "HTTP gateway for MeloTTS and Piper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a TTS HTTP server
    Serve(ServeArgs),

    /// Download a Piper voice from HuggingFace into the model directory
    #[cfg(not(any(target_os = "ios", target_os = "android")))]
    Download {
        /// Voice name, e.g. zh_CN-huayan-medium
        voice: String,

        #[arg(long, env = "TTSGATE_MODEL_DIR", default_value = server::config::DEFAULT_MODEL_DIR)]
        model_dir: PathBuf,
    },

    /// Move loose documentation files into docs/ subdirectories
    OrganizeDocs {
        /// Project root holding the files
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// JSON object {"FILE.md": "docs/dir/"} replacing the built-in table
        #[arg(long)]
        mapping: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, value_enum, env = "TTSGATE_PROFILE", default_value = "piper")]
    profile: Profile,

    #[arg(long, env = "TTSGATE_HOST", default_value = server::config::DEFAULT_HOST)]
    host: String,

    /// Defaults to 7860 for MeloTTS profiles and 5000 for Piper
    #[arg(long, env = "TTSGATE_PORT")]
    port: Option<u16>,

    /// Directory holding Piper `.onnx` voices
    #[arg(long, env = "TTSGATE_MODEL_DIR", default_value = server::config::DEFAULT_MODEL_DIR)]
    model_dir: PathBuf,

    /// Explicit model for the single-voice Piper profile
    #[arg(long, env = "TTSGATE_MODEL")]
    model: Option<PathBuf>,

    /// Male voice file for piper-dual (relative to --model-dir)
    #[arg(long, env = "TTSGATE_MALE_MODEL")]
    male_model: Option<PathBuf>,

    /// Female voice file for piper-dual (relative to --model-dir)
    #[arg(long, env = "TTSGATE_FEMALE_MODEL")]
    female_model: Option<PathBuf>,

    /// `piper` executable; looked up on PATH when absent
    #[arg(long, env = "TTSGATE_PIPER_BIN")]
    piper_bin: Option<PathBuf>,

    /// `melo` executable; looked up on PATH when absent
    #[arg(long, env = "TTSGATE_MELO_BIN")]
    melo_bin: Option<PathBuf>,

    /// MeloTTS device: auto, cpu, cuda, mps
    #[arg(long, env = "TTSGATE_MELO_DEVICE", default_value = ttsgate::engine::melo::DEFAULT_DEVICE)]
    melo_device: String,
}

impl ServeArgs {
    fn into_config(self) -> ServerConfig {
        let mut config = ServerConfig::new(self.profile);
        config.host = self.host;
        if let Some(port) = self.port {
            config.port = port;
        }

        config.piper.model_dir = self.model_dir;
        config.piper.model = self.model;
        config.piper.binary = self.piper_bin;
        if let Some(male) = self.male_model {
            config.piper.gender_models.insert(Gender::Male, male);
        }
        if let Some(female) = self.female_model {
            config.piper.gender_models.insert(Gender::Female, female);
        }

        config.melo.binary = self.melo_bin;
        config.melo.device = self.melo_device;
        config
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => {
            let config = args.into_config();
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(server::serve(config))
        }

        #[cfg(not(any(target_os = "ios", target_os = "android")))]
        Commands::Download { voice, model_dir } => {
            let path = ttsgate::download::download_voice(&voice, &model_dir)?;
            println!("{}", path.display());
            Ok(())
        }

        Commands::OrganizeDocs { root, mapping } => {
            let mapping = match mapping {
                Some(path) => DocMapping::from_json_file(&path)?,
                None => DocMapping::builtin(),
            };
            info!(root = %root.display(), entries = mapping.len(), "organising documentation");
            let report = organize(&root, &mapping);

            for path in &report.moved {
                println!("moved   {}", path.display());
            }
            for file in &report.skipped {
                println!("skipped {file}");
            }
            for (file, err) in &report.failed {
                eprintln!("failed  {file}: {err}");
            }
            println!(
                "{} moved, {} skipped, {} failed",
                report.moved.len(),
                report.skipped.len(),
                report.failed.len()
            );
            Ok(())
        }
    }
}
