pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, toml_config::Settings, CliConfig};
pub use core::{etl::BatchEngine, pipeline::ScoringPipeline, retry::TokioSleeper};
pub use utils::error::{BatchError, Result, StageError};
