pub mod cli;
pub mod toml_config;

use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_file_arg, validate_not_blank, Validate};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "seo-batch")]
#[command(about = "Fetch page content, score it against SEO guides and average SERP competitors")]
pub struct CliConfig {
    #[arg(short = 'f', long = "file", help = "CSV file with KEYWORD and URL columns")]
    pub file: PathBuf,

    #[arg(short, long, default_value = "en", help = "Language of the guides")]
    pub lang: String,

    #[arg(short, long, help = "Report path (default: <input>_final_scores.csv)")]
    pub output: Option<PathBuf>,

    #[arg(short, long, help = "TOML settings file")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value = "seo_batch.log")]
    pub log_file: PathBuf,

    #[arg(long, help = "Write the log file as JSON lines")]
    pub json_log: bool,

    #[arg(long, help = "Do not write the processed_<input> content snapshot")]
    pub no_snapshot: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            lang: "en".to_string(),
            output: None,
            config: None,
            log_file: PathBuf::from("seo_batch.log"),
            json_log: false,
            no_snapshot: false,
            verbose: false,
        }
    }
}

impl ConfigProvider for CliConfig {
    fn input_path(&self) -> &Path {
        &self.file
    }

    fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.file))
    }

    fn snapshot_path(&self) -> Option<PathBuf> {
        (!self.no_snapshot).then(|| snapshot_path(&self.file))
    }

    fn lang(&self) -> &str {
        &self.lang
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_file_arg("file", &self.file)?;
        validate_not_blank("lang", &self.lang)?;
        if let Some(output) = &self.output {
            validate_file_arg("output", output)?;
        }
        validate_file_arg("log_file", &self.log_file)?;
        Ok(())
    }
}

/// `data/keywords.csv` -> `data/keywords_final_scores.csv`
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}_final_scores.csv", stem))
}

/// `data/keywords.csv` -> `data/processed_keywords.csv`
pub fn snapshot_path(input: &Path) -> PathBuf {
    let name = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("processed_{}", name))
}
