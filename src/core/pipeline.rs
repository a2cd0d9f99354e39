use crate::config::toml_config::Settings;
use crate::core::extractor::ContentExtractor;
use crate::core::guide::GuideResolver;
use crate::core::score::ScoreFetcher;
use crate::core::serp::SerpAverager;
use crate::core::{ConfigProvider, Pipeline, Sleeper, Storage};
use crate::domain::model::{ContentRow, InputRow, OutputRow, RowRecord, RowState, Stage};
use crate::utils::error::{BatchError, Result};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

/// Drives every row through content, guide, score and SERP stages, one row at a time.
pub struct ScoringPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    settings: Settings,
    extractor: ContentExtractor,
    guides: GuideResolver,
    scores: ScoreFetcher,
    serp: SerpAverager,
    sleeper: Arc<dyn Sleeper>,
}

impl<S: Storage, C: ConfigProvider> ScoringPipeline<S, C> {
    pub fn new(storage: S, config: C, settings: Settings, sleeper: Arc<dyn Sleeper>) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.api.request_timeout)
            .build()?;

        let extractor = ContentExtractor::new(settings.content.clone(), sleeper.clone())?;
        let guides = GuideResolver::new(
            client.clone(),
            settings.api.clone(),
            settings.retry.clone(),
            sleeper.clone(),
        );
        let scores = ScoreFetcher::new(
            client.clone(),
            settings.api.clone(),
            settings.retry.clone(),
            sleeper.clone(),
        );
        let serp = SerpAverager::new(
            client,
            settings.api.clone(),
            settings.retry.clone(),
            sleeper.clone(),
        );

        Ok(Self {
            storage,
            config,
            settings,
            extractor,
            guides,
            scores,
            serp,
            sleeper,
        })
    }

    async fn read_input(&self) -> Result<Vec<InputRow>> {
        let path = self.config.input_path();
        tracing::info!("Reading the CSV file {}", path.display());

        let data = match self.storage.read_file(path).await {
            Ok(data) => data,
            Err(BatchError::IoError(source)) => {
                return Err(BatchError::InputError {
                    path: path.display().to_string(),
                    source,
                })
            }
            Err(other) => return Err(other),
        };

        let rows = parse_input(&data).map_err(|e| BatchError::MalformedInput {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        tracing::info!("CSV file successfully loaded ({} rows)", rows.len());
        Ok(rows)
    }

    async fn write_verified(&self, path: &Path, data: &[u8]) -> Result<()> {
        let output_error = |message: String| BatchError::OutputError {
            path: path.display().to_string(),
            message,
        };

        self.storage
            .write_file(path, data)
            .await
            .map_err(|e| output_error(e.to_string()))?;

        if !self.storage.exists(path).await {
            return Err(output_error("file missing after write".to_string()));
        }

        tracing::info!(bytes = data.len(), "saved {}", path.display());
        Ok(())
    }

    async fn resolve_guides(&self, rows: &mut [RowRecord]) {
        let lang = self.config.lang();
        for row in rows.iter_mut() {
            let resolved = self.guides.resolve(&row.input.keyword, lang).await;
            match resolved {
                Ok(guide) => row.guide_resolved(guide),
                Err(error) => {
                    tracing::error!(
                        line = row.line,
                        keyword = %row.input.keyword,
                        "Failed to get guide ID: {}",
                        error
                    );
                    row.fail(Stage::Guide, error);
                }
            }
        }
    }

    async fn score_and_average(&self, row: &mut RowRecord) {
        let Some(guide) = row.guide.clone() else {
            return;
        };
        let keyword = row.input.keyword.clone();

        let scored = self.scores.fetch(&guide, &row.content, &keyword).await;
        match scored {
            Ok(scores) => row.scored(scores),
            Err(error) => {
                row.fail(Stage::Score, error);
                return;
            }
        }

        let averaged = self.serp.fetch_averages(&guide, &keyword).await;
        match averaged {
            Ok(averages) => row.averaged(averages),
            Err(error) => row.fail(Stage::Serp, error),
        }
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for ScoringPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<RowRecord>> {
        let inputs = self.read_input().await?;
        let mut rows = Vec::with_capacity(inputs.len());

        for (index, input) in inputs.into_iter().enumerate() {
            let line = index + 1;
            let supplied = input.content.clone().filter(|c| !c.trim().is_empty());
            let mut row = RowRecord::new(line, input);

            let content = match supplied {
                Some(content) => content,
                None => self.extractor.fetch_text(&row.input.url).await,
            };
            row.content_fetched(content);
            tracing::info!("Line {}: {} - Content added", line, row.input.url);
            rows.push(row);
        }

        if let Some(snapshot) = self.config.snapshot_path() {
            let data = write_csv(rows.iter().map(ContentRow::from))?;
            self.write_verified(&snapshot, &data).await?;
        }

        Ok(rows)
    }

    async fn transform(&self, mut rows: Vec<RowRecord>) -> Result<Vec<RowRecord>> {
        self.resolve_guides(&mut rows).await;

        let resolved = rows
            .iter()
            .filter(|row| row.state == RowState::GuideResolved)
            .count();
        if resolved > 0 && !self.settings.propagation_wait.is_zero() {
            tracing::info!(
                guides = resolved,
                wait_secs = self.settings.propagation_wait.as_secs_f64(),
                "waiting for guides to become available"
            );
            self.sleeper.sleep(self.settings.propagation_wait).await;
        }

        for row in rows.iter_mut() {
            self.score_and_average(row).await;
        }

        Ok(rows)
    }

    async fn load(&self, mut rows: Vec<RowRecord>) -> Result<String> {
        let output_path = self.config.output_path();
        let data = write_csv(rows.iter().map(OutputRow::from))?;
        self.write_verified(&output_path, &data).await?;

        for row in rows.iter_mut() {
            row.written();
        }
        let failed = rows.iter().filter(|row| row.is_failed()).count();
        tracing::info!(
            rows = rows.len(),
            failed,
            "data saved to {}",
            output_path.display()
        );

        Ok(output_path.display().to_string())
    }
}

/// Parses the input table. `KEYWORD` and `URL` are required, `CONTENT` is optional.
pub fn parse_input(data: &[u8]) -> std::result::Result<Vec<InputRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(data);
    reader.deserialize().collect()
}

fn write_csv<T: serde::Serialize>(rows: impl Iterator<Item = T>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| BatchError::IoError(e.into_error()))
}
