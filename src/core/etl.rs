use crate::core::Pipeline;
use crate::utils::error::Result;

/// Runs a pipeline once: extract, transform, load.
pub struct BatchEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> BatchEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting batch");

        let rows = self.pipeline.extract().await?;
        tracing::info!("Extracted {} rows", rows.len());

        let rows = self.pipeline.transform(rows).await?;
        let failed = rows.iter().filter(|row| row.is_failed()).count();
        tracing::info!("Scored {} rows ({} failed)", rows.len(), failed);

        let output_path = self.pipeline.load(rows).await?;
        tracing::info!("Output saved to: {}", output_path);

        Ok(output_path)
    }
}
