use crate::domain::model::RowRecord;
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &Path) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &Path,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    fn exists(&self, path: &Path) -> impl std::future::Future<Output = bool> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn input_path(&self) -> &Path;
    fn output_path(&self) -> std::path::PathBuf;
    fn snapshot_path(&self) -> Option<std::path::PathBuf>;
    fn lang(&self) -> &str;
}

/// Blocks the current row between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Vec<RowRecord>>;
    async fn transform(&self, rows: Vec<RowRecord>) -> Result<Vec<RowRecord>>;
    async fn load(&self, rows: Vec<RowRecord>) -> Result<String>;
}
