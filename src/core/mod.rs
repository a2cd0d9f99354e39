pub mod etl;
pub mod extractor;
pub mod guide;
pub mod pipeline;
pub mod retry;
pub mod score;
pub mod serp;

pub use crate::domain::model::{OutputRow, RowRecord};
pub use crate::domain::ports::{ConfigProvider, Pipeline, Sleeper, Storage};
pub use crate::utils::error::Result;
