// Fire incident and weather ingestion for a single region.
//
// Reads incident, weather and population files of unknown encoding,
// restricts them to one region, and produces monthly and daily summaries
// plus their time-aligned joins.
pub mod aggregate;
pub mod config;
pub mod error;
pub mod join;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod reader;
pub mod reports;
pub mod types;
pub mod util;

pub use error::{PipelineError, Result};
pub use pipeline::{PipelineCache, PipelineConfig, PipelineOutput};
