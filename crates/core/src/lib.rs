pub mod config;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod parse;
pub mod soap;
pub mod storage;
pub mod window;

pub use config::Config;
pub use error::{IngestionError, Result};
pub use orchestrator::IngestionJob;
