pub mod engine;
pub mod pool;
pub mod retry;
pub mod sink;
pub mod source;
pub mod tracker;

pub use crate::domain::model::{IdRange, Record, RunSummary};
pub use crate::domain::ports::{RecordProcessor, Storage, Translator};
pub use crate::utils::error::Result;
