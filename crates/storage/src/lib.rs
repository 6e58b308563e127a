pub mod conformance;
mod error;
mod jsonl;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use jsonl::JsonlHistoryStore;
pub use memory::InMemoryHistoryStore;
pub use record::{HistoryRecord, Mode, ReportSummary, Status};
pub use traits::HistoryStore;
