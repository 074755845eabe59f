pub mod progress;

pub use progress::{record, ProgressUpdate, RecordOutcome};
