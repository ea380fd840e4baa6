pub mod discovery;
pub mod orchestrator;
pub mod report;

pub use discovery::{InputItem, InputScanner, ItemKind};
pub use orchestrator::{BatchProgress, BatchRunner, PlannedItem, ProgressCallback};
pub use report::{ItemStatus, ProcessingReport, ReportEntry, ReportSummary};
