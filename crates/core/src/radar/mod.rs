//! Radar pipeline: enumerate a category, fetch one valuation per ticker, classify every cell
//! against its reference and present the growing table.

pub mod classify;
pub mod profile;
pub mod scanner;
pub mod session;
pub mod table;

pub use classify::{classify, Signal};
pub use profile::{ColumnKind, ColumnSpec, RadarProfile, Reference, ScanMode, ValueFormat};
pub use scanner::{start_scan, ScanEvent, ScanHandle, ScanOptions, ScanProgress, ScanTarget};
pub use session::{Phase, RadarSession};
pub use table::{SortDirection, TableStatus, TableView, ViewState};
