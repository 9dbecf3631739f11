pub mod layout;
pub mod metrics;
pub mod report;

pub use layout::{TableLimits, TableOptions};
pub use report::PdfReport;
