pub mod chart;
pub mod engine;
pub mod figure;
pub mod metric;
pub mod report;
pub mod results;

pub use engine::Engine;
pub use report::{generate_report, ReportConfig};
