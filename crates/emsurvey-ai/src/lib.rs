pub mod fallback;
pub mod generator;
pub mod models;
pub mod parse;
pub mod prompt;
pub mod providers;
pub mod render;

pub use fallback::{fallback_report, generate_with_fallback};
pub use generator::{ReportGenerator, ReportInput};
pub use providers::zhipu::ZhipuProvider;
pub use render::ReportRenderer;
