mod inject;
mod scan;
mod toolbox;
mod transform;

pub use inject::InjectErrorKind;
pub use scan::ScanErrorKind;
pub use toolbox::ToolboxErrorKind;
pub use transform::TransformErrorKind;
