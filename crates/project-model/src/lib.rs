//! b50reel Project Model
//!
//! Defines the data contracts consumed by the render pipeline:
//! - **Style:** Asset paths, options, and text styles shared by every clip
//! - **Record:** A score record as drawn on a score card
//! - **Clip:** Main-content clip configs, intro/outro pages, and time windows
//! - **Job:** The persisted video configuration and the ordered render job
//!
//! Everything here is plain data. Loading from and saving to JSON is
//! provided for the tools that drive the pipeline; rendering lives in
//! `b50reel-render-engine`.

pub mod clip;
pub mod job;
pub mod record;
pub mod style;

pub use clip::*;
pub use job::*;
pub use record::*;
pub use style::*;
