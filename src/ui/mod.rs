pub mod icons;
pub mod progress;

pub use progress::{ArchiveProgress, ProgressTally, print_summary};
