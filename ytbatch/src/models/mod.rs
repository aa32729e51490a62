mod links;
mod quality;

pub use links::{is_playlist, LinkList};
pub use quality::{ParseQualityError, QualityMode};
