mod options;
mod playlist;
mod progress;

pub use options::{DownloadOptions, OutputFormat};
pub use playlist::{PlaylistEntry, PlaylistInfo};
pub use progress::{DownloadEvent, DownloadProgress, ProgressStatus};
