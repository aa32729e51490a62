//! Async Rust wrapper for the yt-dlp CLI.
//!
//! This library drives the `yt-dlp` command-line tool for two jobs: listing
//! the entries of a playlist without downloading anything, and downloading a
//! batch of URLs in a single process while streaming parsed progress events.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//! use yt_dlp::{DownloadEvent, DownloadOptions, OutputFormat, YtDlp};
//!
//! #[tokio::main]
//! async fn main() -> yt_dlp::Result<()> {
//!     let client = YtDlp::new();
//!
//!     let version = client.check_binary().await?;
//!     println!("yt-dlp version: {}", version);
//!
//!     let playlist = client
//!         .get_playlist_entries("https://www.youtube.com/playlist?list=PL123")
//!         .await?;
//!     println!("{} entries available", playlist.available_count());
//!
//!     let options = DownloadOptions::new().format(OutputFormat::BestAudio);
//!     let urls = vec!["https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()];
//!     let stream = client.download_with_progress(&urls, &options);
//!     tokio::pin!(stream);
//!     while let Some(event) = stream.next().await {
//!         if let DownloadEvent::Progress(progress) = event? {
//!             println!("{} downloaded", progress.format_size());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod client;
mod command;
pub mod error;
pub mod types;

pub use client::YtDlp;
pub use error::{Error, Result};
pub use types::{
    DownloadEvent, DownloadOptions, DownloadProgress, OutputFormat, PlaylistEntry, PlaylistInfo,
    ProgressStatus
};
