//! Command-line surface.
//!
//! Flags mirror the knobs the session needs: where the service lives, what
//! to stream, how long the channel may live, and optional local mirrors.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::InputSelect;
use crate::streaming::session::SessionOptions;

#[derive(Debug, Parser)]
#[command(name = "vistream", version, about = "Stream video content to a remote annotation service")]
pub struct Cli {
    /// Config request JSON document
    #[arg(long)]
    pub config: PathBuf,

    /// Annotation service endpoint (host:port)
    #[arg(long, env = "VISTREAM_ENDPOINT", default_value = "127.0.0.1:10000")]
    pub endpoint: String,

    /// Input video path
    #[arg(long)]
    pub video_path: PathBuf,

    /// Read video content from a named pipe instead of a regular file
    #[arg(long)]
    pub use_pipe: bool,

    /// Session deadline in seconds
    #[arg(long, default_value_t = 3600)]
    pub timeout: u64,

    /// Local storage: mirror sent video content to this path
    #[arg(long)]
    pub local_storage_video: Option<PathBuf>,

    /// Local storage: mirror received annotation results to this path
    #[arg(long)]
    pub local_storage_annotation_result: Option<PathBuf>,
}

impl Cli {
    pub fn input(&self) -> InputSelect {
        if self.use_pipe {
            InputSelect::Pipe(self.video_path.clone())
        } else {
            InputSelect::File(self.video_path.clone())
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            deadline: Duration::from_secs(self.timeout),
            content_mirror: self.local_storage_video.clone(),
            result_mirror: self.local_storage_annotation_result.clone(),
            ..SessionOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["vistream", "--config", "c.json", "--video-path", "v.mp4"]);
        assert_eq!(cli.timeout, 3600);
        assert!(!cli.use_pipe);
        assert!(matches!(cli.input(), InputSelect::File(_)));

        let options = cli.session_options();
        assert_eq!(options.deadline, Duration::from_secs(3600));
        assert!(options.content_mirror.is_none());
    }

    #[test]
    fn test_pipe_and_mirrors() {
        let cli = Cli::parse_from([
            "vistream",
            "--config",
            "c.json",
            "--video-path",
            "/tmp/capture.fifo",
            "--use-pipe",
            "--timeout",
            "30",
            "--local-storage-video",
            "/tmp/video.bin",
            "--local-storage-annotation-result",
            "/tmp/results.bin",
        ]);
        assert!(matches!(cli.input(), InputSelect::Pipe(_)));

        let options = cli.session_options();
        assert_eq!(options.deadline, Duration::from_secs(30));
        assert!(options.content_mirror.is_some());
        assert!(options.result_mirror.is_some());
    }
}
