//! Session configuration.
//!
//! The config request is loaded from a JSON document supplied out of band
//! and fully constructed before the session starts; it is sent exactly
//! once, as the first message on the channel.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::io::{ByteSource, FileSource, PipeSource};
use crate::streaming::protocol::{ConfigFlags, ConfigRequest, StreamingFeature};

/// On-disk JSON config document.
///
/// ```json
/// { "feature": "LABEL_DETECTION", "stationary_camera": true, "model": "builtin/stable" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotateConfig {
    pub feature: StreamingFeature,
    #[serde(default)]
    pub stationary_camera: bool,
    #[serde(default)]
    pub model: Option<String>,
}

impl AnnotateConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn to_request(&self) -> ConfigRequest {
        let mut flags = ConfigFlags::empty();
        if self.stationary_camera {
            flags |= ConfigFlags::STATIONARY_CAMERA;
        }
        ConfigRequest {
            feature: self.feature,
            flags,
            model: self.model.clone().unwrap_or_default(),
        }
    }
}

/// Content input selector: regular file or named pipe.
#[derive(Debug, Clone)]
pub enum InputSelect {
    File(PathBuf),
    Pipe(PathBuf),
}

impl InputSelect {
    pub fn path(&self) -> &Path {
        match self {
            Self::File(p) | Self::Pipe(p) => p,
        }
    }

    pub async fn open(&self) -> io::Result<Box<dyn ByteSource>> {
        match self {
            Self::File(p) => Ok(Box::new(FileSource::open(p).await?)),
            Self::Pipe(p) => Ok(Box::new(PipeSource::open(p).await?)),
        }
    }
}
