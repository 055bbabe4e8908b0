//! Byte sources for the send direction.
//!
//! A source yields ordered chunks of opaque bytes; a zero-length read
//! signals end of input.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

/// Capability interface for the content input.
///
/// `read_chunk` fills as much of `buf` as the source can provide and
/// returns the number of bytes read; 0 means the input is exhausted.
/// Resources are released on drop.
#[async_trait]
pub trait ByteSource: Send {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Reads content from a regular file.
///
/// Always fills the whole buffer except at end of input, so a file of
/// length L produces ceil(L / chunk_size) chunks.
pub struct FileSource {
    reader: BufReader<File>,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

/// Reads content from a named pipe.
///
/// Unlike [`FileSource`] this forwards whatever is currently available
/// instead of waiting for a full buffer, so live captures flow through
/// without batching delay. Opening blocks until a writer attaches.
pub struct PipeSource {
    file: File,
}

impl PipeSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self { file })
    }
}

#[async_trait]
impl ByteSource for PipeSource {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf).await
    }
}
