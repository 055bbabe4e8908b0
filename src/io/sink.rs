//! Local storage sinks for the mirrors.
//!
//! Two specializations: [`FileSink`] keeps a byte-exact copy of the
//! content stream, [`RecordSink`] persists discrete result messages,
//! length-delimited. [`RecordReader`] reads the latter back.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Capability interface for a raw byte mirror.
#[async_trait]
pub trait ByteSink: Send {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()>;
    async fn close(&mut self) -> io::Result<()>;
}

/// Byte-exact mirror of the content stream.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    pub async fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

#[async_trait]
impl ByteSink for FileSink {
    async fn write(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf).await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await
    }
}

/// Persists one length-delimited record per result message, in arrival
/// order. Record format: len:u32 BE | encoded result payload.
pub struct RecordSink {
    writer: BufWriter<File>,
}

impl RecordSink {
    pub async fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path).await?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub async fn write_record(&mut self, payload: &Bytes) -> io::Result<()> {
        self.writer.write_u32(payload.len() as u32).await?;
        self.writer.write_all(payload).await
    }

    pub async fn close(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await
    }
}

/// Reads back records written by [`RecordSink`].
pub struct RecordReader {
    reader: BufReader<File>,
}

impl RecordReader {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self {
            reader: BufReader::new(file),
        })
    }

    /// Returns the next record payload, or None at end of file.
    pub async fn read_record(&mut self) -> anyhow::Result<Option<Bytes>> {
        let mut header = [0u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            let n = self.reader.read(&mut header[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < header.len() {
            anyhow::bail!("Truncated record header: {} of 4 bytes", filled);
        }

        let len = u32::from_be_bytes(header) as usize;
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        Ok(Some(Bytes::from(payload)))
    }
}
