//! Byte source and sink capabilities used at the session boundary.

pub mod sink;
pub mod source;

pub use sink::{ByteSink, FileSink, RecordReader, RecordSink};
pub use source::{ByteSource, FileSource, PipeSource};
