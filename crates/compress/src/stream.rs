//! Streaming compress-on-write support.
//!
//! When `compress_on_write` is enabled, a [`Writer`](../../writer/index.html)
//! wraps the raw file handle in a [`flate2::write::GzEncoder`] instead of
//! writing plain bytes and later handing the finished file to the
//! background [`crate::Compressor`]. This mode always uses gzip regardless
//! of the configured format, since gzip is the only format whose streaming
//! writer doesn't require buffering the whole file.

use std::fs::File;
use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Appends `.gz` to a path about to be opened in streaming mode.
pub fn wrap_filename(filename: &str) -> String {
    format!("{filename}.gz")
}

/// Strips a trailing `.gz` added by [`wrap_filename`], if present.
pub fn unwrap_filename(filename: &str) -> &str {
    filename.strip_suffix(".gz").unwrap_or(filename)
}

/// A sink that gzip-compresses everything written to it before it reaches
/// the underlying file. Each write is followed by a flush so that a reader
/// tailing the file sees data promptly; full completion of the gzip stream
/// requires closing it.
pub struct GzipSink {
    encoder: GzEncoder<File>,
}

impl GzipSink {
    pub fn new(file: File, level: u32) -> GzipSink {
        GzipSink {
            encoder: GzEncoder::new(file, Compression::new(level)),
        }
    }
}

impl Write for GzipSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.encoder.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.encoder.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_then_unwrap_round_trips() {
        assert_eq!(unwrap_filename(&wrap_filename("app.log")), "app.log");
    }

    #[test]
    fn unwrap_is_identity_without_extension() {
        assert_eq!(unwrap_filename("app.log"), "app.log");
    }

    #[test]
    fn written_bytes_decompress_back_to_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log.gz");
        {
            let file = File::create(&path).unwrap();
            let mut sink = GzipSink::new(file, 6);
            sink.write_all(b"hello world\n").unwrap();
            sink.flush().unwrap();
            sink.encoder.try_finish().unwrap();
        }

        let compressed = std::fs::read(&path).unwrap();
        let mut decoder = flate2::read::GzDecoder::new(&compressed[..]);
        let mut out = String::new();
        std::io::Read::read_to_string(&mut decoder, &mut out).unwrap();
        assert_eq!(out, "hello world\n");
    }
}
