#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `compress` owns background compression of rotated log files, plus the
//! optional streaming compress-on-write path.
//!
//! # Design
//!
//! - [`format`] enumerates the supported external compressors and
//!   discovers which are actually installed, falling back to gzip with a
//!   warning and failing startup only if neither the configured compressor
//!   nor the fallback is available.
//! - [`worker`] runs a background thread that compresses files handed to it
//!   one at a time, deduplicating in-flight requests.
//! - [`stream`] implements the compress-on-write gzip wrapper used instead
//!   of the background worker when a facility asks for it.
//! - [`recovery`] scans the log directory at startup for backups a prior
//!   run rotated but never got around to compressing.
//!
//! # Invariants
//!
//! - Streaming compress-on-write always uses gzip, never the configured
//!   background format: gzip is the only one of the three with a streaming
//!   writer in [`flate2`], so there is nothing to select between.
//! - [`CompressConfig::resolve`] never returns a format whose executable is
//!   missing from `$PATH`.
//!
//! # Errors
//!
//! [`CompressError`] wraps [`format::DiscoveryError`] for startup
//! compressor-discovery failures.

pub mod format;
pub mod recovery;
pub mod stream;
pub mod worker;

pub use format::CompressFormat;
pub use worker::Compressor;

/// Errors configuring the compression subsystem at startup.
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error(transparent)]
    Discovery(#[from] format::DiscoveryError),
}

/// Compression settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct CompressConfig {
    pub configured_format: CompressFormat,
    pub level: u32,
    pub compress_on_write: bool,
}

impl CompressConfig {
    /// Resolves the format actually in effect: gzip unconditionally when
    /// `compress_on_write` is set, otherwise the configured format (or its
    /// fallback, per [`format::discover`]).
    pub fn resolve(&self) -> Result<CompressFormat, CompressError> {
        if self.compress_on_write {
            return Ok(format::FALLBACK);
        }
        Ok(format::discover(self.configured_format)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_on_write_always_resolves_to_gzip() {
        let config = CompressConfig {
            configured_format: CompressFormat::Xz,
            level: 6,
            compress_on_write: true,
        };
        assert_eq!(config.resolve().unwrap(), CompressFormat::Gzip);
    }
}
