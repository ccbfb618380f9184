//! Supported external compressors and runtime discovery of which are
//! actually installed.

use std::path::PathBuf;

/// An external compression format, backed by a subprocess invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressFormat {
    Gzip,
    Bzip2,
    Xz,
}

/// The format used as a fallback when the configured one is unavailable,
/// and the only format ever used for streaming compress-on-write.
pub const FALLBACK: CompressFormat = CompressFormat::Gzip;

impl CompressFormat {
    pub fn parse(s: &str) -> Option<CompressFormat> {
        match s {
            "gzip" => Some(CompressFormat::Gzip),
            "bzip2" => Some(CompressFormat::Bzip2),
            "xz" => Some(CompressFormat::Xz),
            _ => None,
        }
    }

    /// Name of the executable invoked to compress a file in place.
    pub fn command(self) -> &'static str {
        match self {
            CompressFormat::Gzip => "gzip",
            CompressFormat::Bzip2 => "bzip2",
            CompressFormat::Xz => "xz",
        }
    }

    /// Extension the external tool appends to a compressed file.
    pub fn extension(self) -> &'static str {
        match self {
            CompressFormat::Gzip => ".gz",
            CompressFormat::Bzip2 => ".bz2",
            CompressFormat::Xz => ".xz",
        }
    }

    pub fn all() -> [CompressFormat; 3] {
        [CompressFormat::Gzip, CompressFormat::Bzip2, CompressFormat::Xz]
    }
}

/// Error discovering or validating a compressor at startup.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("compressor \"{0}\" and fallback compressor \"gzip\" are both missing from $PATH")]
    NoneAvailable(&'static str),
}

/// Returns the path to `format`'s executable if it is on `$PATH`.
pub fn find_executable(format: CompressFormat) -> Option<PathBuf> {
    which::which(format.command()).ok()
}

/// Resolves which format to actually use: `configured` if its executable is
/// present, otherwise [`FALLBACK`] with a warning, or an error if neither is
/// installed.
pub fn discover(configured: CompressFormat) -> Result<CompressFormat, DiscoveryError> {
    if find_executable(configured).is_some() {
        return Ok(configured);
    }

    if configured == FALLBACK {
        return Err(DiscoveryError::NoneAvailable(FALLBACK.command()));
    }

    if find_executable(FALLBACK).is_some() {
        tracing::warn!(
            configured = configured.command(),
            fallback = FALLBACK.command(),
            "configured compressor missing from $PATH, falling back"
        );
        return Ok(FALLBACK);
    }

    Err(DiscoveryError::NoneAvailable(configured.command()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!(CompressFormat::parse("xz"), Some(CompressFormat::Xz));
        assert_eq!(CompressFormat::parse("lzma"), None);
    }

    #[test]
    fn each_format_has_a_distinct_extension() {
        let exts: std::collections::HashSet<_> = CompressFormat::all().iter().map(|f| f.extension()).collect();
        assert_eq!(exts.len(), 3);
    }
}
