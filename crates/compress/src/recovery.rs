//! Startup scan for rotated backups left uncompressed by a prior,
//! ungracefully-terminated run.

use std::path::{Path, PathBuf};

use crate::format::CompressFormat;

const KNOWN_EXTENSIONS: [&str; 3] = [".gz", ".bz2", ".xz"];

/// True if `name` already carries one of the extensions any supported
/// compressor would have appended.
fn already_compressed(name: &str) -> bool {
    KNOWN_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// True if `name` looks like a rotated backup: it contains the `.log.`
/// marker the writer inserts between the facility's log name and the
/// rotation timestamp.
fn looks_like_backup(name: &str) -> bool {
    name.contains(".log.")
}

/// Recursively scans `log_dir` for rotated-but-uncompressed backups and
/// returns their paths, to be handed to [`crate::Compressor::compress`].
pub fn find_uncompressed(log_dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for entry in jwalk::WalkDir::new(log_dir).into_iter().filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if looks_like_backup(&name) && !already_compressed(&name) {
            found.push(entry.path());
        }
    }

    found
}

/// Documents which extension a freshly discovered backup would receive once
/// compressed under `format`. Exposed mainly for tests and logging.
pub fn target_extension(format: CompressFormat) -> &'static str {
    format.extension()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_rotated_backup_not_yet_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("app");
        fs::create_dir(&app_dir).unwrap();
        fs::write(app_dir.join("root.log.2024-01-01-00-00-00-000000"), b"x").unwrap();
        fs::write(app_dir.join("root.log"), b"live").unwrap();

        let found = find_uncompressed(dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("root.log.2024-01-01-00-00-00-000000"));
    }

    #[test]
    fn skips_already_compressed_backup() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("root.log.2024-01-01-00-00-00-000000.gz"), b"x").unwrap();

        assert!(find_uncompressed(dir.path()).is_empty());
    }
}
