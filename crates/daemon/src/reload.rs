//! SIGHUP-triggered configuration reload: re-read `facilities.conf`, swap
//! the [`Processor`]'s [`FacilityDB`] atomically, and ask the Writer to
//! close its open files for lazy reopen under the new settings.
//!
//! Mirrors the reference daemon's `reload_config`: a checksum of the main
//! config file is captured at startup, and if it no longer matches, online
//! reload is refused in favor of an operator restart.

use std::path::Path;
use std::sync::Arc;

use facility::FacilityDB;

use crate::config::MainConfigGuard;
use crate::processor::Processor;

/// Errors performing an online reload. None of these are fatal to the
/// daemon -- the caller logs and keeps running under the previous
/// configuration.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error("main config file changed since startup; restart the process instead of reloading")]
    MainConfigChanged,
    #[error("checking main config file for changes: {0}")]
    CheckMainConfig(#[source] std::io::Error),
    #[error(transparent)]
    Facilities(#[from] facility::config::ConfigError),
    #[error("every app in the reloaded facility config must have a root section")]
    MissingRoot,
}

/// Performs one reload cycle. `main_config`, when present, gates the
/// reload on its checksum; `facilities_conf` is always re-read and
/// re-validated before anything is swapped in.
pub fn reload(facilities_conf: &Path, main_config: Option<&MainConfigGuard>, processor: &Processor) -> Result<(), ReloadError> {
    if let Some(guard) = main_config {
        if !guard.unchanged().map_err(ReloadError::CheckMainConfig)? {
            return Err(ReloadError::MainConfigChanged);
        }
    }

    let facilities = facility::config::load_facilities(facilities_conf)?;
    let db = FacilityDB::new(facilities).ok_or(ReloadError::MissingRoot)?;

    processor.swap_facility_db(Arc::new(db));
    processor.reload_writer();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MainConfigGuard;
    use facility::ModuleId;
    use scheduler::Scheduler;
    use std::sync::Mutex;
    use writer::{Writer, WriterConfig};

    fn processor(dir: &std::path::Path) -> Processor {
        let facility = facility::Facility::build(facility::FacilitySpec {
            app_id: "app".to_string(),
            mod_id: ModuleId::root(),
            rotate: "daily".to_string(),
            backup_count: 2,
            max_size: None,
            secret: None,
            flush_every: 1,
            file_per_host: false,
        })
        .unwrap();
        let db = Arc::new(FacilityDB::new(vec![facility]).unwrap());
        let scheduler = Arc::new(Mutex::new(Scheduler::open(dir.join("schedules")).unwrap()));
        let writer = Writer::new(
            WriterConfig {
                log_dir: dir.to_path_buf(),
                compress_on_write: false,
                gzip_level: 6,
            },
            scheduler,
            None,
        );
        Processor::new(db, writer)
    }

    #[test]
    fn reload_swaps_in_a_newly_configured_app() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(dir.path());

        let facilities_conf = dir.path().join("facilities.conf");
        std::fs::write(&facilities_conf, "[app]\nrotate = daily\nbackup_count = 2\n\n[other]\nrotate = daily\nbackup_count = 2\n").unwrap();

        reload(&facilities_conf, None, &processor).unwrap();

        let payload = br#"{"version":1,"app_id":"other","module":"root","stamp":1,"nsecs":0,"hostname":"h","body":"hi"}"#;
        processor.process(payload, "127.0.0.1:1".parse().unwrap()).unwrap();
        assert!(dir.path().join("other/root.log").exists());
    }

    #[test]
    fn reload_is_refused_when_main_config_changed() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(dir.path());

        let main_config_path = dir.path().join("logcollectd.conf");
        std::fs::write(&main_config_path, b"work_dir = /var/lib/logcollectd\n").unwrap();
        let guard = MainConfigGuard::capture(main_config_path.clone()).unwrap();

        std::fs::write(&main_config_path, b"work_dir = /tmp/elsewhere\n").unwrap();

        let facilities_conf = dir.path().join("facilities.conf");
        std::fs::write(&facilities_conf, "[app]\nrotate = daily\nbackup_count = 2\n").unwrap();

        let err = reload(&facilities_conf, Some(&guard), &processor).unwrap_err();
        assert!(matches!(err, ReloadError::MainConfigChanged));
    }

    #[test]
    fn reload_fails_closed_on_invalid_facilities_config() {
        let dir = tempfile::tempdir().unwrap();
        let processor = processor(dir.path());

        let facilities_conf = dir.path().join("facilities.conf");
        std::fs::write(&facilities_conf, "[app:web]\nrotate = daily\nbackup_count = 2\n").unwrap();

        let err = reload(&facilities_conf, None, &processor).unwrap_err();
        assert!(matches!(err, ReloadError::Facilities(_)));

        // The previous, valid configuration is still in effect.
        let payload = br#"{"version":1,"app_id":"app","module":"root","stamp":1,"nsecs":0,"hostname":"h","body":"hi"}"#;
        processor.process(payload, "127.0.0.1:1".parse().unwrap()).unwrap();
    }
}
