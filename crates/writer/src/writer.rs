//! Dispatches resolved records to the right [`LogFile`], creating it on
//! first use.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Local;
use compress::{stream, Compressor};
use facility::Facility;
use scheduler::Scheduler;

use crate::log_file::{LogFile, LogFileError};

pub use crate::log_file::RotateReason;

/// Errors writing a log line.
#[derive(Debug, thiserror::Error)]
pub enum WriterError {
    #[error(transparent)]
    LogFile(#[from] LogFileError),
}

/// Settings shared by every file the writer opens.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub log_dir: PathBuf,
    pub compress_on_write: bool,
    pub gzip_level: u32,
}

/// Owns every open [`LogFile`] and the shared rotation clock and background
/// compressor used to finish a rotation.
pub struct Writer {
    config: WriterConfig,
    scheduler: Arc<Mutex<Scheduler>>,
    compressor: Option<Arc<Compressor>>,
    files: HashMap<PathBuf, LogFile>,
}

impl Writer {
    pub fn new(config: WriterConfig, scheduler: Arc<Mutex<Scheduler>>, compressor: Option<Arc<Compressor>>) -> Writer {
        Writer {
            config,
            scheduler,
            compressor,
            files: HashMap::new(),
        }
    }

    /// Path a record for `facility`/`hostname` should be written to,
    /// already wrapped with a `.gz` suffix if streaming compression is on.
    pub fn target_path(&self, facility: &Facility, hostname: &str) -> PathBuf {
        let filename = if facility.file_per_host {
            format!("{hostname}-{}.log", facility.mod_str)
        } else {
            format!("{}.log", facility.mod_str)
        };
        let mut path = self.config.log_dir.join(&facility.app_id).join(filename);

        if self.config.compress_on_write {
            let wrapped = stream::wrap_filename(&path.to_string_lossy());
            path = PathBuf::from(wrapped);
        }

        path
    }

    fn get_or_open(&mut self, facility: &Facility, hostname: &str) -> Result<&mut LogFile, WriterError> {
        let path = self.target_path(facility, hostname);

        if !self.files.contains_key(&path) {
            let log_file = LogFile::open(
                &path,
                &self.scheduler,
                facility.backup_count,
                facility.max_size,
                facility.rotate.clone(),
                facility.flush_every,
                self.config.compress_on_write,
                self.config.gzip_level,
            )?;
            self.files.insert(path.clone(), log_file);
        }

        Ok(self.files.get_mut(&path).expect("just inserted"))
    }

    /// Writes one record's body to the file resolved for `facility`,
    /// rotating first if due. `facility` is already the result of facility
    /// classification -- the writer never re-resolves it from `app_id`
    /// and `module`, unlike a lookup-on-every-write design.
    pub fn write(&mut self, facility: &Facility, hostname: &str, body: &str) -> Result<(), WriterError> {
        let scheduler = Arc::clone(&self.scheduler);
        let compressor = self.compressor.clone();
        let log_file = self.get_or_open(facility, hostname)?;

        let now = chrono::Utc::now();
        let due = {
            let mut s = scheduler.lock().expect("scheduler mutex poisoned");
            log_file.should_rotate(&mut s, now)?
        };

        if due.is_some() {
            if let Some(backup_path) = log_file.rotate(&scheduler)? {
                if let Some(compressor) = &compressor {
                    compressor.compress(backup_path);
                }
            }
        }

        let line = format!("{} - {} - {}\n", now.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S%.6f"), hostname, body);
        log_file.write(line.as_bytes())?;

        Ok(())
    }

    /// Closes and drops every open file. A subsequent `write` reopens
    /// whatever file it targets.
    pub fn close_all(&mut self) {
        self.files.clear();
    }

    /// Equivalent to [`Writer::close_all`]; used after a configuration
    /// reload so files pick up any changed facility settings on next write.
    pub fn reload(&mut self) {
        self.close_all();
    }

    pub fn open_file_count(&self) -> usize {
        self.files.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facility::{FacilitySpec, ModuleId};

    fn facility(app_id: &str, module: &str, file_per_host: bool) -> Facility {
        Facility::build(FacilitySpec {
            app_id: app_id.to_string(),
            mod_id: ModuleId::parse(module),
            rotate: "daily".to_string(),
            backup_count: 3,
            max_size: Some(1 << 20),
            secret: None,
            flush_every: 1,
            file_per_host,
        })
        .unwrap()
    }

    fn writer(dir: &std::path::Path) -> Writer {
        let scheduler = Arc::new(Mutex::new(Scheduler::open(dir.join("schedules")).unwrap()));
        Writer::new(
            WriterConfig {
                log_dir: dir.to_path_buf(),
                compress_on_write: false,
                gzip_level: 6,
            },
            scheduler,
            None,
        )
    }

    #[test]
    fn writes_create_expected_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path());
        let f = facility("app", "web", false);

        w.write(&f, "host1", "hello").unwrap();

        let path = dir.path().join("app/web.log");
        assert!(path.exists());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("host1 - hello\n"));
    }

    #[test]
    fn file_per_host_splits_by_hostname() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path());
        let f = facility("app", "web", true);

        w.write(&f, "host1", "a").unwrap();
        w.write(&f, "host2", "b").unwrap();

        assert!(dir.path().join("app/host1-web.log").exists());
        assert!(dir.path().join("app/host2-web.log").exists());
    }

    #[test]
    fn close_all_allows_reopen_on_next_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = writer(dir.path());
        let f = facility("app", "web", false);

        w.write(&f, "host1", "a").unwrap();
        assert_eq!(w.open_file_count(), 1);
        w.close_all();
        assert_eq!(w.open_file_count(), 0);

        w.write(&f, "host1", "b").unwrap();
        let contents = std::fs::read_to_string(dir.path().join("app/web.log")).unwrap();
        assert!(contents.contains("a\n"));
        assert!(contents.contains("b\n"));
    }
}
