//! A single rotating log file and its backups.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, Utc};
use compress::stream::GzipSink;
use facility::RotateSpec;
use scheduler::Scheduler;

/// Errors opening, writing to, or rotating a log file.
#[derive(Debug, thiserror::Error)]
pub enum LogFileError {
    #[error("creating directory for {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("opening {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("writing {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("statting {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("renaming {from} to {to}: {source}")]
    Rename {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Scheduler(#[from] scheduler::SchedulerError),
}

/// Why a file was rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateReason {
    MaxSize,
    Cron,
}

enum Sink {
    Plain(File),
    Gzip(Box<GzipSink>),
}

impl Sink {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self {
            Sink::Plain(f) => f.write_all(buf),
            Sink::Gzip(g) => g.write_all(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Sink::Plain(f) => f.flush(),
            Sink::Gzip(g) => g.flush(),
        }
    }
}

/// An open, rotatable log file.
pub struct LogFile {
    /// The on-disk path as actually opened (already compression-wrapped if
    /// `compress_on_write` is set).
    path: PathBuf,
    sink: Sink,
    size: u64,
    dirty_writes: u32,

    backup_count: u32,
    max_size: Option<u64>,
    rotate: RotateSpec,
    flush_every: u32,
    compress_on_write: bool,
    gzip_level: u32,
}

impl LogFile {
    /// Opens `path`, creating its parent directory and the file itself if
    /// needed. A freshly created file records its creation time with
    /// `scheduler` under `path` as the job id; a pre-existing file does not,
    /// preserving whatever rotation anchor was recorded for it before.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        path: &Path,
        scheduler: &Arc<Mutex<Scheduler>>,
        backup_count: u32,
        max_size: Option<u64>,
        rotate: RotateSpec,
        flush_every: u32,
        compress_on_write: bool,
        gzip_level: u32,
    ) -> Result<LogFile, LogFileError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LogFileError::CreateDir {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let job_id = path.to_string_lossy().into_owned();

        let mut open_opts = OpenOptions::new();
        open_opts.create_new(true).write(true).mode(0o644);

        let (file, freshly_created) = match open_opts.open(path) {
            Ok(file) => (file, true),
            Err(source) if source.kind() == std::io::ErrorKind::AlreadyExists => {
                let file = OpenOptions::new()
                    .append(true)
                    .mode(0o644)
                    .open(path)
                    .map_err(|source| LogFileError::Open {
                        path: path.display().to_string(),
                        source,
                    })?;
                (file, false)
            }
            Err(source) => {
                return Err(LogFileError::Open {
                    path: path.display().to_string(),
                    source,
                })
            }
        };

        if freshly_created {
            scheduler
                .lock()
                .expect("scheduler mutex poisoned")
                .record_execution(&job_id, Utc::now())?;
        }

        let size = fs::metadata(path)
            .map_err(|source| LogFileError::Stat {
                path: path.display().to_string(),
                source,
            })?
            .len();

        let sink = if compress_on_write {
            Sink::Gzip(Box::new(GzipSink::new(file, gzip_level)))
        } else {
            Sink::Plain(file)
        };

        Ok(LogFile {
            path: path.to_path_buf(),
            sink,
            size,
            dirty_writes: 0,
            backup_count,
            max_size,
            rotate,
            flush_every,
            compress_on_write,
            gzip_level,
        })
    }

    /// Appends `data`, flushing and refreshing the cached size only every
    /// `flush_every` writes. Between flushes the cached size can undercount
    /// actual file size by up to `flush_every - 1` writes' worth of bytes;
    /// this is intentional, trading a bounded rotation-size overshoot for
    /// avoiding an `fstat` on every write.
    pub fn write(&mut self, data: &[u8]) -> Result<(), LogFileError> {
        self.sink.write_all(data).map_err(|source| LogFileError::Write {
            path: self.path.display().to_string(),
            source,
        })?;
        self.dirty_writes += 1;

        if self.dirty_writes >= self.flush_every {
            self.sink.flush().map_err(|source| LogFileError::Write {
                path: self.path.display().to_string(),
                source,
            })?;
            self.dirty_writes = 0;
            self.size = fs::metadata(&self.path)
                .map_err(|source| LogFileError::Stat {
                    path: self.path.display().to_string(),
                    source,
                })?
                .len();
        }

        Ok(())
    }

    /// Determines whether this file is due for rotation. `max_size` is
    /// checked whenever it is set, independent of the rotation mode; the
    /// cron schedule is consulted only when `rotate` is
    /// [`RotateSpec::Cron`].
    pub fn should_rotate(&self, scheduler: &mut Scheduler, now: DateTime<Utc>) -> Result<Option<RotateReason>, LogFileError> {
        if let Some(max_size) = self.max_size {
            if self.size >= max_size {
                return Ok(Some(RotateReason::MaxSize));
            }
        }

        if let RotateSpec::Cron { schedule, .. } = &self.rotate {
            let job_id = self.path.to_string_lossy();
            let next = scheduler.get_next_execution(&job_id, schedule, now)?;
            if next <= now {
                return Ok(Some(RotateReason::Cron));
            }
        }

        Ok(None)
    }

    /// Renames the current file aside with a timestamp suffix derived from
    /// its last rotation anchor, prunes old backups beyond `backup_count`,
    /// and reopens a fresh file at `path` regardless of whether the rename
    /// succeeded.
    pub fn rotate(
        &mut self,
        scheduler: &Arc<Mutex<Scheduler>>,
    ) -> Result<Option<PathBuf>, LogFileError> {
        let job_id = self.path.to_string_lossy().into_owned();
        let last_rotation = scheduler
            .lock()
            .expect("scheduler mutex poisoned")
            .get_last_execution(&job_id)?
            .unwrap_or_else(Utc::now);

        self.sink.flush().map_err(|source| LogFileError::Write {
            path: self.path.display().to_string(),
            source,
        })?;

        let unwrapped = if self.compress_on_write {
            compress::stream::unwrap_filename(&self.path.to_string_lossy()).to_string()
        } else {
            self.path.to_string_lossy().into_owned()
        };

        let stamp = last_rotation
            .with_timezone(&Local)
            .format("%Y-%m-%d-%H-%M-%S-%6f");
        let backup_base = format!("{unwrapped}.{stamp}");
        let backup_name = if self.compress_on_write {
            compress::stream::wrap_filename(&backup_base)
        } else {
            backup_base
        };
        let backup_path = PathBuf::from(&backup_name);

        let rename_result = rename_if_exists(&self.path, &backup_path);

        let result = match &rename_result {
            Ok(()) => {
                self.remove_old_backups()?;
                Ok(Some(backup_path))
            }
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "rotation rename failed");
                Ok(None)
            }
        };

        *self = LogFile::open(
            &self.path,
            scheduler,
            self.backup_count,
            self.max_size,
            self.rotate.clone(),
            self.flush_every,
            self.compress_on_write,
            self.gzip_level,
        )?;

        result
    }

    /// Removes all backups of this file beyond the newest `backup_count`,
    /// identified by lexicographic sort of filenames sharing this file's
    /// basename as a prefix (the timestamp suffix sorts chronologically).
    fn remove_old_backups(&self) -> Result<(), LogFileError> {
        let prefix = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));

        let mut matches: Vec<PathBuf> = fs::read_dir(dir)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().starts_with(&prefix) && n.to_string_lossy() != prefix)
                    .unwrap_or(false)
            })
            .collect();

        matches.sort();

        if matches.len() > self.backup_count as usize {
            let remove_count = matches.len() - self.backup_count as usize;
            for path in matches.into_iter().take(remove_count) {
                if let Err(error) = fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), %error, "failed to remove old backup");
                }
            }
        }

        Ok(())
    }
}

fn rename_if_exists(src: &Path, dst: &Path) -> std::io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error),
    }
}
