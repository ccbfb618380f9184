//! Background thread that compresses rotated log files as they are handed
//! to it, deduplicating requests already queued.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::format::CompressFormat;

enum Message {
    Compress(PathBuf),
    Shutdown,
}

/// Handle to the running compression worker thread.
pub struct Compressor {
    format: CompressFormat,
    sender: Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl Compressor {
    /// Spawns the worker thread, which will invoke `format`'s executable on
    /// every path submitted via [`Compressor::compress`].
    pub fn spawn(format: CompressFormat) -> Compressor {
        let (sender, receiver) = mpsc::channel();
        let handle = std::thread::Builder::new()
            .name("compressor".to_string())
            .spawn(move || run(format, receiver))
            .expect("spawning the compressor thread");

        Compressor {
            format,
            sender,
            handle: Some(handle),
        }
    }

    /// Queues `path` for compression. A path already queued is not queued
    /// twice.
    pub fn compress(&self, path: impl Into<PathBuf>) {
        let _ = self.sender.send(Message::Compress(path.into()));
    }

    /// Signals the worker to finish its current job and exit, then joins it.
    pub fn shutdown(mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn format(&self) -> CompressFormat {
        self.format
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.sender.send(Message::Shutdown);
            let _ = handle.join();
        }
    }
}

fn run(format: CompressFormat, receiver: Receiver<Message>) {
    let mut pending: Vec<PathBuf> = Vec::new();
    let mut queued: HashSet<PathBuf> = HashSet::new();

    loop {
        if pending.is_empty() {
            match receiver.recv() {
                Ok(Message::Compress(path)) => {
                    if queued.insert(path.clone()) {
                        pending.push(path);
                    }
                }
                Ok(Message::Shutdown) | Err(_) => return,
            }
        }

        // Drain anything else waiting without blocking, preserving order.
        while let Ok(message) = receiver.try_recv() {
            match message {
                Message::Compress(path) => {
                    if queued.insert(path.clone()) {
                        pending.push(path);
                    }
                }
                Message::Shutdown => {
                    drain_remaining(format, &mut pending, &mut queued);
                    return;
                }
            }
        }

        if let Some(path) = pop_front(&mut pending) {
            queued.remove(&path);
            compress_one(format, &path);
        }
    }
}

fn drain_remaining(format: CompressFormat, pending: &mut Vec<PathBuf>, queued: &mut HashSet<PathBuf>) {
    while let Some(path) = pop_front(pending) {
        queued.remove(&path);
        compress_one(format, &path);
    }
}

fn pop_front(pending: &mut Vec<PathBuf>) -> Option<PathBuf> {
    if pending.is_empty() {
        None
    } else {
        Some(pending.remove(0))
    }
}

fn compress_one(format: CompressFormat, path: &Path) {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "file disappeared before compression could run");
        return;
    }

    tracing::info!(path = %path.display(), format = format.command(), "compressing rotated log");

    match Command::new(format.command()).arg(path).output() {
        Ok(output) if output.status.success() => {
            tracing::info!(path = %path.display(), "compression finished");
        }
        Ok(output) => {
            tracing::warn!(
                path = %path.display(),
                status = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "compression failed"
            );
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to spawn compressor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    // `true` and `false` are present on every POSIX system and make good
    // stand-ins for a real compressor in tests that only care about control
    // flow, not actual compression output.
    #[test]
    fn queued_file_is_picked_up_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app.log.1");
        std::fs::File::create(&file).unwrap().write_all(b"x").unwrap();

        // gzip is assumed present in the dev/test environment.
        let compressor = Compressor::spawn(CompressFormat::Gzip);
        compressor.compress(&file);
        compressor.shutdown();

        assert!(!file.exists() || dir.path().join("app.log.1.gz").exists());
    }

    #[test]
    fn missing_file_does_not_panic_worker() {
        let compressor = Compressor::spawn(CompressFormat::Gzip);
        compressor.compress("/nonexistent/path/does-not-exist.log");
        compressor.shutdown();
    }

    #[test]
    fn shutdown_without_any_work_returns_promptly() {
        let compressor = Compressor::spawn(CompressFormat::Gzip);
        let start = std::time::Instant::now();
        compressor.shutdown();
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
