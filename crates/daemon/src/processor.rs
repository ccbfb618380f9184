//! Decodes wire payloads into records, classifies them against the
//! facility table, verifies their signature, and dispatches them to the
//! writer.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use facility::{FacilityDB, ModuleId};
use wire::{parse_record, signature, Record, RecordError};
use writer::{Writer, WriterError};

/// Errors processing one inbound record. Each variant corresponds to a
/// stage of the pipeline; all but [`ProcessError::Write`] are logged as
/// warnings and do not interrupt the server loop.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("payload could not be decoded: {0}")]
    Decode(#[from] RecordError),
    #[error("no facility configured for app \"{0}\"")]
    UnknownApp(String),
    #[error("signature required by facility but missing or invalid")]
    BadSignature,
    #[error(transparent)]
    Write(#[from] WriterError),
}

/// The record-processing pipeline shared by every listener.
///
/// `facility_db` is behind a [`Mutex`] rather than a plain `Arc` so a SIGHUP
/// reload (see [`crate::reload`]) can swap it for a freshly-loaded table
/// while other threads (TLS connections run on their own) are concurrently
/// reading it to classify messages.
pub struct Processor {
    facility_db: Mutex<Arc<FacilityDB>>,
    writer: Mutex<Writer>,
}

impl Processor {
    pub fn new(facility_db: Arc<FacilityDB>, writer: Writer) -> Processor {
        Processor {
            facility_db: Mutex::new(facility_db),
            writer: Mutex::new(writer),
        }
    }

    fn facility_db(&self) -> Arc<FacilityDB> {
        Arc::clone(&self.facility_db.lock().expect("facility_db mutex poisoned"))
    }

    /// Atomically replaces the facility table, for use by a configuration
    /// reload. In-flight lookups see either the old or the new table, never
    /// a partial one.
    pub fn swap_facility_db(&self, facility_db: Arc<FacilityDB>) {
        *self.facility_db.lock().expect("facility_db mutex poisoned") = facility_db;
    }

    /// Closes every open log file so the next write reopens it, picking up
    /// any facility settings changed by a reload.
    pub fn reload_writer(&self) {
        self.writer.lock().expect("writer mutex poisoned").reload();
    }

    /// Runs one payload through the full pipeline. `peer` is used only for
    /// logging.
    pub fn process(&self, payload: &[u8], peer: SocketAddr) -> Result<(), ProcessError> {
        let record = parse_record(payload)?;

        let module = ModuleId::parse(&record.module);
        let facility = self
            .facility_db()
            .get_facility(&record.app_id, &module)
            .ok_or_else(|| ProcessError::UnknownApp(record.app_id.clone()))?;

        if let Some(secret) = &facility.secret {
            if !signature::verify(secret, &record) {
                return Err(ProcessError::BadSignature);
            }
        }

        tracing::debug!(app_id = %record.app_id, module = %record.module, %peer, "processed record");

        self.writer
            .lock()
            .expect("writer mutex poisoned")
            .write(&facility, &record.hostname, &record.body)?;

        Ok(())
    }

    /// Runs [`Processor::process`], logging and swallowing any error so a
    /// single malformed or unauthenticated message never takes down a
    /// listener.
    pub fn handle(&self, payload: &[u8], peer: SocketAddr) {
        if let Err(error) = self.process(payload, peer) {
            match &error {
                ProcessError::BadSignature => {
                    tracing::warn!(%peer, %error, "security alert")
                }
                _ => tracing::warn!(%peer, %error, "failed to process record"),
            }
        }
    }
}
