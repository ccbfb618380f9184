#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `writer` owns every rotating log file the daemon writes to, deriving
//! each file's path from a resolved [`facility::Facility`] and the
//! record's hostname, and rotating files that are due before each write.
//!
//! # Design
//!
//! - [`log_file`] implements a single file's open/write/rotate lifecycle.
//! - [`writer`] implements the `(facility, hostname) -> LogFile` map and
//!   the line-formatting and rotation-then-write sequence.
//!
//! # Invariants
//!
//! - A rotation always reopens the file at the original path before
//!   returning control to the caller, even if the rename itself failed --
//!   a write is never lost to a missing file handle.
//! - [`writer::Writer::write`] takes the already-resolved
//!   [`facility::Facility`] directly; it never re-resolves it from
//!   `(app_id, module)` the way a lookup-per-write design would, since the
//!   caller (the daemon's processing pipeline) has already done that
//!   lookup once.
//!
//! # Errors
//!
//! [`writer::WriterError`] wraps [`log_file::LogFileError`] for filesystem
//! and scheduler failures encountered while writing or rotating.

pub mod log_file;
pub mod writer;

pub use log_file::{LogFileError, RotateReason};
pub use writer::{Writer, WriterConfig, WriterError};
