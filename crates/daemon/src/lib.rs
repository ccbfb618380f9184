#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `daemon` is the top-level ingest subsystem: it accepts UDP datagrams,
//! plaintext TCP connections, and mutually-authenticated TLS connections,
//! reassembles the framed wire protocol from each, and runs every decoded
//! payload through [`processor::Processor`].
//!
//! # Design
//!
//! - [`addr`] parses the comma-separated listen-address configuration
//!   strings.
//! - [`tls`] builds the server's `rustls` configuration and performs the
//!   mutual-TLS handshake synchronously at accept time.
//! - [`processor`] implements the decode/classify/verify/dispatch
//!   pipeline.
//! - [`server`] drives the `mio` readiness loop for UDP and plaintext TCP,
//!   and a thread-per-connection model for TLS.
//! - [`stats`] exposes atomic counters of messages processed and errors.
//! - [`signals`] wires `SIGINT`/`SIGTERM` to the shutdown flag and `SIGHUP`
//!   to the reload flag.
//! - [`reload`] performs the SIGHUP reload sequence: re-read
//!   `facilities.conf`, swap the [`facility::FacilityDB`], close open log
//!   files, refusing if the main config file changed since startup.
//! - [`config`] resolves [`config::DaemonConfig`] from the environment.
//!
//! # Invariants
//!
//! - A TLS handshake failure or a malformed frame drops only that
//!   connection; it never brings down the event loop.
//! - [`server::Server::run`] always drains and closes every open
//!   connection before returning, even on an early error from `poll`.
//! - A reload that is refused or fails leaves the previous facility table
//!   and open log files untouched.
//!
//! # Errors
//!
//! [`server::ServerError`] covers socket binding and TLS configuration
//! failures at startup; [`processor::ProcessError`] covers per-message
//! pipeline failures, which are logged and swallowed rather than
//! propagated, matching the reference daemon's `on_message` behavior;
//! [`reload::ReloadError`] covers a refused or failed reload, which is
//! logged and swallowed the same way so a bad SIGHUP never stops the
//! daemon.

pub mod addr;
pub mod config;
pub mod processor;
pub mod reload;
pub mod server;
pub mod signals;
pub mod stats;
pub mod tls;

pub use config::DaemonConfig;
pub use processor::{ProcessError, Processor};
pub use reload::ReloadError;
pub use server::{Server, ServerError};
pub use stats::{Stats, StatsSnapshot};
