#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `wire` implements the on-the-wire framing and record schema shared by the
//! UDP, TCP, and TLS front ends of the log-collection daemon. It has no
//! knowledge of sockets: callers hand it byte slices pulled off a datagram or
//! a stream reassembly buffer and get back decoded [`record::Record`]
//! values, or push records through [`frame::encode`] to produce bytes for a
//! test client.
//!
//! # Design
//!
//! - [`frame`] implements the 8-byte header + payload framing, including the
//!   optional zlib (`GZIP` flag) payload compression.
//! - [`record`] implements the JSON record schema: required fields, optional
//!   `signature`, and tolerant decoding of unknown extra fields.
//! - [`signature`] implements the HMAC-MD5 contract used to authenticate
//!   records against a per-facility shared secret.
//!
//! # Invariants
//!
//! - [`frame::encode`] followed by [`frame::decode`] round-trips any payload
//!   up to [`frame::MAX_PAYLOAD_SIZE`] bytes, for either flag state.
//! - [`frame::decode`] never panics or errors on truncated, oversize, or
//!   otherwise garbage input; it reports [`frame::Decoded::Incomplete`] or
//!   [`frame::Decoded::Invalid`] instead, so a caller reading a stream can
//!   always skip the bad bytes and keep the connection open.
//!
//! # Errors
//!
//! [`record::RecordError`] distinguishes a JSON syntax error from a missing
//! required field, since the daemon logs these at different specificity.
//!
//! # See also
//!
//! - `facility` for resolving a decoded record's `(app_id, module)` to a
//!   [`Facility`](../facility/struct.Facility.html).
//! - `daemon` for the event loop that turns socket bytes into calls into
//!   this crate.

pub mod frame;
pub mod record;
pub mod signature;

pub use record::{parse_record, Record, RecordError};
