#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `facility` classifies a decoded record's `(app_id, module)` pair against
//! a configured [`Facility`], by longest-prefix match under the app's
//! module namespace. It also loads the INI-like `facilities.conf` format
//! described in the specification.
//!
//! # Design
//!
//! - [`module_id`] implements the canonical [`module_id::ModuleId`] tuple
//!   representation and its parse/pretty round trip.
//! - [`facility`] implements the [`facility::Facility`] record, its
//!   validation rules, and the cron-alias shorthand table.
//! - [`db`] implements [`db::FacilityDB`], an immutable-under-read-traffic
//!   map replaced wholesale on configuration reload.
//! - [`config`] implements the two-pass (roots, then children) config
//!   loader.
//!
//! # Invariants
//!
//! - For every `app_id` present in a loaded [`db::FacilityDB`], the
//!   `(app_id, ("root",))` entry exists.
//! - [`db::FacilityDB::get_facility`] either returns that root facility or,
//!   if the app is unknown, `None` -- it never panics and never falls off
//!   the end of the prefix walk.
//!
//! # Errors
//!
//! [`facility::FacilityError`] covers both in-memory validation failures and
//! config-file loading failures (bad cron expression, missing root for a
//! non-root app, non-positive `backup_count`/`max_size`/`flush_every`).
//!
//! # See also
//!
//! - `scheduler` for how a [`facility::RotateSpec::Cron`] expression is
//!   turned into a concrete next-fire time.
//! - `writer` for how a resolved [`facility::Facility`] maps to a file path.

pub mod config;
pub mod db;
pub mod facility;
pub mod module_id;

pub use db::FacilityDB;
pub use facility::{Facility, FacilityError, FacilitySpec, RotateSpec};
pub use module_id::ModuleId;
