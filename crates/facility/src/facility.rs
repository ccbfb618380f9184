//! The `Facility` configuration record and its validation rules.

use std::str::FromStr;

use cron::Schedule;

use crate::module_id::ModuleId;

/// How a facility's log file is rotated.
#[derive(Debug, Clone)]
pub enum RotateSpec {
    /// Rotate purely by `max_size`; the cron schedule is never consulted.
    Size,
    /// Rotate on a cron schedule (and, if `max_size` is also set, whichever
    /// trigger fires first).
    Cron { expr: String, schedule: Schedule },
}

/// Errors building or validating a [`Facility`].
#[derive(Debug, thiserror::Error)]
pub enum FacilityError {
    #[error("app_id is required in the facility configuration")]
    EmptyAppId,
    #[error("facility {app_id}:{module}: rotation mode is \"size\" but no max_size is specified")]
    SizeRotateNeedsMaxSize { app_id: String, module: String },
    #[error("facility {app_id}:{module}: \"{rotate}\" is not a valid rotation mode")]
    InvalidRotate {
        app_id: String,
        module: String,
        rotate: String,
    },
    #[error("facility {app_id}:{module}: backup_count must be a positive integer")]
    InvalidBackupCount { app_id: String, module: String },
    #[error("facility {app_id}:{module}: if specified, max_size must be a positive integer")]
    InvalidMaxSize { app_id: String, module: String },
    #[error("facility {app_id}:{module}: if specified, flush_every must be a positive integer")]
    InvalidFlushEvery { app_id: String, module: String },
    #[error("application {0} lacks a root module; define a [{0}] section in the facility config")]
    MissingRoot(String),
}

/// Resolves the named rotation shorthand (`hourly`, `daily`, ...) to its
/// fixed cron expression, or returns the input unchanged if it is not a
/// recognized alias.
fn resolve_rotate_alias(rotate: &str) -> &str {
    match rotate {
        "hourly" => "0 0 * * * *",
        "daily" | "midnight" => "0 0 0 * * *",
        "weekly" => "0 0 0 * * Mon",
        "monthly" => "0 0 0 1 * *",
        "yearly" | "annually" => "0 0 0 1 1 *",
        other => other,
    }
}

/// A configuration record binding `(app_id, mod_id)` to a log file's
/// rotation, retention, and auth settings.
#[derive(Debug, Clone)]
pub struct Facility {
    pub app_id: String,
    pub mod_id: ModuleId,
    pub mod_str: String,
    pub rotate: RotateSpec,
    pub backup_count: u32,
    pub max_size: Option<u64>,
    pub secret: Option<Vec<u8>>,
    pub flush_every: u32,
    pub file_per_host: bool,
}

/// Inputs needed to build a [`Facility`]; unset optional fields are filled
/// in by the caller from the app's root facility before construction.
pub struct FacilitySpec {
    pub app_id: String,
    pub mod_id: ModuleId,
    pub rotate: String,
    pub backup_count: u32,
    pub max_size: Option<u64>,
    pub secret: Option<Vec<u8>>,
    pub flush_every: u32,
    pub file_per_host: bool,
}

impl Facility {
    /// Validates a [`FacilitySpec`] and builds the corresponding
    /// [`Facility`].
    pub fn build(spec: FacilitySpec) -> Result<Facility, FacilityError> {
        let mod_str = spec.mod_id.pretty();

        if spec.app_id.is_empty() {
            return Err(FacilityError::EmptyAppId);
        }

        let resolved = resolve_rotate_alias(spec.rotate.trim()).to_string();

        let rotate = if resolved == "size" {
            if spec.max_size.is_none() {
                return Err(FacilityError::SizeRotateNeedsMaxSize {
                    app_id: spec.app_id.clone(),
                    module: mod_str.clone(),
                });
            }
            RotateSpec::Size
        } else {
            let schedule = Schedule::from_str(&resolved).map_err(|_| FacilityError::InvalidRotate {
                app_id: spec.app_id.clone(),
                module: mod_str.clone(),
                rotate: spec.rotate.clone(),
            })?;
            RotateSpec::Cron {
                expr: resolved,
                schedule,
            }
        };

        if spec.backup_count == 0 {
            return Err(FacilityError::InvalidBackupCount {
                app_id: spec.app_id.clone(),
                module: mod_str.clone(),
            });
        }

        if matches!(spec.max_size, Some(0)) {
            return Err(FacilityError::InvalidMaxSize {
                app_id: spec.app_id.clone(),
                module: mod_str.clone(),
            });
        }

        if spec.flush_every == 0 {
            return Err(FacilityError::InvalidFlushEvery {
                app_id: spec.app_id.clone(),
                module: mod_str.clone(),
            });
        }

        Ok(Facility {
            app_id: spec.app_id,
            mod_id: spec.mod_id,
            mod_str,
            rotate,
            backup_count: spec.backup_count,
            max_size: spec.max_size,
            secret: spec.secret,
            flush_every: spec.flush_every,
            file_per_host: spec.file_per_host,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(app_id: &str, module: &str, rotate: &str, max_size: Option<u64>) -> FacilitySpec {
        FacilitySpec {
            app_id: app_id.to_string(),
            mod_id: ModuleId::parse(module),
            rotate: rotate.to_string(),
            backup_count: 2,
            max_size,
            secret: None,
            flush_every: 1,
            file_per_host: false,
        }
    }

    #[test]
    fn size_rotate_requires_max_size() {
        let err = Facility::build(spec("a", "root", "size", None)).unwrap_err();
        assert!(matches!(err, FacilityError::SizeRotateNeedsMaxSize { .. }));
    }

    #[test]
    fn size_rotate_with_max_size_succeeds() {
        let facility = Facility::build(spec("a", "root", "size", Some(1024))).unwrap();
        assert!(matches!(facility.rotate, RotateSpec::Size));
    }

    #[test]
    fn named_aliases_resolve_to_cron() {
        for alias in ["hourly", "daily", "midnight", "weekly", "monthly", "yearly", "annually"] {
            let facility = Facility::build(spec("a", "root", alias, None)).unwrap();
            assert!(matches!(facility.rotate, RotateSpec::Cron { .. }), "{alias} should resolve");
        }
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let err = Facility::build(spec("a", "root", "not a cron", None)).unwrap_err();
        assert!(matches!(err, FacilityError::InvalidRotate { .. }));
    }

    #[test]
    fn zero_backup_count_is_rejected() {
        let mut s = spec("a", "root", "hourly", None);
        s.backup_count = 0;
        assert!(matches!(Facility::build(s), Err(FacilityError::InvalidBackupCount { .. })));
    }

    #[test]
    fn empty_app_id_is_rejected() {
        let s = spec("", "root", "hourly", None);
        assert!(matches!(Facility::build(s), Err(FacilityError::EmptyAppId)));
    }
}
