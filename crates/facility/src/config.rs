//! Loader for the INI-style facility configuration file.
//!
//! Sections are named `app_id` (a root facility) or `app_id:module.path`
//! (a child facility). Loading happens in two passes: every root section is
//! parsed first, then every child section, so a child can inherit `secret`,
//! `max_size`, `file_per_host`, and `flush_every` from its app's root.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::facility::{Facility, FacilityError, FacilitySpec};
use crate::module_id::ModuleId;

/// Errors loading or parsing the facility configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading facility config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("facility config line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("facility config section [{section}]: missing required key \"{key}\"")]
    MissingKey { section: String, key: String },
    #[error("facility config section [{section}]: key \"{key}\" is not a valid integer")]
    InvalidInt { section: String, key: String },
    #[error("facility config section [{section}]: key \"{key}\" is not a valid boolean")]
    InvalidBool { section: String, key: String },
    #[error(transparent)]
    Facility(#[from] FacilityError),
}

struct Section {
    name: String,
    entries: HashMap<String, String>,
}

fn parse_ini(text: &str) -> Result<Vec<Section>, ConfigError> {
    let mut sections: Vec<Section> = Vec::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        if line.is_empty() || line.starts_with(['#', ';']) {
            continue;
        }

        if let Some(stripped) = line.strip_prefix('[') {
            let name = stripped.strip_suffix(']').ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                message: "unterminated section header".to_string(),
            })?;
            sections.push(Section {
                name: name.trim().to_string(),
                entries: HashMap::new(),
            });
            continue;
        }

        let section = sections.last_mut().ok_or_else(|| ConfigError::Syntax {
            line: line_no,
            message: "key/value pair outside of any section".to_string(),
        })?;

        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Syntax {
            line: line_no,
            message: "expected \"key = value\"".to_string(),
        })?;
        section.entries.insert(key.trim().to_string(), value.trim().to_string());
    }

    Ok(sections)
}

fn get_string(section: &Section, key: &str) -> Option<String> {
    section.entries.get(key).cloned()
}

fn get_required_string(section: &Section, key: &str) -> Result<String, ConfigError> {
    get_string(section, key).ok_or_else(|| ConfigError::MissingKey {
        section: section.name.clone(),
        key: key.to_string(),
    })
}

fn get_int<T: std::str::FromStr>(section: &Section, key: &str) -> Result<Option<T>, ConfigError> {
    match section.entries.get(key) {
        None => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(|_| ConfigError::InvalidInt {
            section: section.name.clone(),
            key: key.to_string(),
        }),
    }
}

fn get_required_int<T: std::str::FromStr>(section: &Section, key: &str) -> Result<T, ConfigError> {
    let raw = get_required_string(section, key)?;
    raw.parse().map_err(|_| ConfigError::InvalidInt {
        section: section.name.clone(),
        key: key.to_string(),
    })
}

fn get_bool(section: &Section, key: &str, default: bool) -> Result<bool, ConfigError> {
    match section.entries.get(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                section: section.name.clone(),
                key: key.to_string(),
            }),
        },
    }
}

fn split_section_name(name: &str) -> (String, Option<String>) {
    match name.split_once(':') {
        Some((app_id, module)) => (app_id.to_string(), Some(module.to_string())),
        None => (name.to_string(), None),
    }
}

/// Parses the facility configuration text into a flat list of validated
/// [`Facility`] records, roots resolved before children.
pub fn parse_facilities(text: &str) -> Result<Vec<Facility>, ConfigError> {
    let sections = parse_ini(text)?;

    let mut roots: HashMap<String, Facility> = HashMap::new();
    let mut facilities = Vec::new();

    for section in &sections {
        let (app_id, module) = split_section_name(&section.name);
        if module.is_some() {
            continue;
        }
        let facility = build_facility(section, &app_id, "root", None)?;
        roots.insert(app_id, facility.clone());
        facilities.push(facility);
    }

    for section in &sections {
        let (app_id, module) = split_section_name(&section.name);
        let Some(module) = module else { continue };

        let root = roots.get(&app_id).ok_or_else(|| {
            ConfigError::Facility(FacilityError::MissingRoot(app_id.clone()))
        })?;
        let facility = build_facility(section, &app_id, &module, Some(root))?;
        facilities.push(facility);
    }

    Ok(facilities)
}

fn build_facility(
    section: &Section,
    app_id: &str,
    module: &str,
    root: Option<&Facility>,
) -> Result<Facility, ConfigError> {
    let rotate = get_required_string(section, "rotate")?;
    let backup_count: u32 = get_required_int(section, "backup_count")?;

    let secret = match get_string(section, "secret") {
        Some(s) => Some(s.into_bytes()),
        None => root.and_then(|r| r.secret.clone()),
    };
    let max_size: Option<u64> = match get_int(section, "max_size")? {
        Some(v) => Some(v),
        None => root.and_then(|r| r.max_size),
    };
    let file_per_host = match section.entries.get("file_per_host") {
        Some(_) => get_bool(section, "file_per_host", false)?,
        None => root.map(|r| r.file_per_host).unwrap_or(false),
    };
    let flush_every: u32 = match get_int(section, "flush_every")? {
        Some(v) => v,
        None => root.map(|r| r.flush_every).unwrap_or(1),
    };

    Facility::build(FacilitySpec {
        app_id: app_id.to_string(),
        mod_id: ModuleId::parse(module),
        rotate,
        backup_count,
        max_size,
        secret,
        flush_every,
        file_per_host,
    })
    .map_err(ConfigError::from)
}

/// Loads and parses the facility configuration file at `path`.
pub fn load_facilities(path: &Path) -> Result<Vec<Facility>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_facilities(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[app]
rotate = daily
backup_count = 5
secret = topsecret
flush_every = 10

[app:web]
rotate = hourly
backup_count = 3

[app:web.auth]
rotate = size
backup_count = 2
max_size = 1048576
secret = override
"#;

    #[test]
    fn parses_root_and_children() {
        let facilities = parse_facilities(SAMPLE).unwrap();
        assert_eq!(facilities.len(), 3);
    }

    #[test]
    fn child_inherits_secret_and_flush_every_when_unset() {
        let facilities = parse_facilities(SAMPLE).unwrap();
        let web = facilities.iter().find(|f| f.mod_str == "web").unwrap();
        assert_eq!(web.secret.as_deref(), Some(b"topsecret".as_slice()));
        assert_eq!(web.flush_every, 10);
    }

    #[test]
    fn child_overrides_inherited_secret() {
        let facilities = parse_facilities(SAMPLE).unwrap();
        let auth = facilities.iter().find(|f| f.mod_str == "web.auth").unwrap();
        assert_eq!(auth.secret.as_deref(), Some(b"override".as_slice()));
    }

    #[test]
    fn missing_root_is_an_error() {
        let text = "[app:web]\nrotate = daily\nbackup_count = 1\n";
        let err = parse_facilities(text).unwrap_err();
        assert!(matches!(err, ConfigError::Facility(FacilityError::MissingRoot(_))));
    }

    #[test]
    fn missing_required_key_is_reported() {
        let text = "[app]\nbackup_count = 1\n";
        let err = parse_facilities(text).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }

    #[test]
    fn malformed_section_header_is_reported() {
        let text = "[app\nrotate = daily\n";
        let err = parse_facilities(text).unwrap_err();
        assert!(matches!(err, ConfigError::Syntax { .. }));
    }
}
