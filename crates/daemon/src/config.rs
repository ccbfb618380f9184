//! Runtime configuration, read from environment variables.
//!
//! A full command-line frontend is outside this daemon's scope (it is
//! meant to be launched by a supervisor with an already-prepared
//! environment), so configuration is sourced from `LOGCOLLECTD_*`
//! variables with sane defaults, mirroring the reference daemon's
//! `groper`-based option definitions (`define_opt(section, key, default=...)`).

use std::path::{Path, PathBuf};

use compress::CompressFormat;
use md5::{Digest, Md5};

use crate::addr::{parse_addrs, AddrError};

/// Errors building a [`DaemonConfig`] from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be a valid integer")]
    InvalidInt(&'static str),
    #[error("{0} must be one of gzip, bzip2, xz")]
    InvalidCompressFormat(&'static str),
    #[error(transparent)]
    Addr(#[from] AddrError),
}

/// The checksum of the main configuration file captured at startup, so a
/// SIGHUP reload can detect whether it changed underneath the running
/// process and refuse to reload online if so (`spec.md` §5 "Reload").
///
/// Unlike `facilities.conf`, this daemon has no on-disk main config file by
/// default -- its settings come from the environment (see
/// [`DaemonConfig::from_env`]) -- so this guard is only built when
/// `LOGCOLLECTD_CONFIG` names one. Without it, reload always proceeds: there
/// is nothing to have changed underneath the process.
#[derive(Debug, Clone)]
pub struct MainConfigGuard {
    path: PathBuf,
    checksum: [u8; 16],
}

impl MainConfigGuard {
    /// Reads `path` and records its MD5 checksum, matching the reference
    /// daemon's `get_file_md5`.
    pub fn capture(path: PathBuf) -> std::io::Result<MainConfigGuard> {
        let checksum = checksum_file(&path)?;
        Ok(MainConfigGuard { path, checksum })
    }

    /// Returns `true` if `path` still hashes to the checksum captured at
    /// startup.
    pub fn unchanged(&self) -> std::io::Result<bool> {
        Ok(checksum_file(&self.path)? == self.checksum)
    }
}

fn checksum_file(path: &Path) -> std::io::Result<[u8; 16]> {
    let bytes = std::fs::read(path)?;
    Ok(Md5::digest(bytes).into())
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub work_dir: PathBuf,
    pub log_dir: PathBuf,
    pub facilities_conf: PathBuf,
    pub main_config: Option<PathBuf>,

    pub listen_ipv4: String,
    pub listen_ipv6: String,
    pub default_port: u16,

    pub listen_ipv4_tls: String,
    pub listen_ipv6_tls: String,
    pub default_port_tls: u16,
    pub pemfile: Option<PathBuf>,
    pub cacert: Option<PathBuf>,

    pub compress_format: CompressFormat,
    pub compress_level: u32,
    pub compress_on_write: bool,
}

impl Default for DaemonConfig {
    fn default() -> DaemonConfig {
        DaemonConfig {
            work_dir: PathBuf::from("/var/lib/logcollectd"),
            log_dir: PathBuf::from("/var/log/logcollectd"),
            facilities_conf: PathBuf::from("/etc/logcollectd/facilities.conf"),
            main_config: None,
            listen_ipv4: "127.0.0.1".to_string(),
            listen_ipv6: "[::1]".to_string(),
            default_port: 5566,
            listen_ipv4_tls: String::new(),
            listen_ipv6_tls: String::new(),
            default_port_tls: 5577,
            pemfile: None,
            cacert: None,
            compress_format: CompressFormat::Xz,
            compress_level: 6,
            compress_on_write: false,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

fn env_int<T: std::str::FromStr>(key: &str, default: T, err_name: &'static str) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidInt(err_name)),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => matches!(raw.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl DaemonConfig {
    /// Builds configuration from `LOGCOLLECTD_*` environment variables,
    /// falling back to [`DaemonConfig::default`] for anything unset.
    pub fn from_env() -> Result<DaemonConfig, ConfigError> {
        let default = DaemonConfig::default();

        let compress_format = match std::env::var("LOGCOLLECTD_COMPRESS_FORMAT") {
            Ok(raw) => CompressFormat::parse(&raw).ok_or(ConfigError::InvalidCompressFormat("LOGCOLLECTD_COMPRESS_FORMAT"))?,
            Err(_) => default.compress_format,
        };

        Ok(DaemonConfig {
            work_dir: env_opt_path("LOGCOLLECTD_WORK_DIR").unwrap_or(default.work_dir),
            log_dir: env_opt_path("LOGCOLLECTD_LOG_DIR").unwrap_or(default.log_dir),
            facilities_conf: env_opt_path("LOGCOLLECTD_FACILITIES_CONF").unwrap_or(default.facilities_conf),
            main_config: env_opt_path("LOGCOLLECTD_CONFIG"),
            listen_ipv4: env_string("LOGCOLLECTD_LISTEN_IPV4", &default.listen_ipv4),
            listen_ipv6: env_string("LOGCOLLECTD_LISTEN_IPV6", &default.listen_ipv6),
            default_port: env_int("LOGCOLLECTD_DEFAULT_PORT", default.default_port, "LOGCOLLECTD_DEFAULT_PORT")?,
            listen_ipv4_tls: env_string("LOGCOLLECTD_LISTEN_IPV4_TLS", &default.listen_ipv4_tls),
            listen_ipv6_tls: env_string("LOGCOLLECTD_LISTEN_IPV6_TLS", &default.listen_ipv6_tls),
            default_port_tls: env_int("LOGCOLLECTD_DEFAULT_PORT_TLS", default.default_port_tls, "LOGCOLLECTD_DEFAULT_PORT_TLS")?,
            pemfile: env_opt_path("LOGCOLLECTD_PEMFILE"),
            cacert: env_opt_path("LOGCOLLECTD_CACERT"),
            compress_format,
            compress_level: env_int("LOGCOLLECTD_COMPRESS_LEVEL", default.compress_level, "LOGCOLLECTD_COMPRESS_LEVEL")?,
            compress_on_write: env_bool("LOGCOLLECTD_COMPRESS_ON_WRITE", default.compress_on_write),
        })
    }

    /// Resolves every configured address list into concrete socket
    /// addresses, ready to pass to [`crate::server::ListenConfig`].
    pub fn listen_config(&self) -> Result<crate::server::ListenConfig, ConfigError> {
        let udp = {
            let mut addrs = parse_addrs(&self.listen_ipv4, self.default_port)?;
            addrs.extend(parse_addrs(&self.listen_ipv6, self.default_port)?);
            addrs
        };
        let tcp = udp.clone();
        let tls = {
            let mut addrs = parse_addrs(&self.listen_ipv4_tls, self.default_port_tls)?;
            addrs.extend(parse_addrs(&self.listen_ipv6_tls, self.default_port_tls)?);
            addrs
        };

        Ok(crate::server::ListenConfig {
            udp,
            tcp,
            tls,
            pemfile: self.pemfile.clone(),
            cacert: self.cacert.clone(),
        })
    }
}
