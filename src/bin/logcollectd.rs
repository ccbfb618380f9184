//! Entry point: loads configuration, wires up the facility table, writer,
//! compressor, and processor, then runs the ingest server until signaled
//! to shut down.

use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use compress::{CompressConfig, Compressor};
use daemon::config::MainConfigGuard;
use daemon::server::ReloadConfig;
use daemon::{DaemonConfig, Processor, Server, Stats};
use facility::FacilityDB;
use scheduler::Scheduler;
use writer::{Writer, WriterConfig};

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = DaemonConfig::from_env()?;
    tracing::info!(log_dir = %config.log_dir.display(), work_dir = %config.work_dir.display(), "starting logcollectd");

    let facilities = facility::config::load_facilities(&config.facilities_conf)?;
    let facility_db = Arc::new(
        FacilityDB::new(facilities).ok_or("every app in the facility config must have a root section")?,
    );
    tracing::info!(count = facility_db.len(), "loaded facility configuration");

    let compress_config = CompressConfig {
        configured_format: config.compress_format,
        level: config.compress_level,
        compress_on_write: config.compress_on_write,
    };
    let resolved_format = compress_config.resolve()?;

    let compressor = if config.compress_on_write {
        None
    } else {
        let compressor = Arc::new(Compressor::spawn(resolved_format));
        for path in compress::recovery::find_uncompressed(&config.log_dir) {
            compressor.compress(path);
        }
        Some(compressor)
    };

    std::fs::create_dir_all(&config.work_dir)?;
    let scheduler = Arc::new(Mutex::new(Scheduler::open(config.work_dir.join("schedules"))?));

    let writer = Writer::new(
        WriterConfig {
            log_dir: config.log_dir.clone(),
            compress_on_write: config.compress_on_write,
            gzip_level: config.compress_level,
        },
        scheduler,
        compressor,
    );

    let processor = Arc::new(Processor::new(facility_db, writer));
    let stats = Arc::new(Stats::default());
    let shutdown = Arc::new(AtomicBool::new(false));
    let reload = Arc::new(AtomicBool::new(false));
    daemon::signals::install(&shutdown, &reload)?;

    let main_config = match &config.main_config {
        Some(path) => Some(MainConfigGuard::capture(path.clone())?),
        None => None,
    };

    let listen = config.listen_config()?;
    let mut server = Server::bind_with_reload(
        listen,
        processor,
        stats,
        shutdown,
        Some(ReloadConfig {
            facilities_conf: config.facilities_conf.clone(),
            main_config,
            reload,
        }),
    )?;

    server.run()?;

    tracing::info!("logcollectd shut down cleanly");
    Ok(())
}
