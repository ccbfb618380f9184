//! End-to-end: a framed record sent over a real UDP socket reaches disk
//! through the mio-driven server loop.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use daemon::server::ListenConfig;
use daemon::{Processor, Server};
use facility::{Facility, FacilityDB, FacilitySpec, ModuleId};
use scheduler::Scheduler;
use writer::{Writer, WriterConfig};

fn free_udp_addr() -> std::net::SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap()
}

#[test]
fn udp_datagram_is_classified_and_written() {
    let dir = tempfile::tempdir().unwrap();

    let facility = Facility::build(FacilitySpec {
        app_id: "app".to_string(),
        mod_id: ModuleId::root(),
        rotate: "daily".to_string(),
        backup_count: 3,
        max_size: None,
        secret: None,
        flush_every: 1,
        file_per_host: false,
    })
    .unwrap();
    let db = Arc::new(FacilityDB::new(vec![facility]).unwrap());

    let scheduler = Arc::new(Mutex::new(Scheduler::open(dir.path().join("schedules")).unwrap()));
    let writer = Writer::new(
        WriterConfig {
            log_dir: dir.path().to_path_buf(),
            compress_on_write: false,
            gzip_level: 6,
        },
        scheduler,
        None,
    );
    let processor = Arc::new(Processor::new(db, writer));
    let stats = Arc::new(daemon::Stats::default());
    let shutdown = Arc::new(AtomicBool::new(false));

    let udp_addr = free_udp_addr();
    let mut server = Server::bind(
        ListenConfig {
            udp: vec![udp_addr],
            tcp: vec![],
            tls: vec![],
            pemfile: None,
            cacert: None,
        },
        Arc::clone(&processor),
        Arc::clone(&stats),
        Arc::clone(&shutdown),
    )
    .unwrap();

    let server_thread = thread::spawn(move || server.run().unwrap());

    // Give the mio loop a moment to start polling before sending.
    thread::sleep(Duration::from_millis(50));

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    let payload = br#"{"version":1,"app_id":"app","module":"root","stamp":1,"nsecs":0,"hostname":"h1","body":"ping"}"#;
    let framed = wire::frame::encode(payload, false).unwrap();
    client.send_to(&framed, udp_addr).unwrap();

    let log_path = dir.path().join("app/root.log");
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !log_path.exists() && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }

    assert!(log_path.exists(), "expected the record to have been written to disk");
    let contents = std::fs::read_to_string(&log_path).unwrap();
    assert!(contents.ends_with("h1 - ping\n"));

    shutdown.store(true, Ordering::Relaxed);
    server_thread.join().unwrap();

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.messages_processed, 1);
}
