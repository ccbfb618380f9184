//! End-to-end: frame a signed record, decode it back, verify the signature.

use wire::{frame, parse_record, signature, Record};

fn signed_record(secret: &[u8]) -> Record {
    let mut record = Record {
        version: 1,
        app_id: "billing".into(),
        module: "web.auth".into(),
        stamp: 1_700_000_000,
        nsecs: 0,
        hostname: "host-1".into(),
        body: "user logged in".into(),
        signature: None,
    };
    record.signature = Some(signature::sign(secret, &record));
    record
}

#[test]
fn framed_and_signed_record_round_trips() {
    let secret = b"topsecret";
    let record = signed_record(secret);
    let payload = serde_json::to_vec(&record).unwrap();

    let framed = frame::encode(&payload, true).unwrap();
    let decoded = match frame::decode(&framed) {
        frame::Decoded::Frame { payload, consumed } => {
            assert_eq!(consumed, framed.len());
            payload
        }
        other => panic!("expected a complete frame, got {other:?}"),
    };

    let parsed = parse_record(&decoded).unwrap();
    assert_eq!(parsed, record);
    assert!(signature::verify(secret, &parsed));
    assert!(!signature::verify(b"wrong", &parsed));
}

#[test]
fn two_records_streamed_back_to_back() {
    let a = parse_record(
        br#"{"version":1,"app_id":"a","module":"x","stamp":1,"nsecs":1,"hostname":"h","body":"first"}"#,
    )
    .unwrap();
    let b = parse_record(
        br#"{"version":1,"app_id":"a","module":"x","stamp":2,"nsecs":2,"hostname":"h","body":"second"}"#,
    )
    .unwrap();

    let mut buf = frame::encode(&serde_json::to_vec(&a).unwrap(), false).unwrap();
    buf.extend(frame::encode(&serde_json::to_vec(&b).unwrap(), true).unwrap());

    let frame::Decoded::Frame { payload: p1, consumed } = frame::decode(&buf) else {
        panic!("expected first frame");
    };
    assert_eq!(parse_record(&p1).unwrap().body, "first");

    let frame::Decoded::Frame { payload: p2, .. } = frame::decode(&buf[consumed..]) else {
        panic!("expected second frame");
    };
    assert_eq!(parse_record(&p2).unwrap().body, "second");
}
