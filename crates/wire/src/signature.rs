//! HMAC-MD5 signing and verification over the fields `app_id, module, stamp,
//! nsecs, body`, concatenated with no separator.

use hmac::{Hmac, Mac};
use md5::Md5;

use crate::record::Record;

type HmacMd5 = Hmac<Md5>;

/// Builds the exact byte string the HMAC covers.
fn hashable(record: &Record) -> Vec<u8> {
    format!(
        "{}{}{}{}{}",
        record.app_id, record.module, record.stamp, record.nsecs, record.body
    )
    .into_bytes()
}

/// Computes the lowercase hex HMAC-MD5 of `record` under `secret`.
pub fn sign(secret: &[u8], record: &Record) -> String {
    let mut mac = <HmacMd5 as Mac>::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&hashable(record));
    hex_lower(&mac.finalize().into_bytes())
}

/// Verifies `record.signature` against `secret`. Returns `false` if the
/// field is absent or the digest does not match.
pub fn verify(secret: &[u8], record: &Record) -> bool {
    match &record.signature {
        Some(sig) => sig.eq_ignore_ascii_case(&sign(secret, record)),
        None => false,
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(body: &str) -> Record {
        Record {
            version: 1,
            app_id: "a".into(),
            module: "web".into(),
            stamp: 1358363502,
            nsecs: 0,
            hostname: "h1".into(),
            body: body.into(),
            signature: None,
        }
    }

    #[test]
    fn sign_then_verify_succeeds() {
        let mut record = sample("hi");
        let secret = b"k";
        record.signature = Some(sign(secret, &record));
        assert!(verify(secret, &record));
    }

    #[test]
    fn wrong_secret_fails_verification() {
        let mut record = sample("hi");
        record.signature = Some(sign(b"k", &record));
        assert!(!verify(b"k2", &record));
    }

    #[test]
    fn single_character_body_change_changes_digest() {
        let a = sign(b"k", &sample("hi"));
        let b = sign(b"k", &sample("hj"));
        assert_ne!(a, b);
    }

    #[test]
    fn missing_signature_never_verifies() {
        let record = sample("hi");
        assert!(!verify(b"k", &record));
    }

    #[test]
    fn digest_is_lowercase_hex_md5_length() {
        let sig = sign(b"k", &sample("hi"));
        assert_eq!(sig.len(), 32);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
