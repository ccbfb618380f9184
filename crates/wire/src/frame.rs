//! 8-byte header + payload framing: `size: u32 BE`, `flags: u32 BE`, payload.

use std::io::{self, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Length of the fixed header in bytes.
pub const HEADER_SIZE: usize = 8;

/// Bit 0 of the flags word: payload is zlib-compressed JSON.
pub const FLAG_GZIP: u32 = 0x01;

/// Largest total frame (header + payload) the daemon will accept.
pub const MAX_MESSAGE_SIZE: usize = 8192;

/// Largest payload that still fits under [`MAX_MESSAGE_SIZE`].
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE - HEADER_SIZE;

/// Errors encoding a frame. Decoding never fails: a malformed or oversize
/// frame is reported through [`Decoded`] instead, so callers reading a
/// stream can drop the bad message without a disconnect-or-not decision.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload (or declared size) exceeds [`MAX_MESSAGE_SIZE`].
    #[error("frame of {0} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit")]
    TooLarge(usize),
    /// zlib compression failed.
    #[error("zlib compression failed: {0}")]
    Zlib(#[from] io::Error),
}

/// Outcome of attempting to decode one frame from the front of a buffer.
#[derive(Debug)]
pub enum Decoded {
    /// `buf` does not yet contain a complete, acceptably-sized frame.
    /// Either more bytes are needed, or the declared `size` pushes the
    /// frame's total length past [`MAX_MESSAGE_SIZE`] and it never will
    /// complete -- a caller can tell the two apart by comparing `buf.len()`
    /// against `MAX_MESSAGE_SIZE`: a legitimate frame always resolves
    /// within that many bytes, so a buffer that reaches it while still
    /// `Incomplete` holds an oversize or otherwise unparseable frame and
    /// should be discarded rather than grown further.
    Incomplete,
    /// A full frame was decoded. `payload` is the decompressed JSON bytes;
    /// `consumed` is how many bytes of `buf` the frame occupied.
    Frame { payload: Vec<u8>, consumed: usize },
    /// The header and full payload were present (within the size limit)
    /// but the payload failed to decompress. `consumed` is still how many
    /// bytes of `buf` the frame occupied, so the caller can skip past just
    /// this message and keep reading the same connection.
    Invalid { consumed: usize },
}

/// Encodes `payload` into a wire frame, optionally zlib-compressing it first.
///
/// Returns [`FrameError::TooLarge`] if the resulting frame would exceed
/// [`MAX_MESSAGE_SIZE`].
pub fn encode(payload: &[u8], gzip: bool) -> Result<Vec<u8>, FrameError> {
    let (flags, body) = if gzip {
        (FLAG_GZIP, compress(payload)?)
    } else {
        (0, payload.to_vec())
    };

    let total = HEADER_SIZE + body.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(FrameError::TooLarge(total));
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(&flags.to_be_bytes());
    out.extend_from_slice(&body);
    Ok(out)
}

/// Attempts to decode one frame from the front of `buf`.
///
/// An oversize declared `size` (one that would push the total frame past
/// [`MAX_MESSAGE_SIZE`]) parses to [`Decoded::Incomplete`], the same as a
/// frame that is merely still arriving -- it will simply never resolve to a
/// [`Decoded::Frame`], which is how a caller distinguishes the two (see
/// [`Decoded::Incomplete`]). A buffer holding at least `HEADER_SIZE + size`
/// bytes is considered parseable (the `>=` rule from the specification,
/// resolving an off-by-one ambiguity in the original implementation).
pub fn decode(buf: &[u8]) -> Decoded {
    if buf.len() < HEADER_SIZE {
        return Decoded::Incomplete;
    }

    let size = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
    let flags = u32::from_be_bytes(buf[4..8].try_into().unwrap());

    let total = HEADER_SIZE + size;
    if total > MAX_MESSAGE_SIZE {
        return Decoded::Incomplete;
    }

    if buf.len() < total {
        return Decoded::Incomplete;
    }

    let raw = &buf[HEADER_SIZE..total];
    let payload = if flags & FLAG_GZIP != 0 {
        match decompress(raw) {
            Ok(payload) => payload,
            Err(_) => return Decoded::Invalid { consumed: total },
        }
    } else {
        raw.to_vec()
    };

    Decoded::Frame {
        payload,
        consumed: total,
    }
}

fn compress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
