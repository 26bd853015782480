//! Content fingerprints.
//!
//! MD5 is used purely for change detection, never as a security boundary.

use std::io::{self, Read};

use md5::{Digest, Md5};

/// Length of a digest string (128-bit hash, two hex chars per byte).
pub const DIGEST_LEN: usize = 32;

/// Read buffer size used while hashing a stream.
const CHUNK_SIZE: usize = 8192;

/// Compute the digest of everything readable from `reader`.
///
/// The stream is consumed exactly once, in order, until EOF. The reader is
/// taken by value, so it is dropped (and any underlying handle closed) when
/// this function returns, on success and on error alike.
///
/// Returns the digest as uppercase hexadecimal without separators.
///
/// # Errors
///
/// Returns the underlying I/O error if the stream cannot be read.
pub fn digest_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Md5::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode_upper(hasher.finalize()))
}

/// Compute the digest of an in-memory buffer.
#[must_use]
pub fn digest_bytes(data: &[u8]) -> String {
    hex::encode_upper(Md5::digest(data))
}
