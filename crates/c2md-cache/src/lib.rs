//! Attachment cache for c2md.
//!
//! Downloaded attachments and rendered diagrams are written to a flat output
//! directory. Each file is fingerprinted with an MD5 digest so identical
//! content is written only once, no matter how many names it is requested
//! under. Three pieces form the API:
//!
//! - [`digest_reader`] / [`digest_bytes`]: content fingerprint (uppercase hex MD5)
//! - [`CacheManifest`]: digest to stored path table, optionally persisted
//! - [`AttachmentStore`]: writes attachments through the manifest
//!
//! # Example
//!
//! ```
//! use c2md_cache::{AttachmentStore, CacheManifest};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut store = AttachmentStore::new(dir.path(), "attachments", CacheManifest::in_memory());
//!
//! let first = store.store_bytes("logo.png", b"png-bytes").unwrap();
//! let second = store.store_bytes("copy-of-logo.png", b"png-bytes").unwrap();
//!
//! assert!(first.written);
//! assert!(!second.written);
//! assert_eq!(first.path, second.path);
//! ```

mod digest;
mod manifest;
mod store;

pub use digest::{DIGEST_LEN, digest_bytes, digest_reader};
pub use manifest::{CacheManifest, MANIFEST_FILENAME, ManifestEntry};
pub use store::{AttachmentStore, StoredAttachment};
