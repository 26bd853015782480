//! Attachment store backed by a [`CacheManifest`].

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::digest::{digest_bytes, digest_reader};
use crate::manifest::{CacheManifest, ManifestEntry};

/// Result of storing one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    /// Content digest.
    pub digest: String,
    /// Path to reference from Markdown (`/`-separated).
    pub path: String,
    /// Whether the bytes were written in this call.
    pub written: bool,
}

/// Writes attachments into a flat folder, at most once per content digest.
///
/// `root` is the directory Markdown paths are relative to; `folder` is the
/// attachment folder below it (or an absolute path). A file requested as
/// `logo.png` ends up at `{root}/{folder}/logo.png` and is referenced as
/// `{folder}/logo.png`.
#[derive(Debug)]
pub struct AttachmentStore {
    root: PathBuf,
    folder: PathBuf,
    manifest: CacheManifest,
}

impl AttachmentStore {
    /// Create a store writing below `root`/`folder`.
    pub fn new(root: impl Into<PathBuf>, folder: impl Into<PathBuf>, manifest: CacheManifest) -> Self {
        Self {
            root: root.into(),
            folder: folder.into(),
            manifest,
        }
    }

    /// Directory files are written to.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.folder)
    }

    /// The manifest backing this store.
    #[must_use]
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Read `reader` to the end and store its content under `name`.
    ///
    /// The stream is consumed once, digested while it is read, and dropped
    /// before returning.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the stream cannot be read or the file cannot
    /// be written.
    pub fn store<R: Read>(&mut self, name: &str, reader: R) -> io::Result<StoredAttachment> {
        let mut data = Vec::new();
        let digest = digest_reader(Tee {
            inner: reader,
            copy: &mut data,
        })?;
        self.store_digested(name, digest, &data)
    }

    /// Store an in-memory attachment under `name`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn store_bytes(&mut self, name: &str, data: &[u8]) -> io::Result<StoredAttachment> {
        self.store_digested(name, digest_bytes(data), data)
    }

    fn store_digested(
        &mut self,
        name: &str,
        digest: String,
        data: &[u8],
    ) -> io::Result<StoredAttachment> {
        let len = data.len() as u64;

        if let Some(entry) = self.manifest.lookup(&digest) {
            if self.is_reusable(entry, len) {
                tracing::debug!("cache hit for {name}: {}", entry.path);
                return Ok(StoredAttachment {
                    path: entry.path.clone(),
                    digest,
                    written: false,
                });
            }
            if entry.len != len {
                tracing::warn!(
                    "digest {digest} already maps to {} with a different length, storing {name} again",
                    entry.path
                );
            }
        }

        let dir = self.dir();
        fs::create_dir_all(&dir)?;

        // A file left by an earlier run without a manifest is adopted when
        // its content matches; otherwise the digest-named slot is used.
        let sanitized = sanitize_file_name(name);
        let file_name = match on_disk(&dir.join(&sanitized), len, &digest)? {
            OnDisk::Same => return Ok(self.adopt(&sanitized, digest, len)),
            OnDisk::Missing => sanitized,
            OnDisk::Different => {
                let by_digest = digest_file_name(&sanitized, &digest);
                if on_disk(&dir.join(&by_digest), len, &digest)? == OnDisk::Same {
                    return Ok(self.adopt(&by_digest, digest, len));
                }
                by_digest
            }
        };
        fs::write(dir.join(&file_name), data)?;

        let path = self.markdown_path(&file_name);
        tracing::info!("stored attachment {path} ({len} bytes)");
        self.manifest.record(&digest, len, &path);

        Ok(StoredAttachment {
            digest,
            path,
            written: true,
        })
    }

    /// Record an existing file that already holds the content.
    fn adopt(&mut self, file_name: &str, digest: String, len: u64) -> StoredAttachment {
        let path = self.markdown_path(file_name);
        tracing::debug!("{path} already holds {digest}, not writing it again");
        self.manifest.record(&digest, len, &path);
        StoredAttachment {
            digest,
            path,
            written: false,
        }
    }

    /// An entry is reusable if its length matches and the file still exists.
    fn is_reusable(&self, entry: &ManifestEntry, len: u64) -> bool {
        if entry.len != len {
            return false;
        }
        let on_disk = self.root.join(Path::new(&entry.path));
        fs::metadata(on_disk).is_ok_and(|m| m.len() == len)
    }

    fn markdown_path(&self, file_name: &str) -> String {
        let joined = self.folder.join(file_name);
        joined
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
            .replace("//", "/")
    }
}

/// What occupies a candidate file name.
#[derive(Debug, PartialEq, Eq)]
enum OnDisk {
    Missing,
    Same,
    Different,
}

/// Compare the file at `path` with content of `len` bytes and `digest`.
fn on_disk(path: &Path, len: u64, digest: &str) -> io::Result<OnDisk> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(OnDisk::Missing),
        Err(e) => return Err(e),
    };
    let meta = file.metadata()?;
    if !meta.is_file() || meta.len() != len {
        return Ok(OnDisk::Different);
    }
    if digest_reader(file)? == digest {
        Ok(OnDisk::Same)
    } else {
        Ok(OnDisk::Different)
    }
}

/// `{DIGEST}.{ext}`, used when the original name holds other content.
fn digest_file_name(sanitized: &str, digest: &str) -> String {
    match Path::new(sanitized).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{digest}.{ext}"),
        None => digest.to_owned(),
    }
}

/// Copies everything read from `inner` into `copy`.
struct Tee<'a, R> {
    inner: R,
    copy: &'a mut Vec<u8>,
}

impl<R: Read> Read for Tee<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.copy.extend_from_slice(&buf[..n]);
        Ok(n)
    }
}

/// Keep only the final path component and replace characters that are
/// awkward in Markdown links or file systems.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| match c {
            ' ' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '(' | ')' | '[' | ']' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "attachment".to_owned()
    } else {
        trimmed.to_owned()
    }
}
