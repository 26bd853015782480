//! Cache manifest: digest to stored file table.
//!
//! The persisted form is a line-oriented text file:
//!
//! ```text
//! # c2md-manifest v1
//! 5D41402ABC4B2A76B9719D911017C592\t5\tattachments/hello.txt
//! ```
//!
//! Each line holds the digest, the byte length, and the stored path as it is
//! referenced from Markdown: relative to the store root, so it starts with
//! the attachment folder (`attachments/hello.txt`). New entries are appended
//! as soon as they are recorded. A line torn by a crash is dropped on load,
//! and an append never continues an unfinished line. Later lines override
//! earlier ones on load.
//!
//! The manifest is an optimization only. An unreadable or foreign file is
//! treated as an empty cache and replaced, never reported as an error.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::digest::DIGEST_LEN;

/// Default manifest file name inside the attachment directory.
pub const MANIFEST_FILENAME: &str = ".c2md-manifest";

/// First line of every manifest file.
const HEADER: &str = "# c2md-manifest v1";

/// A cached file known to the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Content length in bytes.
    pub len: u64,
    /// Stored path (`/`-separated, relative to the store root).
    pub path: String,
}

/// Digest to path table, loaded at startup and updated as files are written.
#[derive(Debug)]
pub struct CacheManifest {
    entries: HashMap<String, ManifestEntry>,
    /// Backing file; `None` when caching is disabled.
    file: Option<PathBuf>,
}

impl CacheManifest {
    /// Create a manifest that lives only for the current run.
    ///
    /// Identical content is still deduplicated within the run, but nothing
    /// is read from or written to disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            entries: HashMap::new(),
            file: None,
        }
    }

    /// Load a persisted manifest, creating it on first use.
    ///
    /// Missing files start empty. Unreadable files or files with an unknown
    /// header are logged and replaced by a fresh, empty manifest.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        let entries = match fs::read_to_string(path) {
            Ok(content) => match parse(&content) {
                Some(entries) => {
                    truncate_torn_line(path, &content);
                    tracing::debug!(
                        "loaded {} cache entries from {}",
                        entries.len(),
                        path.display()
                    );
                    entries
                }
                None => {
                    tracing::info!(
                        "cache manifest {} has an unknown format, starting empty",
                        path.display()
                    );
                    reset_file(path);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no cache manifest at {}, initializing", path.display());
                reset_file(path);
                HashMap::new()
            }
            Err(e) => {
                tracing::warn!(
                    "failed to read cache manifest {}: {e}, starting empty",
                    path.display()
                );
                reset_file(path);
                HashMap::new()
            }
        };

        Self {
            entries,
            file: Some(path.to_path_buf()),
        }
    }

    /// Whether entries are written to disk.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.file.is_some()
    }

    /// Look up a digest.
    #[must_use]
    pub fn lookup(&self, digest: &str) -> Option<&ManifestEntry> {
        self.entries.get(digest)
    }

    /// Number of known entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a stored file and append it to the backing file.
    ///
    /// Persistence failures are logged; the in-memory entry is kept. Paths
    /// containing tabs or line breaks cannot be represented in the file and
    /// are kept in memory only.
    pub fn record(&mut self, digest: &str, len: u64, path: &str) {
        if let Some(file) = &self.file {
            if path.contains(['\t', '\n', '\r']) {
                tracing::warn!("not persisting cache entry with unsupported path {path:?}");
            } else if let Err(e) = append_line(file, digest, len, path) {
                tracing::warn!("failed to update cache manifest {}: {e}", file.display());
            }
        }
        self.entries.insert(
            digest.to_owned(),
            ManifestEntry {
                len,
                path: path.to_owned(),
            },
        );
    }
}

/// Parse manifest content. Returns `None` if the header is missing or wrong.
/// A final line without its newline was torn by a crash and is ignored.
fn parse(content: &str) -> Option<HashMap<String, ManifestEntry>> {
    let mut lines = content[..complete_len(content)].lines();
    if lines.next()?.trim_end() != HEADER {
        return None;
    }

    let mut entries = HashMap::new();
    for (idx, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some((digest, entry)) => {
                entries.insert(digest, entry);
            }
            None => tracing::warn!("skipping malformed cache manifest line {}", idx + 2),
        }
    }
    Some(entries)
}

fn parse_line(line: &str) -> Option<(String, ManifestEntry)> {
    let mut parts = line.splitn(3, '\t');
    let digest = parts.next()?;
    let len = parts.next()?.parse().ok()?;
    let path = parts.next()?;

    if digest.len() != DIGEST_LEN || !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    if path.is_empty() || path.contains('\t') {
        return None;
    }

    Some((
        digest.to_ascii_uppercase(),
        ManifestEntry {
            len,
            path: path.to_owned(),
        },
    ))
}

fn append_line(file: &Path, digest: &str, len: u64, path: &str) -> io::Result<()> {
    let mut handle = OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(file)?;
    let mut line = format!("{digest}\t{len}\t{path}\n");
    if ends_mid_line(&mut handle)? {
        line.insert(0, '\n');
    }
    handle.write_all(line.as_bytes())
}

/// Length of `content` up to and including its last newline. Content
/// without any newline is returned whole.
fn complete_len(content: &str) -> usize {
    content.rfind('\n').map_or(content.len(), |end| end + 1)
}

/// Cut a torn last line off the backing file.
fn truncate_torn_line(path: &Path, content: &str) {
    let complete = complete_len(content);
    if complete == content.len() {
        return;
    }
    tracing::warn!(
        "dropping incomplete last line of cache manifest {}",
        path.display()
    );
    let result = OpenOptions::new()
        .write(true)
        .open(path)
        .and_then(|file| file.set_len(complete as u64));
    if let Err(e) = result {
        tracing::warn!("failed to truncate cache manifest {}: {e}", path.display());
    }
}

/// Whether a non-empty file lacks its final newline.
fn ends_mid_line(file: &mut fs::File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Replace the backing file with an empty manifest.
fn reset_file(path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        tracing::warn!("failed to create cache directory: {e}");
        return;
    }
    if let Err(e) = fs::write(path, format!("{HEADER}\n")) {
        tracing::warn!("failed to write cache manifest {}: {e}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::digest_bytes;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const HELLO: &str = "5D41402ABC4B2A76B9719D911017C592";
    const EMPTY: &str = "D41D8CD98F00B204E9800998ECF8427E";

    #[test]
    fn test_in_memory_never_touches_disk() {
        let mut manifest = CacheManifest::in_memory();
        assert!(!manifest.is_persistent());

        manifest.record(HELLO, 5, "attachments/hello.txt");
        assert_eq!(
            manifest.lookup(HELLO),
            Some(&ManifestEntry {
                len: 5,
                path: "attachments/hello.txt".to_owned()
            })
        );
    }

    #[test]
    fn test_load_creates_file_with_header() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("attachments").join(MANIFEST_FILENAME);

        let manifest = CacheManifest::load(&path);

        assert!(manifest.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "# c2md-manifest v1\n");
    }

    #[test]
    fn test_record_survives_reload() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);

        let mut manifest = CacheManifest::load(&path);
        manifest.record(HELLO, 5, "attachments/hello.txt");
        manifest.record(EMPTY, 0, "attachments/empty.bin");

        let reloaded = CacheManifest::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.lookup(HELLO).unwrap().path, "attachments/hello.txt");
        assert_eq!(reloaded.lookup(EMPTY).unwrap().len, 0);
    }

    #[test]
    fn test_later_lines_override_earlier() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        fs::write(
            &path,
            format!("{HEADER}\n{HELLO}\t5\tattachments/old.txt\n{HELLO}\t5\tattachments/new.txt\n"),
        )
        .unwrap();

        let manifest = CacheManifest::load(&path);
        assert_eq!(manifest.lookup(HELLO).unwrap().path, "attachments/new.txt");
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        fs::write(
            &path,
            format!(
                "{HEADER}\nnot-a-digest\t1\tx\n{HELLO}\tfive\tx\n{EMPTY}\t0\n{EMPTY}\t0\ta\tb\n\n{HELLO}\t5\tattachments/hello.txt\n"
            ),
        )
        .unwrap();

        let manifest = CacheManifest::load(&path);
        assert_eq!(manifest.len(), 1);
        assert!(manifest.lookup(HELLO).is_some());
    }

    #[test]
    fn test_torn_append_does_not_swallow_next_entry() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        let ccc = digest_bytes(b"ccc");

        let mut manifest = CacheManifest::load(&path);
        manifest.record(HELLO, 5, "attachments/a.txt");
        // Crash in the middle of the next append.
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        write!(file, "{EMPTY}\t0\tattach").unwrap();
        drop(file);

        let mut manifest = CacheManifest::load(&path);
        assert!(manifest.lookup(EMPTY).is_none());
        manifest.record(&ccc, 3, "attachments/c.txt");

        let reloaded = CacheManifest::load(&path);
        assert_eq!(reloaded.lookup(HELLO).unwrap().path, "attachments/a.txt");
        assert_eq!(reloaded.lookup(&ccc).unwrap().path, "attachments/c.txt");
        assert!(reloaded.lookup(EMPTY).is_none());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("{HEADER}\n{HELLO}\t5\tattachments/a.txt\n{ccc}\t3\tattachments/c.txt\n")
        );
    }

    #[test]
    fn test_append_terminates_unfinished_line() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        fs::write(&path, format!("{HEADER}\n{HELLO}\t5\tattach")).unwrap();

        append_line(&path, EMPTY, 0, "attachments/empty.bin").unwrap();

        let manifest = CacheManifest::load(&path);
        assert_eq!(manifest.lookup(EMPTY).unwrap().path, "attachments/empty.bin");
    }

    #[test]
    fn test_path_with_tab_not_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);

        let mut manifest = CacheManifest::load(&path);
        manifest.record(HELLO, 5, "attach\tments/hello.txt");

        assert!(manifest.lookup(HELLO).is_some());
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{HEADER}\n"));
        assert!(CacheManifest::load(&path).is_empty());
    }

    #[test]
    fn test_unknown_header_resets_manifest() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        fs::write(&path, format!("{HELLO}\t5\tattachments/hello.txt\n")).unwrap();

        let manifest = CacheManifest::load(&path);

        assert!(manifest.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), format!("{HEADER}\n"));
    }

    #[test]
    fn test_binary_garbage_treated_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        fs::write(&path, [0xFFu8, 0xFE, 0x00, 0x80]).unwrap();

        let manifest = CacheManifest::load(&path);
        assert!(manifest.is_empty());
    }

    #[test]
    fn test_lowercase_digest_normalized() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MANIFEST_FILENAME);
        fs::write(
            &path,
            format!("{HEADER}\n{}\t5\tattachments/hello.txt\n", HELLO.to_lowercase()),
        )
        .unwrap();

        let manifest = CacheManifest::load(&path);
        assert!(manifest.lookup(HELLO).is_some());
    }
}
