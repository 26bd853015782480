//! Content-addressed diagram file names.

use sha2::{Digest, Sha256};

/// Number of hash bytes used in file names (12 hex characters).
const NAME_HASH_BYTES: usize = 6;

/// Identifies a rendered diagram by its prepared source.
///
/// Identical sources always map to the same file name, so a diagram that is
/// already attached to a page or stored locally is recognized by name.
#[derive(Debug, Clone, Copy)]
pub struct DiagramKey<'a> {
    /// Diagram source after preparation (includes resolved, DPI injected).
    pub source: &'a str,
}

impl<'a> DiagramKey<'a> {
    /// Create a key for a prepared source.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self { source }
    }

    /// File name for the rendered PNG: `diagram_{12 hex chars}.png`, taken
    /// from the SHA-256 of `"plantuml:png:{source}"`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let digest = self.digest();
        format!("diagram_{}.png", hex::encode(&digest[..NAME_HASH_BYTES]))
    }

    fn digest(&self) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(b"plantuml:png:");
        hasher.update(self.source.as_bytes());
        hasher.finalize().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_source_same_name() {
        let a = DiagramKey::new("@startuml\nA -> B\n@enduml");
        let b = DiagramKey::new("@startuml\nA -> B\n@enduml");
        let c = DiagramKey::new("@startuml\nC -> D\n@enduml");

        assert_eq!(a.file_name(), b.file_name());
        assert_ne!(a.file_name(), c.file_name());
    }

    #[test]
    fn test_file_name_format() {
        let name = DiagramKey::new("source").file_name();
        assert!(name.starts_with("diagram_"));
        assert!(name.ends_with(".png"));
        assert_eq!(name.len(), "diagram_".len() + 12 + ".png".len());
    }

    #[test]
    fn test_file_name_is_hash_prefix() {
        let hash = hex::encode(Sha256::digest(b"plantuml:png:source"));
        assert_eq!(
            DiagramKey::new("source").file_name(),
            format!("diagram_{}.png", &hash[..12])
        );
    }
}
