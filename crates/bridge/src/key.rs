use crate::IngestError;
use std::fmt;

/// Longest accepted filename, in bytes
pub const MAX_KEY_LEN: usize = 255;

/// A filename checked for use as an object-store key
///
/// The name is kept verbatim; it is never used as a local path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobKey(String);

impl BlobKey {
    pub fn parse(filename: &str) -> Result<Self, IngestError> {
        let reject = |reason| {
            Err(IngestError::InvalidFilename {
                filename: filename.to_string(),
                reason,
            })
        };

        if filename.trim().is_empty() {
            return reject("name is empty");
        }
        if filename == "." || filename == ".." {
            return reject("name is reserved");
        }
        if filename.contains(['/', '\\']) {
            return reject("name contains a path separator");
        }
        if filename.chars().any(char::is_control) {
            return reject("name contains control characters");
        }
        if filename.len() > MAX_KEY_LEN {
            return reject("name is longer than 255 bytes");
        }

        Ok(Self(filename.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(name: &str) -> &'static str {
        match BlobKey::parse(name) {
            Err(IngestError::InvalidFilename { reason, .. }) => reason,
            other => panic!("expected rejection for {name:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_names_accepted() {
        for name in ["data.csv", "Q3 report (final).csv", "über.csv", ".hidden.csv"] {
            let key = BlobKey::parse(name).expect("valid name");
            assert_eq!(key.as_str(), name);
            assert_eq!(key.to_string(), name);
        }
    }

    #[test]
    fn test_traversal_rejected() {
        assert_eq!(reason("../etc/passwd"), "name contains a path separator");
        assert_eq!(reason("dir/data.csv"), "name contains a path separator");
        assert_eq!(reason("C:\\Users\\me\\data.csv"), "name contains a path separator");
        assert_eq!(reason(".."), "name is reserved");
        assert_eq!(reason("."), "name is reserved");
    }

    #[test]
    fn test_control_and_empty_rejected() {
        assert_eq!(reason(""), "name is empty");
        assert_eq!(reason("   "), "name is empty");
        assert_eq!(reason("bad\0name.csv"), "name contains control characters");
        assert_eq!(reason("line\nbreak.csv"), "name contains control characters");
    }

    #[test]
    fn test_length_limit() {
        let ok = "a".repeat(MAX_KEY_LEN);
        assert!(BlobKey::parse(&ok).is_ok());
        let long = "a".repeat(MAX_KEY_LEN + 1);
        assert_eq!(reason(&long), "name is longer than 255 bytes");
    }
}
