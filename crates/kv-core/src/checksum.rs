//! Checksums of migration scripts, used to flag scripts edited after apply.

use sha2::{Digest, Sha256};

/// Hex SHA-256 of a script.
///
/// CRLF line endings are normalised to LF before hashing.
pub fn compute_checksum(script: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(script.replace("\r\n", "\n").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_hex_sha256() {
        let checksum = compute_checksum("CREATE TABLE t (id INT);");
        assert_eq!(checksum.len(), 64);
        assert!(checksum.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(
            compute_checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_checksum_changes_with_content() {
        assert_eq!(compute_checksum("SELECT 1"), compute_checksum("SELECT 1"));
        assert_ne!(compute_checksum("SELECT 1"), compute_checksum("SELECT 2"));
    }

    #[test]
    fn test_checksum_ignores_line_ending_style() {
        assert_eq!(
            compute_checksum("SELECT 1;\r\nSELECT 2;\r\n"),
            compute_checksum("SELECT 1;\nSELECT 2;\n")
        );
    }
}
