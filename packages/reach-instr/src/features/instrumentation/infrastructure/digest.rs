use sha1::{Digest, Sha1};

/// Upper-case hex SHA-1 of an archive's bytes, the form library digests are matched in
pub fn archive_digest(bytes: &[u8]) -> String {
    Sha1::digest(bytes)
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            archive_digest(b"abc"),
            "A9993E364706816ABA3E25717850C26C9CD0D89D"
        );
    }

    #[test]
    fn test_empty_archive_digest() {
        assert_eq!(
            archive_digest(b""),
            "DA39A3EE5E6B4B0D3255BFEF95601890AFD80709"
        );
    }
}
