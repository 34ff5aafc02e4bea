//! Stable item ids for app records.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha1::{Digest, Sha1};

/// Encode an application origin into a fixed-length, URL-safe id.
///
/// The id is the unpadded URL-safe base64 form of the SHA-1 digest of the
/// origin's UTF-8 bytes, so it depends on nothing but the origin.
pub fn origin_to_id(origin: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha1::digest(origin.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_origins() {
        assert_eq!(
            origin_to_id("https://example.com"),
            "Mnw_2ofOKGhIpXSYLd0LfHSH-BY"
        );
        assert_eq!(origin_to_id("https://evil.com"), "qz62OSB6UbuhVE_AFM8XvdHR61Y");
        assert_eq!(origin_to_id(""), "2jmj7l5rSw0yVb_vlWAYkK_YBwk");
    }

    #[test]
    fn test_unicode_origin_is_utf8_encoded() {
        let id = origin_to_id("https://\u{2603}.com");
        assert_eq!(id, "aKp5gFcbc6lwnZx-wi8Y55XDnHo");
        assert!(id.is_ascii());
    }

    #[test]
    fn test_id_is_deterministic_and_unpadded() {
        let first = origin_to_id("https://marketplace.mozilla.org");
        let second = origin_to_id("https://marketplace.mozilla.org");
        assert_eq!(first, second);
        assert_eq!(first.len(), 27);
        assert!(!first.contains('='));
        assert!(!first.contains('+') && !first.contains('/'));
    }
}
