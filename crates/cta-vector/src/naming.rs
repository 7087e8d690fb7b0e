//! Collection naming authority
//!
//! Derives globally-addressable, human-recognizable collection names from
//! study acronyms and recognizes them among arbitrary collection names. The
//! character classes are a compatibility contract: listing relies on the
//! pattern to avoid mis-classifying unrelated collections that share the
//! database.

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

lazy_static! {
    // One or more uppercase alphanumerics, dash, exactly 8 lowercase
    // alphanumerics.
    static ref PROTOCOL_COLLECTION: Regex =
        Regex::new(r"^[A-Z0-9]+-[a-z0-9]{8}$").expect("protocol collection pattern");
}

/// Generate a collection name for a protocol: the acronym stripped to
/// uppercase alphanumerics, a dash, and an 8-character random hex suffix
/// (e.g., `THAPCA-08ndfe3a`).
///
/// Uniqueness is probabilistic: the suffix is drawn from a v4 UUID and no
/// existence check is made against the database. The caller must supply an
/// acronym with at least one ASCII alphanumeric character or the result will
/// not satisfy [`is_protocol_collection`].
pub fn generate_collection_name(study_acronym: &str) -> String {
    let clean_acronym: String = study_acronym
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let suffix = Uuid::new_v4().simple().to_string();

    format!("{}-{}", clean_acronym, &suffix[..8])
}

/// Whether a collection name matches the protocol naming pattern.
pub fn is_protocol_collection(name: &str) -> bool {
    PROTOCOL_COLLECTION.is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_names_are_recognized() {
        for acronym in ["THAPCA", "foo", "Trial-01", "a b c", "X"] {
            let name = generate_collection_name(acronym);
            assert!(
                is_protocol_collection(&name),
                "generated name {name:?} for {acronym:?} not recognized"
            );
        }
    }

    #[test]
    fn test_acronym_is_cleaned_and_uppercased() {
        let name = generate_collection_name("tha-pca 2!");
        assert!(name.starts_with("THAPCA2-"), "got {name}");
    }

    #[test]
    fn test_suffix_is_eight_lowercase_hex_chars() {
        let name = generate_collection_name("FOO");
        let suffix = name.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_generated_names_differ() {
        assert_ne!(generate_collection_name("FOO"), generate_collection_name("FOO"));
    }

    #[test]
    fn test_rejects_wrong_shapes() {
        // Lowercase prefix
        assert!(!is_protocol_collection("abc-12345678"));
        // Suffix too short
        assert!(!is_protocol_collection("ABC-1234567"));
        // Suffix too long
        assert!(!is_protocol_collection("ABC-123456789"));
        // Underscore instead of dash
        assert!(!is_protocol_collection("ABC_12345678"));
        // No dash at all
        assert!(!is_protocol_collection("ABC12345678"));
        // Uppercase in suffix
        assert!(!is_protocol_collection("ABC-1234567A"));
        // Empty prefix
        assert!(!is_protocol_collection("-12345678"));
        // Unrelated collection
        assert!(!is_protocol_collection("unrelated_collection"));
    }

    #[test]
    fn test_accepts_valid_names() {
        assert!(is_protocol_collection("FOO-a1b2c3d4"));
        assert!(is_protocol_collection("BAR-11112222"));
        assert!(is_protocol_collection("THAPCA2-08ndfe3a"));
    }
}
