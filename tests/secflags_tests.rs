//! Tests for insecure option flags.
//!
//! Validates parsing, predicates, rendering, and the name-list
//! serialization.

use magikpod::secflags::PERMISSIBLE_OPTIONS;
use magikpod::{Error, SecFlags};

// =============================================================================
// Parsing Tests
// =============================================================================

#[test]
fn test_all_equals_union_of_options() {
    let union = ["image", "tls", "ondisk", "http", "pubkey"]
        .iter()
        .map(|o| SecFlags::parse(o).unwrap())
        .fold(SecFlags::NONE, |acc, f| acc | f);

    assert_eq!(SecFlags::parse("all").unwrap(), union);
    assert_eq!(SecFlags::parse("all").unwrap().bits(), union.bits());
}

#[test]
fn test_none_is_zero() {
    let flags = SecFlags::parse("none").unwrap();
    assert_eq!(flags.bits(), 0);
    assert!(!flags.skip_any_security_checks());
    assert!(!flags.skip_all_security_checks());
}

#[test]
fn test_unknown_option() {
    for input in ["bogus", "image,bogus", "image,,tls", "", "IMAGE"] {
        match SecFlags::parse(input) {
            Err(Error::UnknownOption { permissible, .. }) => {
                for option in PERMISSIBLE_OPTIONS {
                    assert!(permissible.contains(option));
                }
            }
            other => panic!("{:?} should be rejected, got {:?}", input, other),
        }
    }
}

#[test]
fn test_tokens_are_trimmed() {
    let flags: SecFlags = " image , http ".parse().unwrap();
    assert!(flags.skip_image_check());
    assert!(flags.allow_http());
    assert!(!flags.skip_tls_check());
}

// =============================================================================
// Predicate Tests
// =============================================================================

#[test]
fn test_individual_predicates() {
    let cases: [(&str, fn(&SecFlags) -> bool); 5] = [
        ("image", SecFlags::skip_image_check),
        ("tls", SecFlags::skip_tls_check),
        ("ondisk", SecFlags::skip_on_disk_check),
        ("http", SecFlags::allow_http),
        ("pubkey", SecFlags::consider_insecure_pub_keys),
    ];
    for (name, predicate) in cases {
        let flags = SecFlags::parse(name).unwrap();
        assert!(predicate(&flags), "{} sets its own predicate", name);
        assert!(flags.skip_any_security_checks());
        assert!(!flags.skip_all_security_checks());
        for (other, other_predicate) in cases {
            if other != name {
                assert!(!other_predicate(&flags), "{} does not set {}", name, other);
            }
        }
    }
}

#[test]
fn test_all_sets_everything() {
    let flags = SecFlags::ALL;
    assert!(flags.skip_all_security_checks());
    assert!(flags.skip_image_check());
    assert!(flags.consider_insecure_pub_keys());
}

// =============================================================================
// Rendering Tests
// =============================================================================

#[test]
fn test_render_is_declaration_ordered() {
    assert_eq!(SecFlags::parse("pubkey,image").unwrap().to_string(), "image,pubkey");
    assert_eq!(
        SecFlags::parse("all").unwrap().to_string(),
        "image,tls,ondisk,http,pubkey"
    );
    assert_eq!(SecFlags::NONE.to_string(), "none");
}

#[test]
fn test_render_reparses_to_same_flags() {
    for input in ["none", "tls", "http,ondisk", "all"] {
        let flags = SecFlags::parse(input).unwrap();
        assert_eq!(SecFlags::parse(&flags.to_string()).unwrap(), flags);
    }
}

#[test]
fn test_serde_uses_option_names() {
    let flags = SecFlags::parse("tls,image").unwrap();
    let json = serde_json::to_string(&flags).unwrap();
    assert_eq!(json, r#"["image","tls"]"#);

    let back: SecFlags = serde_json::from_str(&json).unwrap();
    assert_eq!(back, flags);
    assert_eq!(serde_json::from_str::<SecFlags>("[]").unwrap(), SecFlags::NONE);
    assert!(serde_json::from_str::<SecFlags>(r#"["warp"]"#).is_err());
}
