//! Config hash stability.
//!
//! GREEN when:
//! - the same inputs always produce the same hash,
//! - key order inside a document does not affect the hash,
//! - an overlay changes both the effective value and the hash.

use imt_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
api:
  base_url: "https://invest-public-api.tbank.ru/rest/"
  timeout_secs: 30
  token_env: "TINKOFF_TOKEN"
cache:
  store_read_limit: 5000
  retry_backoff_secs: 30
"#;

const BASE_YAML_REORDERED: &str = r#"
cache:
  retry_backoff_secs: 30
  store_read_limit: 5000
api:
  token_env: "TINKOFF_TOKEN"
  timeout_secs: 30
  base_url: "https://invest-public-api.tbank.ru/rest/"
"#;

const OVERLAY_YAML: &str = r#"
api:
  timeout_secs: 5
cache:
  retry_backoff_secs: 0
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "reordering keys in YAML must not change the hash"
    );
}

#[test]
fn overlay_changes_value_and_hash() {
    let base = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let merged = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(base.config_hash, merged.config_hash);

    let s = merged.settings().unwrap();
    assert_eq!(s.api.timeout_secs, 5);
    assert_eq!(s.api.token_env, "TINKOFF_TOKEN", "sibling keys survive the overlay");
    assert_eq!(s.cache.retry_backoff(), None);
    assert_eq!(s.cache.store_read_limit, 5000);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn shipped_base_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../config/base.yaml");
    let loaded = imt_config::load_layered_yaml(&[path]).unwrap();
    let s = loaded.settings().unwrap();
    assert_eq!(s, imt_config::AppConfig::default());
}
