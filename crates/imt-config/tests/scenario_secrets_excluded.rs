//! Secret literals must never live in config files.

use imt_config::load_layered_yaml_from_strings;

fn assert_secret_rejected(docs: &[&str]) {
    let err = load_layered_yaml_from_strings(docs)
        .expect_err("config with a literal secret must be rejected")
        .to_string();
    assert!(
        err.contains("CONFIG_SECRET_DETECTED"),
        "error should contain CONFIG_SECRET_DETECTED, got: {err}"
    );
    assert!(err.contains("REDACTED"));
}

#[test]
fn literal_api_token_rejected() {
    assert_secret_rejected(&[r#"
api:
  token_env: "t.Qx7Zr0aLw9vYpKc3sNd2"
"#]);
}

#[test]
fn literal_database_url_rejected() {
    assert_secret_rejected(&[r#"
db:
  url_env: "postgres://user:pw@localhost/imt"
"#]);
}

#[test]
fn secret_in_overlay_rejected() {
    let base = r#"
api:
  token_env: "TINKOFF_TOKEN"
"#;
    let overlay = r#"
api:
  token_env: "t.sneaky-override-token"
"#;
    assert!(load_layered_yaml_from_strings(&[base]).is_ok());
    assert_secret_rejected(&[base, overlay]);
}

#[test]
fn env_var_names_accepted() {
    let loaded = load_layered_yaml_from_strings(&[r#"
api:
  token_env: "TINKOFF_TOKEN"
db:
  url_env: "IMT_DATABASE_URL"
"#])
    .unwrap();
    assert_eq!(
        loaded.config_json.pointer("/api/token_env").and_then(|v| v.as_str()),
        Some("TINKOFF_TOKEN")
    );
}
