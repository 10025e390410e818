use grouplock::config::Config;

#[test]
fn minimal_config_deserializes_with_defaults() {
    let toml = r#"
[enforcement]
operator_id = "100001"

[gateway]
port = 8080
"#;

    let parsed: Config = toml::from_str(toml).expect("minimal config should deserialize");

    assert_eq!(parsed.enforcement.operator_id, "100001");
    assert_eq!(parsed.gateway.port, 8080);
    assert_eq!(parsed.gateway.host, "0.0.0.0");
    assert!(parsed.gateway.enabled);
    assert_eq!(parsed.enforcement.title_revert_delay_secs, 47);
    assert_eq!(parsed.enforcement.nickname_change_limit, 50);
    assert_eq!(parsed.enforcement.nickname_cooldown_secs, 300);
    assert_eq!(parsed.enforcement.fast_band.min_ms, 5_000);
    assert_eq!(parsed.enforcement.slow_band.max_ms, 13_000);
    assert_eq!(parsed.session.credentials_path, "appstate.json");
    assert_eq!(parsed.session.policy_store_path, "groupData.json");
}

#[test]
fn delay_bands_round_trip_through_toml() {
    let toml = r#"
[enforcement]
fast_band = { min_ms = 100, max_ms = 200 }
slow_band = { min_ms = 300, max_ms = 400 }
"#;

    let parsed: Config = toml::from_str(toml).expect("bands should deserialize");
    let rendered = toml::to_string_pretty(&parsed).unwrap();
    let reparsed: Config = toml::from_str(&rendered).unwrap();

    assert_eq!(reparsed.enforcement.fast_band, parsed.enforcement.fast_band);
    assert_eq!(reparsed.enforcement.slow_band.min_ms, 300);
    parsed.validate().unwrap();
}
