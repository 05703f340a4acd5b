//! Unit tests for configuration resolution and validation.

use std::time::Duration;

use camino::Utf8PathBuf;
use rstest::rstest;
use stratus::config::{DEFAULT_NETWORK_IDS, EnvSnapshot};
use stratus::{ConfigError, DriverConfig, DriverOptions, Platform, RackspaceGateway};

fn ubuntu() -> Platform {
    Platform::new("ubuntu", "14.04")
}

fn creds_env() -> EnvSnapshot {
    EnvSnapshot::from_pairs(&[
        ("RACKSPACE_USERNAME", "maria"),
        ("RACKSPACE_API_KEY", "secret"),
    ])
}

fn resolve(options: DriverOptions, env: &EnvSnapshot) -> DriverConfig {
    DriverConfig::resolve(options, &ubuntu(), env)
        .unwrap_or_else(|err| panic!("resolve should succeed: {err}"))
}

#[test]
fn resolve_applies_documented_defaults() {
    let config = resolve(DriverOptions::default(), &EnvSnapshot::default());

    assert_eq!(config.version, "v2");
    assert_eq!(config.flavor_id, "performance1-1");
    assert_eq!(config.username, "root");
    assert_eq!(config.port, 22);
    assert_eq!(config.region, "dfw");
    assert_eq!(config.wait_timeout, Duration::from_secs(600));
    assert!(!config.skip_tcp_check);
    assert_eq!(config.skip_tcp_check_sleep, Duration::from_secs(120));
    assert_eq!(config.server_name, None);
    assert_eq!(config.networks, None);
    assert!(!config.network_attach_wait);
    assert!(!config.use_private_address);
}

#[test]
fn resolve_lets_every_override_win() {
    let options = DriverOptions {
        version: Some(String::from("v3")),
        flavor_id: Some(String::from("general1-2")),
        image_id: Some(String::from("custom-image")),
        server_name: Some(String::from("pinned-name")),
        username: Some(String::from("admin")),
        port: Some(2222),
        region: Some(String::from("ord")),
        wait_timeout: Some(42),
        skip_tcp_check: Some(true),
        skip_tcp_check_sleep: Some(7),
        network_attach_wait: Some(true),
        use_private_address: Some(true),
        ..DriverOptions::default()
    };
    let config = resolve(options, &EnvSnapshot::default());

    assert_eq!(config.version, "v3");
    assert_eq!(config.flavor_id, "general1-2");
    assert_eq!(config.image_id, "custom-image");
    assert_eq!(config.server_name.as_deref(), Some("pinned-name"));
    assert_eq!(config.username, "admin");
    assert_eq!(config.port, 2222);
    assert_eq!(config.region, "ord");
    assert_eq!(config.wait_timeout, Duration::from_secs(42));
    assert!(config.skip_tcp_check);
    assert_eq!(config.skip_tcp_check_sleep, Duration::from_secs(7));
    assert!(config.network_attach_wait);
    assert!(config.use_private_address);
}

#[test]
fn wait_timeout_default_propagates_to_the_gateway_client() {
    let config = resolve(DriverOptions::default(), &creds_env());
    let gateway = RackspaceGateway::new(config)
        .unwrap_or_else(|err| panic!("gateway construction should succeed: {err}"));
    assert_eq!(gateway.http_timeout(), Duration::from_secs(600));
}

#[test]
fn wait_timeout_override_propagates_to_the_gateway_client() {
    let options = DriverOptions {
        wait_timeout: Some(42),
        ..DriverOptions::default()
    };
    let config = resolve(options, &creds_env());
    let gateway = RackspaceGateway::new(config)
        .unwrap_or_else(|err| panic!("gateway construction should succeed: {err}"));
    assert_eq!(gateway.http_timeout(), Duration::from_secs(42));
}

#[test]
fn gateway_rejects_missing_credentials_before_any_network_call() {
    let config = resolve(DriverOptions::default(), &EnvSnapshot::default());
    let error = RackspaceGateway::new(config).expect_err("credentials are required");
    assert!(
        error.to_string().contains("RACKSPACE_USERNAME"),
        "error should name the env var: {error}"
    );
}

#[rstest]
#[case("ubuntu", "14.04", "28153eac-1bae-4039-8d9f-f8b513241efe")]
#[case("centos", "7.1", "3ab30cc6-c503-41d3-8a37-106fda7848a7")]
#[case("fedora", "99", "6b583a78-a4d7-4f83-ac5e-e13a69a8a9e1")]
fn resolve_maps_platforms_to_images(
    #[case] name: &str,
    #[case] version: &str,
    #[case] image_id: &str,
) {
    let platform = Platform::new(name, version);
    let config =
        DriverConfig::resolve(DriverOptions::default(), &platform, &EnvSnapshot::default())
            .unwrap_or_else(|err| panic!("resolve should succeed: {err}"));
    assert_eq!(config.image_id, image_id);
}

#[test]
fn resolve_fails_for_unmapped_platform() {
    let platform = Platform::new("arch", "2015.1");
    let error =
        DriverConfig::resolve(DriverOptions::default(), &platform, &EnvSnapshot::default())
            .expect_err("unmapped platform should fail");
    assert!(
        matches!(error, ConfigError::UnknownPlatform { ref platform } if platform == "arch-2015.1"),
        "unexpected error: {error}"
    );
}

#[test]
fn image_override_wins_even_for_unmapped_platform() {
    let platform = Platform::new("arch", "2015.1");
    let options = DriverOptions {
        image_id: Some(String::from("custom-image")),
        ..DriverOptions::default()
    };
    let config = DriverConfig::resolve(options, &platform, &EnvSnapshot::default())
        .unwrap_or_else(|err| panic!("override should bypass the mapping: {err}"));
    assert_eq!(config.image_id, "custom-image");
}

#[test]
fn credentials_come_from_the_primary_env_pair() {
    let config = resolve(DriverOptions::default(), &creds_env());
    assert_eq!(config.rackspace_username.as_deref(), Some("maria"));
    assert_eq!(config.rackspace_api_key.as_deref(), Some("secret"));
}

#[test]
fn credentials_fall_back_to_the_openstack_pair() {
    let env = EnvSnapshot::from_pairs(&[("OS_USERNAME", "osuser"), ("OS_PASSWORD", "ospass")]);
    let config = resolve(DriverOptions::default(), &env);
    assert_eq!(config.rackspace_username.as_deref(), Some("osuser"));
    assert_eq!(config.rackspace_api_key.as_deref(), Some("ospass"));
}

#[test]
fn primary_credentials_win_over_the_fallback_pair() {
    let env = EnvSnapshot::from_pairs(&[
        ("RACKSPACE_USERNAME", "maria"),
        ("RACKSPACE_API_KEY", "secret"),
        ("OS_USERNAME", "osuser"),
        ("OS_PASSWORD", "ospass"),
    ]);
    let config = resolve(DriverOptions::default(), &env);
    assert_eq!(config.rackspace_username.as_deref(), Some("maria"));
    assert_eq!(config.rackspace_api_key.as_deref(), Some("secret"));
}

#[test]
fn credential_options_win_over_the_environment() {
    let options = DriverOptions {
        rackspace_username: Some(String::from("explicit")),
        ..DriverOptions::default()
    };
    let config = resolve(options, &creds_env());
    assert_eq!(config.rackspace_username.as_deref(), Some("explicit"));
}

#[test]
fn networks_default_to_provider_choice() {
    let config = resolve(DriverOptions::default(), &EnvSnapshot::default());
    assert_eq!(config.networks, None);
}

#[test]
fn user_networks_are_prefixed_with_the_default_identifiers() {
    let options = DriverOptions {
        networks: Some(vec![String::from("abcdefg")]),
        ..DriverOptions::default()
    };
    let config = resolve(options, &EnvSnapshot::default());
    assert_eq!(
        config.networks,
        Some(vec![
            DEFAULT_NETWORK_IDS[0].to_owned(),
            DEFAULT_NETWORK_IDS[1].to_owned(),
            String::from("abcdefg"),
        ])
    );
}

#[test]
fn default_public_key_path_is_probed_under_home() {
    let home = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let ssh_dir = home.path().join(".ssh");
    std::fs::create_dir_all(&ssh_dir).unwrap_or_else(|err| panic!("mkdir: {err}"));
    std::fs::write(ssh_dir.join("id_rsa.pub"), b"ssh-rsa AAAA")
        .unwrap_or_else(|err| panic!("write key: {err}"));
    let home_str = home
        .path()
        .to_str()
        .unwrap_or_else(|| panic!("temp home should be utf8"));

    let env = EnvSnapshot::from_pairs(&[("HOME", home_str)]);
    let config = resolve(DriverOptions::default(), &env);

    let expected = Utf8PathBuf::from(home_str).join(".ssh").join("id_rsa.pub");
    assert_eq!(config.public_key_path, Some(expected));
}

#[test]
fn default_public_key_prefers_dsa_when_both_exist() {
    let home = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let ssh_dir = home.path().join(".ssh");
    std::fs::create_dir_all(&ssh_dir).unwrap_or_else(|err| panic!("mkdir: {err}"));
    std::fs::write(ssh_dir.join("id_dsa.pub"), b"ssh-dss AAAA")
        .unwrap_or_else(|err| panic!("write key: {err}"));
    std::fs::write(ssh_dir.join("id_rsa.pub"), b"ssh-rsa AAAA")
        .unwrap_or_else(|err| panic!("write key: {err}"));
    let home_str = home
        .path()
        .to_str()
        .unwrap_or_else(|| panic!("temp home should be utf8"));

    let env = EnvSnapshot::from_pairs(&[("HOME", home_str)]);
    let config = resolve(DriverOptions::default(), &env);

    let expected = Utf8PathBuf::from(home_str).join(".ssh").join("id_dsa.pub");
    assert_eq!(config.public_key_path, Some(expected));
}

#[test]
fn missing_key_files_leave_the_path_unset() {
    let home = tempfile::tempdir().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let home_str = home
        .path()
        .to_str()
        .unwrap_or_else(|| panic!("temp home should be utf8"));
    let env = EnvSnapshot::from_pairs(&[("HOME", home_str)]);
    let config = resolve(DriverOptions::default(), &env);
    assert_eq!(config.public_key_path, None);
}

#[test]
fn options_deserialize_from_harness_json() {
    let options: DriverOptions = serde_json::from_str(
        r#"{"flavor_id":"general1-2","networks":["n1"],"use_private_address":true}"#,
    )
    .unwrap_or_else(|err| panic!("deserialize: {err}"));

    assert_eq!(options.flavor_id.as_deref(), Some("general1-2"));
    assert_eq!(options.networks, Some(vec![String::from("n1")]));
    assert_eq!(options.use_private_address, Some(true));
}
