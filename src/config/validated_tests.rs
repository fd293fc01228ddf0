//! Tests for validated configuration.

use std::path::PathBuf;
use std::time::Duration;

use super::ConfigError;
use super::cli::Cli;
use super::defaults;
use super::toml::TomlConfig;
use super::validated::{ValidatedConfig, expand_tilde, write_default_config};
use crate::webhook::{Method, RequestFormat};

/// Helper to create CLI args from a slice
fn cli(args: &[&str]) -> Cli {
    let mut full_args = vec!["formhook"];
    full_args.extend(args);
    full_args.push("check");
    Cli::parse_from_iter(full_args)
}

/// Helper to parse TOML config
fn toml(content: &str) -> TomlConfig {
    TomlConfig::parse(content).unwrap()
}

fn validate(content: &str) -> Result<ValidatedConfig, ConfigError> {
    ValidatedConfig::from_raw(&cli(&[]), Some(&toml(content)))
}

mod defaults_and_precedence {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let config = ValidatedConfig::from_raw(&cli(&[]), None).unwrap();

        assert_eq!(config.settings.timeout, defaults::timeout());
        assert_eq!(config.settings.retention_per_id, defaults::RETENTION_PER_ID);
        assert_eq!(config.settings.ttl_days, defaults::TTL_DAYS);
        assert!(config.settings.allowlist.is_empty());
        assert_eq!(config.log_path, PathBuf::from(defaults::LOG_PATH));
        assert!(!config.fan_out);
        assert!(config.webhooks.is_empty());
    }

    #[test]
    fn toml_settings_are_used() {
        let config = validate(
            r#"
            [settings]
            timeout = 4
            retention_per_id = 5
            ttl_days = 0
            denylist = ["*.internal"]

            [log]
            path = "/tmp/formhook.json"

            [dispatch]
            fan_out = true
        "#,
        )
        .unwrap();

        assert_eq!(config.settings.timeout, Duration::from_secs(4));
        assert_eq!(config.settings.retention_per_id, 5);
        assert_eq!(config.settings.ttl_days, 0);
        assert_eq!(config.settings.denylist, vec!["*.internal"]);
        assert_eq!(config.log_path, PathBuf::from("/tmp/formhook.json"));
        assert!(config.fan_out);
    }

    #[test]
    fn cli_overrides_toml() {
        let toml = toml(
            r#"
            [settings]
            timeout = 4

            [log]
            path = "/tmp/from-file.json"
        "#,
        );
        let cli = cli(&["--timeout", "7", "--log-file", "/tmp/from-cli.json"]);

        let config = ValidatedConfig::from_raw(&cli, Some(&toml)).unwrap();

        assert_eq!(config.settings.timeout, Duration::from_secs(7));
        assert_eq!(config.log_path, PathBuf::from("/tmp/from-cli.json"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = ValidatedConfig::from_raw(&cli(&["--timeout", "0"]), None);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDuration {
                field: "timeout",
                ..
            })
        ));
    }

    #[test]
    fn oversized_timeout_is_rejected() {
        let result = validate("[settings]\ntimeout = 100000");
        assert!(matches!(result, Err(ConfigError::InvalidDuration { .. })));
    }

    #[test]
    fn display_summarizes_config() {
        let config = validate(
            r#"
            [[webhooks]]
            id = "a"
            url = "https://a.example.com"

            [[webhooks]]
            id = "b"
            url = "https://b.example.com"
            enabled = false
        "#,
        )
        .unwrap();

        let shown = config.to_string();
        assert!(shown.contains("webhooks: 1/2 enabled"));
        assert!(shown.contains("timeout: 10s"));
    }
}

mod webhooks {
    use super::*;

    #[test]
    fn minimal_webhook_gets_defaults() {
        let config = validate(
            r#"
            [[webhooks]]
            id = " crm "
            url = "https://crm.example.com/leads"
        "#,
        )
        .unwrap();

        let webhook = config.webhook("crm").unwrap();
        assert_eq!(webhook.name, "crm");
        assert!(webhook.enabled);
        assert_eq!(webhook.method, Method::Post);
        assert_eq!(webhook.request_format, RequestFormat::Form);
        assert!(webhook.trigger_when.is_on_submit());
        assert!(!webhook.consent_required);
    }

    #[test]
    fn full_webhook_is_converted() {
        let config = validate(
            r#"
            [[webhooks]]
            id = "crm"
            url = "https://crm.example.com/leads"
            method = "patch"
            request_format = "XML"
            trigger_when = "on_payment"
            headers = [{ key = " X-Source ", value = "site" }]
            body_mapping = [{ key = "lead[email]", value = "{{data.email}}" }]
        "#,
        )
        .unwrap();

        let webhook = &config.webhooks[0];
        assert_eq!(webhook.method, Method::Patch);
        assert_eq!(webhook.request_format, RequestFormat::Xml);
        assert_eq!(webhook.trigger_when.as_str(), "on_payment");
        assert_eq!(webhook.headers[0].key, "X-Source");
        assert_eq!(webhook.body_mapping[0].value, "{{data.email}}");
    }

    #[test]
    fn missing_id_names_position() {
        let result = validate(
            r#"
            [[webhooks]]
            id = "a"
            url = "https://a.example.com"

            [[webhooks]]
            url = "https://b.example.com"
        "#,
        );

        match result {
            Err(ConfigError::MissingRequired { webhook, field }) => {
                assert_eq!(webhook, "#2");
                assert_eq!(field, "id");
            }
            other => panic!("Expected MissingRequired, got {other:?}"),
        }
    }

    #[test]
    fn missing_url_is_rejected() {
        let result = validate("[[webhooks]]\nid = \"crm\"\nurl = \"  \"");
        assert!(matches!(
            result,
            Err(ConfigError::MissingRequired { field: "url", .. })
        ));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = validate(
            r#"
            [[webhooks]]
            id = "crm"
            url = "https://a.example.com"

            [[webhooks]]
            id = "crm"
            url = "https://b.example.com"
        "#,
        );

        assert!(matches!(result, Err(ConfigError::DuplicateId(id)) if id == "crm"));
    }

    #[test]
    fn non_http_url_is_rejected() {
        let result = validate("[[webhooks]]\nid = \"crm\"\nurl = \"ftp://example.com\"");
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn loopback_url_is_rejected() {
        let result = validate("[[webhooks]]\nid = \"crm\"\nurl = \"http://127.0.0.1:8080/\"");
        assert!(matches!(result, Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn unsupported_method_is_rejected() {
        let result = validate(
            "[[webhooks]]\nid = \"crm\"\nurl = \"https://example.com\"\nmethod = \"TRACE\"",
        );
        assert!(matches!(result, Err(ConfigError::InvalidMethod { .. })));
    }

    #[test]
    fn unknown_format_is_rejected() {
        let result = validate(
            "[[webhooks]]\nid = \"crm\"\nurl = \"https://example.com\"\nrequest_format = \"yaml\"",
        );
        assert!(matches!(result, Err(ConfigError::InvalidFormat { .. })));
    }

    #[test]
    fn empty_mapping_key_is_rejected() {
        let result = validate(
            r#"
            [[webhooks]]
            id = "crm"
            url = "https://example.com"
            body_mapping = [{ key = "email", value = "x" }, { key = " ", value = "y" }]
        "#,
        );

        assert!(matches!(
            result,
            Err(ConfigError::EmptyKey {
                section: "body_mapping",
                row: 2,
                ..
            })
        ));
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let result = validate(
            r#"
            [[webhooks]]
            id = "crm"
            url = "https://example.com"
            headers = [{ key = "Bad Header", value = "x" }]
        "#,
        );

        assert!(matches!(result, Err(ConfigError::InvalidHeaderName { .. })));
    }
}

mod patterns {
    use super::*;

    #[test]
    fn glob_patterns_are_accepted() {
        let config = validate(r#"[settings]
allowlist = ["*.example.com", "api?.partner.test"]"#)
        .unwrap();
        assert_eq!(config.settings.allowlist.len(), 2);
    }
}

mod paths {
    use super::*;

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };

        assert_eq!(expand_tilde("~/logs.json"), home.join("logs.json"));
        assert_eq!(expand_tilde("~"), home);
    }

    #[test]
    fn other_paths_are_unchanged() {
        assert_eq!(expand_tilde("/var/logs.json"), PathBuf::from("/var/logs.json"));
        assert_eq!(expand_tilde("~user/logs.json"), PathBuf::from("~user/logs.json"));
        assert_eq!(expand_tilde("logs~.json"), PathBuf::from("logs~.json"));
    }

    #[test]
    fn write_default_config_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formhook.toml");

        write_default_config(&path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(TomlConfig::parse(&written).is_ok());
    }

    #[test]
    fn write_default_config_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("formhook.toml");

        let result = write_default_config(&path);
        assert!(matches!(result, Err(ConfigError::FileWrite { .. })));
    }
}
