//! Table-driven tests for configuration loading and validation.

use std::time::Duration;

use shelter_import::job::RetryPolicy;
use shelter_import::{load_config, load_config_from_str};

struct ConfigTestCase {
    name: &'static str,
    config_json: &'static str,
    should_succeed: bool,
    /// Substring of the error message when loading fails.
    expected_error: Option<&'static str>,
}

const CONFIG_TESTS: &[ConfigTestCase] = &[
    ConfigTestCase {
        name: "valid_minimal",
        config_json: r#"{
            "version": "1.0",
            "storage": { "root": "/srv/objects", "public_base_url": "https://cdn.example.org" }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "valid_full",
        config_json: r#"{
            "version": "1.0",
            "database_path": "/var/lib/shelter/import.db",
            "storage": { "root": "/srv/objects", "public_base_url": "https://cdn.example.org" },
            "worker_count": 2,
            "limits": {
                "max_table_bytes": 2048,
                "max_proof_bytes": 4096,
                "max_photo_bytes": 4096,
                "max_failed_rows": 5,
                "max_error_samples": 3,
                "max_prevalidation_samples": 2
            },
            "retry": { "max_attempts": 2, "base_delay_ms": 250 }
        }"#,
        should_succeed: true,
        expected_error: None,
    },
    ConfigTestCase {
        name: "not_json",
        config_json: "version = 1.0",
        should_succeed: false,
        expected_error: Some("Failed to parse config JSON"),
    },
    ConfigTestCase {
        name: "missing_storage",
        config_json: r#"{ "version": "1.0" }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "unknown_top_level_field",
        config_json: r#"{
            "version": "1.0",
            "storage": { "root": "/srv/objects", "public_base_url": "https://cdn.example.org" },
            "input_directory": "/tmp"
        }"#,
        should_succeed: false,
        expected_error: Some("Schema validation failed"),
    },
    ConfigTestCase {
        name: "wrong_version",
        config_json: r#"{
            "version": "2.0",
            "storage": { "root": "/srv/objects", "public_base_url": "https://cdn.example.org" }
        }"#,
        should_succeed: false,
        expected_error: None,
    },
    ConfigTestCase {
        name: "zero_workers",
        config_json: r#"{
            "version": "1.0",
            "storage": { "root": "/srv/objects", "public_base_url": "https://cdn.example.org" },
            "worker_count": 0
        }"#,
        should_succeed: false,
        expected_error: None,
    },
    ConfigTestCase {
        name: "zero_photo_limit",
        config_json: r#"{
            "version": "1.0",
            "storage": { "root": "/srv/objects", "public_base_url": "https://cdn.example.org" },
            "limits": { "max_photo_bytes": 0 }
        }"#,
        should_succeed: false,
        expected_error: None,
    },
    ConfigTestCase {
        name: "blank_public_url",
        config_json: r#"{
            "version": "1.0",
            "storage": { "root": "/srv/objects", "public_base_url": "   " }
        }"#,
        should_succeed: false,
        expected_error: Some("storage.public_base_url must not be empty"),
    },
];

#[test]
fn test_json_config_loading() {
    for test_case in CONFIG_TESTS {
        let result = load_config_from_str(test_case.config_json);

        if test_case.should_succeed {
            assert!(
                result.is_ok(),
                "Test '{}': Expected success but got error: {:?}",
                test_case.name,
                result.err()
            );
        } else {
            assert!(
                result.is_err(),
                "Test '{}': Expected error but got success",
                test_case.name
            );

            if let Some(expected_error) = test_case.expected_error {
                let error_msg = result.err().unwrap().to_string();
                assert!(
                    error_msg.contains(expected_error),
                    "Test '{}': Expected error containing '{}', got '{}'",
                    test_case.name,
                    expected_error,
                    error_msg
                );
            }
        }
    }
}

#[test]
fn test_full_config_field_values() {
    let config = load_config_from_str(CONFIG_TESTS[1].config_json).unwrap();

    assert_eq!(config.worker_count, 2);
    assert_eq!(
        config.database_path.as_deref(),
        Some(std::path::Path::new("/var/lib/shelter/import.db"))
    );
    assert_eq!(config.limits.max_failed_rows, 5);
    assert_eq!(config.limits.max_error_samples, 3);

    let policy = RetryPolicy::from_config(&config.retry);
    assert_eq!(policy.delay_for(1), Duration::from_millis(250));
    assert_eq!(policy.delay_for(2), Duration::from_millis(500));
}

#[test]
fn test_defaults_applied() {
    let config = load_config_from_str(CONFIG_TESTS[0].config_json).unwrap();

    assert!(config.worker_count >= 1);
    assert!(config.database_path.is_none());
    assert_eq!(config.limits.max_failed_rows, 100);
    assert_eq!(config.limits.max_error_samples, 20);
    assert_eq!(config.limits.max_prevalidation_samples, 10);
    assert_eq!(config.retry.max_attempts, 4);
    assert_eq!(config.retry.base_delay(), Duration::from_secs(60));
}

#[test]
fn test_load_config_from_missing_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = load_config(dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("absent.json"));
}
