#![cfg(feature = "config")]

use callprof_extras::{ConfigError, Profiler, ProfilerConfig, ScanRules};
use callprof_core::{Eligibility, Operation};
use serial_test::serial;
use std::io::Write;

const VARS: &[&str] = &[
    "CALLPROF_ENABLED",
    "CALLPROF_BASE_PREFIX",
    "CALLPROF_EXCLUDED_PREFIXES",
    "CALLPROF_DISABLED_OWNERS",
    "CALLPROF_DISABLED_OPERATIONS",
    "CALLPROF_ENDPOINT_PATH",
    "CALLPROF_ENABLE_BASIC",
    "CALLPROF_USERNAME",
    "CALLPROF_PASSWORD",
    "CALLPROF_LATENCY_WINDOW",
    "CALLPROF_THREAD_NAME",
    "CALLPROF_SERVICE_NAME",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();

    let config = ProfilerConfig::from_env().unwrap();
    assert!(config.is_enabled());
    assert_eq!(config.endpoint(), "/profiler");
    assert!(!config.requires_auth());
    assert_eq!(config.service(), "app");
}

#[test]
#[serial]
fn test_from_env_values() {
    clear_env();
    std::env::set_var("CALLPROF_BASE_PREFIX", "shop::");
    std::env::set_var("CALLPROF_EXCLUDED_PREFIXES", "shop::internal, shop::debug");
    std::env::set_var("CALLPROF_DISABLED_OPERATIONS", "shop::Users::export");
    std::env::set_var("CALLPROF_ENDPOINT_PATH", "/admin/profiler");
    std::env::set_var("CALLPROF_ENABLE_BASIC", "true");
    std::env::set_var("CALLPROF_USERNAME", "ops");
    std::env::set_var("CALLPROF_PASSWORD", "s3cret");

    let config = ProfilerConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.endpoint(), "/admin/profiler");
    assert!(config.requires_auth());

    let rules = ScanRules::from_config(&config);
    assert!(rules.is_eligible(&Operation::new("/u", "shop::Users", "get")));
    assert!(!rules.is_eligible(&Operation::new("/u", "shop::Users", "export")));
    assert!(!rules.is_eligible(&Operation::new("/d", "shop::debug::Probe", "run")));
    assert!(!rules.is_eligible(&Operation::new("/b", "billing::Invoices", "get")));
}

#[test]
#[serial]
fn test_from_env_rejects_invalid() {
    clear_env();
    std::env::set_var("CALLPROF_LATENCY_WINDOW", "not-a-number");
    let parse = ProfilerConfig::from_env();
    assert!(matches!(parse, Err(ConfigError::Env(_))));

    std::env::set_var("CALLPROF_LATENCY_WINDOW", "0");
    let zero = ProfilerConfig::from_env();
    assert!(matches!(
        zero,
        Err(ConfigError::Invalid {
            field: "latency_window",
            ..
        })
    ));
    clear_env();
}

#[test]
#[serial]
fn test_from_dotenv_path() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "CALLPROF_SERVICE_NAME=orders").unwrap();
    writeln!(file, "CALLPROF_THREAD_NAME=orders-profiler").unwrap();
    writeln!(file, "CALLPROF_ENABLED=false").unwrap();

    let config = ProfilerConfig::from_dotenv_path(file.path()).unwrap();
    clear_env();

    assert_eq!(config.service(), "orders");
    assert!(!config.is_enabled());

    let profiler = Profiler::new(config).unwrap();
    let op = profiler.instrument(Operation::new("/o", "orders", "get"), |_: ()| ());
    assert!(!op.is_measured());
}
