//! Environment overrides on top of the TOML file.
//!
//! Kept in its own test binary: environment variables are process-wide.

use daq_bridge::config::BridgeConfig;
use std::io::Write;

#[test]
fn test_env_overrides_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [scheduler]
        interval_ms = 20

        [channels]
        host = "127.0.0.1"
        ports = [5001, 5002, 5003]
        "#
    )
    .unwrap();

    std::env::set_var("DAQ_BRIDGE_SCHEDULER__INTERVAL_MS", "50");
    std::env::set_var("DAQ_BRIDGE_CONTROL__ENABLED", "false");
    let config = BridgeConfig::load_from(file.path());
    std::env::remove_var("DAQ_BRIDGE_SCHEDULER__INTERVAL_MS");
    std::env::remove_var("DAQ_BRIDGE_CONTROL__ENABLED");

    let config = config.unwrap();
    assert_eq!(config.scheduler.interval_ms, 50);
    assert!(!config.control.enabled);
    assert_eq!(config.channels.ports, [5001, 5002, 5003]);
}
