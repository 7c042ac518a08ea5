use std::time::Duration;
use testmonitor::codec::WireFormat;
use testmonitor::config::{Config, DEFAULT_ENDPOINT, OutputStream, SinkKind, TransportMode};

#[test]
fn test_default_config_values() {
    let config = Config::default();

    assert!(config.emit.sinks.contains(SinkKind::Transport));
    assert!(config.emit.sinks.contains(SinkKind::LogFile));
    assert!(config.emit.sinks.contains(SinkKind::Console));
    assert!(!config.emit.sinks.contains(SinkKind::Rpc));
    assert_eq!(config.emit.format, WireFormat::Json);
    assert_eq!(config.emit.output_stream, OutputStream::Stdout);

    assert_eq!(config.transport.mode, TransportMode::Server);
    assert_eq!(config.transport.endpoint, DEFAULT_ENDPOINT);
    assert_eq!(config.transport.connection_timeout(), Duration::from_secs(5));

    assert_eq!(config.rpc.port, 50051);
    assert!(config.activation.required_runner.is_none());
    assert!(config.log.file.ends_with("testmonitor/events.log"));
    config.validate().expect("defaults are valid");
}

#[test]
fn test_empty_file_yields_defaults() {
    assert_eq!(Config::parse("").expect("parse"), Config::default());
}

#[test]
fn test_rendered_defaults_parse_back() {
    let rendered = Config::default().to_toml();
    assert_eq!(Config::parse(&rendered).expect("parse"), Config::default());
}
