use hearth_logger::{LogSettings, Logger, LoggerError};

#[test]
fn second_init_returns_subscriber_error() {
    let _logger = Logger::from_settings(&LogSettings::default())
        .and_then(|builder| builder.init())
        .expect("first init should succeed");

    let err = Logger::builder()
        .name("hub-second")
        .init()
        .expect_err("second init should fail");

    assert!(
        matches!(err, LoggerError::Subscriber { .. }),
        "expected subscriber error for second init, got {err}"
    );
}
