use mayer_core::errors::{ErrorInfo, MayerError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("phase", "search-wide")
        .with_context("steps", "1000")
}

#[test]
fn initialization_error_surface() {
    let err = MayerError::Initialization(sample_info(
        "zero-weight-start",
        "could not find a configuration for target system",
    ));
    assert_eq!(err.info().code, "zero-weight-start");
    assert!(err.info().context.contains_key("phase"));
    assert!(err
        .to_string()
        .contains("could not find a configuration for target system"));
}

#[test]
fn calibration_error_surface() {
    let err = MayerError::Calibration(sample_info("ref-pref-invalid", "oops").with_hint("widen span"));
    assert_eq!(err.info().code, "ref-pref-invalid");
    assert_eq!(err.info().hint.as_deref(), Some("widen span"));
    assert!(err.to_string().contains("hint: widen span"));
}

#[test]
fn persistence_error_surface() {
    let err = MayerError::Persistence(sample_info("calibration-write", "permission denied"));
    assert_eq!(err.info().code, "calibration-write");
    assert!(err.info().context.contains_key("steps"));
}

#[test]
fn statistics_error_surface() {
    let err = MayerError::Statistics(sample_info("non-finite-average", "average is NaN"));
    assert_eq!(err.info().code, "non-finite-average");
}

#[test]
fn config_and_move_error_surface() {
    let err = MayerError::Config(sample_info("sub-steps-zero", "sub_steps must be positive"));
    assert_eq!(err.info().code, "sub-steps-zero");
    let err = MayerError::Move(sample_info("empty-move-set", "no proposers"));
    assert_eq!(err.info().code, "empty-move-set");
}

#[test]
fn errors_roundtrip_through_json() {
    let err = MayerError::Calibration(sample_info("ref-pref-invalid", "oops"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Calibration\""));
    let back: MayerError = serde_json::from_str(&json).unwrap();
    assert_eq!(back, err);
}
