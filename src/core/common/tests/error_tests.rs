use crate::core::common::error::MvpTreeError;
use crate::core::config::TreeConfig;
use std::error::Error;
use std::io;

#[test]
fn test_error_display_and_source() {
    let io_err = MvpTreeError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
    assert_eq!(format!("{}", io_err), "IO Error: file not found");
    assert!(io_err.source().is_some());

    let format_err = MvpTreeError::format(17, "point.id", "invalid utf-8");
    assert_eq!(format!("{}", format_err), "Format error at offset 17 (point.id): invalid utf-8");
    assert!(format_err.source().is_none());

    let distance_err = MvpTreeError::InvalidDistance { value: -1.0 };
    assert_eq!(format!("{}", distance_err), "Distance metric returned an invalid value: -1");

    let version_err = MvpTreeError::UnsupportedVersion { found: 3, expected: 1 };
    assert_eq!(format!("{}", version_err), "Unsupported format version 3, expected 1");

    assert_eq!(format!("{}", MvpTreeError::Cancelled), "Operation cancelled");
    assert_eq!(
        format!("{}", MvpTreeError::invalid_argument("radius")),
        "Invalid argument: radius"
    );
}

#[test]
fn test_config_mismatch_display() {
    let err = MvpTreeError::ConfigMismatch {
        expected: TreeConfig::default(),
        found: TreeConfig { branch_factor: 3, path_length: 5, leaf_capacity: 25 },
    };
    assert_eq!(
        format!("{}", err),
        "Configuration mismatch: expected branch_factor=2, path_length=5, leaf_capacity=25, \
         found branch_factor=3, path_length=5, leaf_capacity=25"
    );
}

#[test]
fn test_from_std_io_error() {
    let std_io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
    let err: MvpTreeError = std_io_err.into();
    match err {
        MvpTreeError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
        _ => panic!("Expected MvpTreeError::Io variant"),
    }
}

#[test]
fn test_from_toml_error() {
    let toml_err = toml::from_str::<TreeConfig>("branch_factor = [").unwrap_err();
    let err: MvpTreeError = toml_err.into();
    assert!(matches!(err, MvpTreeError::Config(_)));
    assert!(format!("{}", err).starts_with("Configuration error: "));
}

#[test]
fn test_from_try_reserve_error() {
    let reserve_err = Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err();
    let err: MvpTreeError = reserve_err.into();
    assert!(matches!(err, MvpTreeError::AllocationFailure(_)));
}
