//! Test utilities for locale-mgmt
//!
//! Temporary directory management, test file creation and assertion helpers
//! shared by the unit tests.

use crate::error::LocaleMgmtError;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// The directory is removed when the returned `TempDir` is dropped.
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Create a test file with the given content and return its path
///
/// # Panics
///
/// Panics if file creation or writing fails
pub fn create_test_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: crate::error::Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}', got Ok", expected),
        Err(e) => {
            let message = e.to_string();
            assert!(
                message.contains(expected),
                "Expected error containing '{}', got '{}'",
                expected,
                message
            );
        }
    }
}

/// Assert that an error is a storage error
///
/// # Panics
///
/// Panics if the result is Ok or the error is not `LocaleMgmtError::Storage`
pub fn assert_storage_error<T>(result: crate::error::Result<T>) {
    match result {
        Ok(_) => panic!("Expected storage error, got Ok"),
        Err(e) => match e.downcast_ref::<LocaleMgmtError>() {
            Some(LocaleMgmtError::Storage(_)) => {}
            other => panic!("Expected LocaleMgmtError::Storage, got {:?}", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_create_test_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "test.txt", "hello");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn test_assert_error_contains() {
        let result: crate::error::Result<()> =
            Err(LocaleMgmtError::Config("invalid issuer".to_string()).into());
        assert_error_contains(result, "invalid issuer");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_panics_on_ok() {
        let result: crate::error::Result<()> = Ok(());
        assert_error_contains(result, "anything");
    }

    #[test]
    fn test_assert_storage_error() {
        let result: crate::error::Result<()> =
            Err(LocaleMgmtError::Storage("locked".to_string()).into());
        assert_storage_error(result);
    }
}
