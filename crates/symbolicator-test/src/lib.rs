//! Helpers for testing symbolication.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - Event payloads and symbol tables are kept as JSON fixtures in `tests/fixtures` at the
//!    workspace root. Load them with [`read_fixture`] or [`read_json_fixture`].

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

pub use insta;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the symbolication crates and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new(
            "symbolicator_native=trace,symbolicator_service=trace",
        ))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Returns the absolute path to the given fixture.
///
/// Fixtures are located in the `tests/fixtures` directory, located from the workspace root.
///
/// # Panics
///
/// Panics if the fixture path does not exist on the file system.
pub fn fixture(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();

    let mut full_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    full_path.pop(); // to /crates/
    full_path.pop(); // to /
    full_path.push("tests/fixtures/");
    full_path.push(path);

    assert!(full_path.exists(), "'{}' does not exist", path.display());

    full_path
}

/// Reads the given fixture as a [`serde_json::Value`].
///
/// # Panics
///
/// Panics if the fixture does not exist or is not valid JSON.
pub fn read_json_fixture(path: impl AsRef<Path>) -> serde_json::Value {
    read_fixture(path)
}

/// Reads and deserializes the given JSON fixture.
///
/// # Panics
///
/// Panics if the fixture does not exist or does not deserialize into `T`.
pub fn read_fixture<T: DeserializeOwned>(path: impl AsRef<Path>) -> T {
    let path = fixture(path);
    let contents = std::fs::read_to_string(&path)
        .unwrap_or_else(|err| panic!("failed to read '{}': {err}", path.display()));
    serde_json::from_str(&contents)
        .unwrap_or_else(|err| panic!("failed to parse '{}': {err}", path.display()))
}
