use std::sync::Arc;

use symbolicator_native::SymbolicationActor;
use symbolicator_native::interface::CompletedSymbolicationResponse;
use symbolicator_native::provider::SymbolTable;
use symbolicator_service::config::Config;
use symbolicator_test as test;

pub use test::{fixture, read_json_fixture};

pub const APP_PATH: &str = "/var/containers/Bundle/Application/B33C37A8-F933-4B6B-9FFA-152282BFDF13/SentryTest.app/SentryTest";

/// Setup tests and create a test service.
///
/// The service resolves frames with the symbol table in the `symbols.json` fixture. The
/// `update_config` closure can modify any default configuration if needed.
pub fn setup_service(update_config: impl FnOnce(&mut Config)) -> SymbolicationActor {
    test::setup();

    let mut config = Config::default();
    update_config(&mut config);

    let symbols = SymbolTable::from_path(&fixture("symbols.json")).unwrap();
    SymbolicationActor::new(Arc::new(symbols), &config)
}

/// Creates a test service with default configuration that resolves frames with the given
/// symbol table.
pub fn setup_service_with_symbols(symbols: &[u8]) -> SymbolicationActor {
    test::setup();

    let symbols = SymbolTable::from_slice(symbols).unwrap();
    SymbolicationActor::new(Arc::new(symbols), &Config::default())
}

/// Symbolicates the event in the given fixture with a default service.
pub async fn symbolicate_fixture(name: &str) -> CompletedSymbolicationResponse {
    let event = read_json_fixture(name);
    setup_service(|_| ())
        .symbolicate_event(&event)
        .await
        .unwrap()
}
