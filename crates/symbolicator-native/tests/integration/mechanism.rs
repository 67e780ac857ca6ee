use serde_json::json;
use symbolicator_native::interface::{CompletedSymbolicationResponse, StackId};
use symbolicator_native::symbolication::mechanism::{Mechanism, RawMechanism, classify};

use crate::{read_json_fixture, setup_service, symbolicate_fixture};

fn exception_mechanism(response: &CompletedSymbolicationResponse, i: usize) -> &Mechanism {
    response
        .stacktrace(StackId::Exception(i))
        .and_then(|trace| trace.mechanism.as_ref())
        .unwrap()
}

#[tokio::test]
async fn test_current_mechanism() {
    let response = symbolicate_fixture("native_event.json").await;
    let mechanism = exception_mechanism(&response, 0);

    assert_eq!(mechanism.ty, "mach");
    let signal = mechanism.meta.signal.as_ref().unwrap();
    assert_eq!(signal.number, 6);
    assert_eq!(signal.name.as_deref(), Some("SIGABRT"));
    let exception = mechanism.meta.mach_exception.as_ref().unwrap();
    assert_eq!(exception.exception, 10);
    assert_eq!(exception.name.as_deref(), Some("EXC_CRASH"));
}

#[tokio::test]
async fn test_legacy_mechanism() {
    let response = symbolicate_fixture("legacy_mechanism_event.json").await;
    let mechanism = exception_mechanism(&response, 0);

    assert_eq!(mechanism.ty, "generic");
    let signal = mechanism.meta.signal.as_ref().unwrap();
    assert_eq!(signal.number, 10);
    assert_eq!(signal.code, Some(0));
    assert_eq!(signal.name.as_deref(), Some("SIGBUS"));
    assert_eq!(signal.code_name.as_deref(), Some("BUS_NOOP"));
    let exception = mechanism.meta.mach_exception.as_ref().unwrap();
    assert_eq!(exception.exception, 1);
    assert_eq!(exception.code, 1);
    assert_eq!(exception.subcode, 8);
    assert_eq!(exception.name.as_deref(), Some("EXC_BAD_ACCESS"));

    // the frame itself is resolved like any other
    let frame = &response.stacktraces[0].frames[0];
    assert_eq!(frame.raw.function.as_deref(), Some("real_main"));
}

#[tokio::test]
async fn test_unrecognized_mechanism() {
    let response = symbolicate_fixture("legacy_mechanism_event.json").await;
    let trace = response.stacktrace(StackId::Exception(1)).unwrap();

    assert!(trace.frames.is_empty());
    let mechanism = trace.mechanism.as_ref().unwrap();
    assert_eq!(mechanism, &Mechanism::generic());
    assert!(mechanism.meta.is_empty());

    let serialized = serde_json::to_value(mechanism).unwrap();
    assert_eq!(serialized, json!({"type": "generic", "meta": {}}));
}

#[tokio::test]
async fn test_linux_signal_numbering() {
    let mut event = read_json_fixture("legacy_mechanism_event.json");
    event["debug_meta"]["sdk_info"] = json!({"sdk_name": "Linux"});
    event["exception"]["values"][0]["mechanism"] = json!({
        "type": "signalhandler",
        "meta": {"signal": {"number": 10}, "errno": {"number": 2}}
    });

    let response = setup_service(|_| ()).symbolicate_event(&event).await.unwrap();
    let mechanism = exception_mechanism(&response, 0);

    assert_eq!(mechanism.ty, "signalhandler");
    let signal = mechanism.meta.signal.as_ref().unwrap();
    assert_eq!(signal.name.as_deref(), Some("SIGUSR1"));
    assert_eq!(signal.code_name, None);
    let errno = mechanism.meta.errno.as_ref().unwrap();
    assert_eq!(errno.name.as_deref(), Some("ENOENT"));
}

#[test]
fn test_classification_is_idempotent() {
    let inputs = [
        json!({"posix_signal": {"signal": 11, "code": 0}, "mach_exception": {"exception": 1}}),
        json!({"type": "mach", "meta": {"signal": {"number": 6, "code": 0}}}),
        json!({"handled": true}),
        json!("not a mechanism"),
    ];

    for input in inputs {
        let once = classify(serde_json::from_value::<RawMechanism>(input).unwrap());
        let twice = classify(RawMechanism::from(once.clone()));
        assert_eq!(once, twice);

        let serialized = serde_json::to_value(&once).unwrap();
        let reparsed: RawMechanism = serde_json::from_value(serialized).unwrap();
        assert_eq!(classify(reparsed), once);
    }
}
