use serde_json::json;
use symbolicator_native::Renderer;
use symbolicator_native::interface::{FrameStatus, ObjectFileStatus, StackId, SymbolicationError};
use symbolicator_service::config::AddrPadding;
use symbolicator_service::types::{NativePlatform, Platform};
use symbolicator_service::utils::hex::HexValue;
use symbolicator_test::insta;

use crate::{
    APP_PATH, read_json_fixture, setup_service, setup_service_with_symbols, symbolicate_fixture,
};

#[tokio::test]
async fn test_frame_resolution() {
    let response = symbolicate_fixture("native_event.json").await;

    let frames = &response.stacktrace(StackId::Exception(0)).unwrap().frames;
    assert_eq!(frames.len(), 4);

    assert_eq!(frames[0].status, FrameStatus::UnknownImage);
    assert_eq!(frames[0].raw.function.as_deref(), Some("<redacted>"));
    assert_eq!(frames[0].raw.instruction_addr, Some(HexValue(0x2ac28b8)));
    assert_eq!(frames[0].raw.in_app, Some(false));

    assert_eq!(frames[1].status, FrameStatus::Symbolicated);
    assert_eq!(frames[1].raw.function.as_deref(), Some("real_main"));
    assert_eq!(frames[1].raw.filename.as_deref(), Some("Foo.swift"));
    assert_eq!(frames[1].raw.lineno, Some(42));
    assert_eq!(frames[1].raw.colno, Some(23));
    assert_eq!(frames[1].raw.package.as_deref(), Some(APP_PATH));
    assert_eq!(frames[1].raw.instruction_addr, Some(HexValue(0x100026330)));
    assert_eq!(frames[1].raw.in_app, Some(true));

    assert_eq!(frames[2].raw.function.as_deref(), Some("other_main"));
    assert_eq!(frames[2].raw.lineno, Some(82));
    assert_eq!(frames[2].raw.package.as_deref(), Some(APP_PATH));
    assert_eq!(frames[2].raw.instruction_addr, Some(HexValue(0x1)));
    assert_eq!(frames[2].raw.in_app, Some(true));

    assert_eq!(frames[3].status, FrameStatus::Passthrough);
    assert_eq!(
        frames[3].raw.platform,
        Some(Platform::Other("javascript".into()))
    );
    assert_eq!(frames[3].raw.abs_path.as_deref(), Some("/scripts/views.js"));
    assert_eq!(frames[3].raw.function.as_deref(), Some("merge"));
    assert_eq!(frames[3].raw.lineno, Some(268));
    assert_eq!(frames[3].raw.colno, Some(16));
    assert_eq!(
        frames[3].raw.filename.as_deref(),
        Some("../../sentry/scripts/views.js")
    );
    assert_eq!(frames[3].raw.in_app, Some(true));

    // native frames without a platform inherit the one of the event
    assert_eq!(
        frames[1].raw.platform,
        Some(Platform::Native(NativePlatform::Cocoa))
    );

    assert_eq!(response.modules.len(), 1);
    assert_eq!(response.modules[0].debug_status, ObjectFileStatus::Found);
}

#[tokio::test]
async fn test_frame_outside_image() {
    let mut event = read_json_fixture("native_event.json");
    // the first address past the end of the image
    event["exception"]["values"][0]["stacktrace"]["frames"][1] =
        json!({"function": "main", "instruction_addr": 4295131136u64});

    let response = setup_service(|_| ()).symbolicate_event(&event).await.unwrap();
    let frame = &response.stacktraces[0].frames[1];

    assert_eq!(frame.status, FrameStatus::UnknownImage);
    assert_eq!(frame.raw.function.as_deref(), Some("main"));
    assert_eq!(frame.raw.in_app, Some(true));
}

#[tokio::test]
async fn test_in_app_honoring() {
    let mut event = read_json_fixture("native_event.json");
    let frames = &mut event["exception"]["values"][0]["stacktrace"]["frames"];
    frames[0]["in_app"] = json!(true);
    frames[1]["in_app"] = json!(false);
    frames[2]["in_app"] = json!(false);

    let response = setup_service(|_| ()).symbolicate_event(&event).await.unwrap();
    let frames = &response.stacktraces[0].frames;

    assert_eq!(frames[0].raw.in_app, Some(true));
    assert_eq!(frames[1].raw.function.as_deref(), Some("real_main"));
    assert_eq!(frames[1].raw.in_app, Some(false));
    assert_eq!(frames[2].raw.in_app, Some(false));
    assert_eq!(frames[3].raw.in_app, Some(true));
}

#[tokio::test]
async fn test_thread_frames() {
    let response = symbolicate_fixture("native_event.json").await;

    let thread = response.stacktrace(StackId::Thread(0)).unwrap();
    assert_eq!(thread.thread_id, Some(39));
    assert!(thread.mechanism.is_none());
    assert_eq!(thread.frames.len(), 2);

    let frame = &thread.frames[0];
    assert_eq!(frame.status, FrameStatus::Passthrough);
    assert_eq!(
        frame.raw.package.as_deref(),
        Some("/usr/lib/system/libsystem_pthread.dylib")
    );
    assert_eq!(frame.raw.instruction_addr, Some(HexValue(0x1843a1530)));
}

#[tokio::test]
async fn test_api_context_padding() {
    let service = setup_service(|config| {
        config.symbolication.addr_padding = AddrPadding::Longest;
    });
    let event = read_json_fixture("native_event.json");
    let response = service.symbolicate_event(&event).await.unwrap();

    let rendered = Renderer::new(service.config()).render_response(&response);
    let addrs: Vec<_> = rendered.stacktraces[0]
        .frames
        .iter()
        .filter_map(|frame| frame.instruction_addr.as_deref())
        .collect();

    insta::assert_snapshot!(addrs.join("\n"), @r"
    0x002ac28b8
    0x100026330
    0x000000001
    ");
}

#[tokio::test]
async fn test_api_context_pointer_width() {
    let service = setup_service(|_| ());
    let event = read_json_fixture("native_event.json");
    let response = service.symbolicate_event(&event).await.unwrap();

    let rendered = Renderer::new(service.config()).render_response(&response);
    let frames = &rendered.stacktraces[0].frames;

    // no image, default width
    assert_eq!(frames[0].instruction_addr.as_deref(), Some("0x02ac28b8"));
    // arm64 image
    assert_eq!(
        frames[1].instruction_addr.as_deref(),
        Some("0x0000000100026330")
    );
    assert_eq!(frames[3].instruction_addr, None);
}

#[tokio::test]
async fn test_inline_order() {
    let service = setup_service_with_symbols(
        br#"{"images": [{
            "uuid": "C05B4DDD-69A7-3840-A649-32180D341587",
            "symbols": [{"start": "0x0", "end": "0x8000", "frames": [
                {"function": "inner", "lineno": 1},
                {"function": "middle", "lineno": 2},
                {"function": "outer", "lineno": 3}
            ]}]
        }]}"#,
    );

    let event = read_json_fixture("native_event.json");
    let response = service.symbolicate_event(&event).await.unwrap();
    let frames = &response.stacktraces[0].frames;

    // 4 raw frames, of which two expand into three records each
    assert_eq!(frames.len(), 8);
    let functions: Vec<_> = frames
        .iter()
        .map(|frame| frame.raw.function.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(
        functions,
        ["<redacted>", "inner", "middle", "outer", "inner", "middle", "outer", "merge"]
    );
    let indices: Vec<_> = frames.iter().map(|frame| frame.original_index).collect();
    assert_eq!(indices, [0, 1, 1, 1, 2, 2, 2, 3].map(Some));
}

#[tokio::test]
async fn test_invalid_frame() {
    let mut event = read_json_fixture("native_event.json");
    event["threads"]["values"][0]["stacktrace"]["frames"][1]["lineno"] = json!("not a line");

    let error = setup_service(|_| ())
        .symbolicate_event(&event)
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        SymbolicationError::InvalidFrame {
            stack: StackId::Thread(0),
            index: 1,
            ..
        }
    ));
}
