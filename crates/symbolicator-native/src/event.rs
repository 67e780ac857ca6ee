//! Extraction of a symbolication request from an event payload.

use serde::Deserialize;
use serde_json::Value;
use symbolicator_service::types::Platform;

use crate::interface::{
    RawFrame, RawObjectInfo, RawStacktrace, SdkInfo, StackId, SymbolicateStacktraces,
    SymbolicationError,
};
use crate::symbolication::mechanism::RawMechanism;

/// A list that is either wrapped as `{"values": [..]}` or given directly.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Values<T> {
    Wrapped { values: Option<Vec<T>> },
    Bare(Vec<T>),
}

impl<T> Values<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Values::Wrapped { values } => values.unwrap_or_default(),
            Values::Bare(values) => values,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawDebugMeta {
    #[serde(default)]
    images: Option<Vec<Value>>,
    #[serde(default)]
    sdk_info: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawStacktraceData {
    #[serde(default)]
    frames: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawException {
    #[serde(default)]
    stacktrace: Option<RawStacktraceData>,
    #[serde(default)]
    mechanism: Option<RawMechanism>,
}

#[derive(Debug, Deserialize)]
struct RawThread {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    stacktrace: Option<RawStacktraceData>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    platform: Option<Platform>,
    #[serde(default)]
    debug_meta: Option<RawDebugMeta>,
    #[serde(default)]
    exception: Option<Values<RawException>>,
    #[serde(default)]
    threads: Option<Values<RawThread>>,
}

/// Thread ids are sent as numbers or as numeric strings.
fn parse_thread_id(id: &Value) -> Option<u64> {
    match id {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn parse_frames(
    stack: StackId,
    data: Option<RawStacktraceData>,
) -> Result<Vec<RawFrame>, SymbolicationError> {
    let frames = data.and_then(|data| data.frames).unwrap_or_default();

    frames
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            RawFrame::deserialize(frame).map_err(|source| SymbolicationError::InvalidFrame {
                stack,
                index,
                source,
            })
        })
        .collect()
}

fn parse_images(images: Vec<Value>) -> Vec<RawObjectInfo> {
    images
        .iter()
        .enumerate()
        .filter_map(|(index, image)| match RawObjectInfo::deserialize(image) {
            Ok(info) => Some(info),
            Err(error) => {
                tracing::warn!(error = %error, index, "skipping malformed image");
                None
            }
        })
        .collect()
}

fn parse_sdk_info(sdk_info: &Value) -> Option<SdkInfo> {
    if sdk_info.is_null() {
        return None;
    }

    match SdkInfo::deserialize(sdk_info) {
        Ok(sdk_info) => Some(sdk_info),
        Err(error) => {
            tracing::warn!(error = %error, "ignoring malformed sdk_info");
            None
        }
    }
}

impl SymbolicateStacktraces {
    /// Builds a request from an event payload.
    ///
    /// Exception stacks come first, followed by thread stacks, each in event order. Malformed
    /// images and SDK information are skipped, while a malformed frame fails the whole event.
    pub fn from_event(event: &Value) -> Result<Self, SymbolicationError> {
        let event = RawEvent::deserialize(event).map_err(SymbolicationError::InvalidEvent)?;
        let debug_meta = event.debug_meta.unwrap_or_default();

        let mut stacktraces = Vec::new();

        let exceptions = event.exception.map(Values::into_vec).unwrap_or_default();
        for (i, exception) in exceptions.into_iter().enumerate() {
            let id = StackId::Exception(i);
            stacktraces.push(RawStacktrace {
                id,
                thread_id: None,
                mechanism: exception.mechanism,
                frames: parse_frames(id, exception.stacktrace)?,
            });
        }

        let threads = event.threads.map(Values::into_vec).unwrap_or_default();
        for (i, thread) in threads.into_iter().enumerate() {
            let id = StackId::Thread(i);
            stacktraces.push(RawStacktrace {
                id,
                thread_id: thread.id.as_ref().and_then(parse_thread_id),
                mechanism: None,
                frames: parse_frames(id, thread.stacktrace)?,
            });
        }

        Ok(SymbolicateStacktraces {
            platform: event.platform,
            sdk_info: debug_meta.sdk_info.as_ref().and_then(parse_sdk_info),
            stacktraces,
            modules: parse_images(debug_meta.images.unwrap_or_default()),
        })
    }

    /// Parses an event payload from JSON.
    pub fn from_slice(data: &[u8]) -> Result<Self, SymbolicationError> {
        let event: Value = serde_json::from_slice(data).map_err(SymbolicationError::InvalidEvent)?;
        Self::from_event(&event)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use symbolicator_service::types::NativePlatform;
    use symbolicator_service::utils::hex::HexValue;

    use super::*;

    #[test]
    fn test_from_event() {
        let event = json!({
            "platform": "cocoa",
            "debug_meta": {
                "images": [
                    {"type": "apple", "image_addr": 4295098368u64, "image_size": 32768},
                    {"type": "apple", "image_addr": {"nested": true}},
                ],
                "sdk_info": {"sdk_name": "iOS", "version_major": 9}
            },
            "exception": {"values": [{
                "stacktrace": {"frames": [{"function": "main", "instruction_addr": 4295123760u64}]},
                "mechanism": {"type": "mach"}
            }]},
            "threads": [
                {"id": "39", "stacktrace": {"frames": [{"instruction_addr": "0x00000001843a1530"}]}},
                {"id": 40}
            ]
        });

        let request = SymbolicateStacktraces::from_event(&event).unwrap();

        assert_eq!(
            request.platform,
            Some(Platform::Native(NativePlatform::Cocoa))
        );
        assert_eq!(request.modules.len(), 1);
        assert_eq!(
            request.sdk_info.as_ref().and_then(|s| s.sdk_name.as_deref()),
            Some("iOS")
        );

        let ids: Vec<_> = request.stacktraces.iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            [StackId::Exception(0), StackId::Thread(0), StackId::Thread(1)]
        );

        let exception = &request.stacktraces[0];
        assert!(matches!(exception.mechanism, Some(RawMechanism::Current(_))));
        assert_eq!(exception.frames[0].function.as_deref(), Some("main"));

        let thread = &request.stacktraces[1];
        assert_eq!(thread.thread_id, Some(39));
        assert_eq!(
            thread.frames[0].instruction_addr,
            Some(HexValue(0x1843a1530))
        );
        assert!(request.stacktraces[2].frames.is_empty());
    }

    #[test]
    fn test_empty_event() {
        let request = SymbolicateStacktraces::from_slice(b"{}").unwrap();
        assert!(request.stacktraces.is_empty());
        assert!(request.modules.is_empty());
        assert!(request.sdk_info.is_none());
    }

    #[test]
    fn test_value_lists() {
        let event = json!({
            "exception": {"values": null},
            "threads": {}
        });
        let request = SymbolicateStacktraces::from_event(&event).unwrap();
        assert!(request.stacktraces.is_empty());

        let event = json!({
            "exception": [{"stacktrace": {"frames": [{"function": "main"}]}}],
            "threads": {"values": [{"id": 1}]}
        });
        let request = SymbolicateStacktraces::from_event(&event).unwrap();
        let ids: Vec<_> = request.stacktraces.iter().map(|s| s.id).collect();
        assert_eq!(ids, [StackId::Exception(0), StackId::Thread(0)]);
        assert_eq!(request.stacktraces[1].thread_id, Some(1));
    }

    #[test]
    fn test_invalid_frame() {
        let event = json!({
            "exception": {"values": []},
            "threads": {"values": [{
                "stacktrace": {"frames": [
                    {"function": "ok"},
                    {"function": "broken", "instruction_addr": "not an address"}
                ]}
            }]}
        });

        let error = SymbolicateStacktraces::from_event(&event).unwrap_err();
        assert_eq!(error.to_string(), "invalid frame 1 in thread 0");
        assert!(matches!(
            error,
            SymbolicationError::InvalidFrame {
                stack: StackId::Thread(0),
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_event() {
        assert!(matches!(
            SymbolicateStacktraces::from_slice(b"[1, 2]"),
            Err(SymbolicationError::InvalidEvent(_))
        ));
        assert!(matches!(
            SymbolicateStacktraces::from_slice(b"{not json"),
            Err(SymbolicationError::InvalidEvent(_))
        ));
    }
}
