use std::collections::HashMap;

use symbolicator_service::metric;
use symbolicator_service::types::Platform;

use crate::interface::{CompleteObjectInfo, CompleteStacktrace, FrameStatus, FrameTrust};

/// Stacktrace related Metrics
///
/// This gives some metrics about the quality of the stack traces included
/// in a symbolication request. See the individual members for more information.
///
/// These numbers are being accumulated across one symbolication request, and are emitted
/// as a histogram.
#[derive(Debug, Default)]
pub struct StacktraceMetrics {
    /// A truncated stack trace is one that does not end in a
    /// well known thread base.
    pub truncated_traces: u64,

    /// We classify a short stacktrace as one that has less than 3 frames.
    pub short_traces: u64,

    /// This indicates a stack trace that has at least one unsymbolicated frame.
    pub bad_traces: u64,

    /// Frames that were found by stack scanning.
    pub scanned_frames: u64,

    /// Native frames that were not symbolicated.
    pub unsymbolicated_frames: u64,

    /// Unsymbolicated frames found by scanning.
    pub unsymbolicated_scanned_frames: u64,

    /// Frames referencing addresses outside of all images.
    ///
    /// These are usually the result of an incomplete image list sent by the client.
    pub unmapped_frames: u64,

    /// Frames of inlined functions added during symbolication.
    pub inlined_frames: u64,

    /// Frames of non-native platforms, which are not looked up.
    pub passthrough_frames: u64,
}

impl StacktraceMetrics {
    /// Accumulates the metrics of one symbolicated stack.
    pub fn record_stacktrace(&mut self, stacktrace: &CompleteStacktrace) {
        let frames = &stacktrace.frames;
        let mut is_bad = false;

        for (i, frame) in frames.iter().enumerate() {
            let is_inlinee = frames
                .get(i + 1)
                .is_some_and(|next| next.original_index == frame.original_index);
            if is_inlinee {
                self.inlined_frames += 1;
                continue;
            }

            let scanned = frame.raw.trust == FrameTrust::Scan;
            if scanned {
                self.scanned_frames += 1;
            }

            match frame.status {
                FrameStatus::Symbolicated => {}
                FrameStatus::Passthrough => self.passthrough_frames += 1,
                status => {
                    is_bad = true;
                    self.unsymbolicated_frames += 1;
                    if scanned {
                        self.unsymbolicated_scanned_frames += 1;
                    }
                    if status == FrameStatus::UnknownImage {
                        self.unmapped_frames += 1;
                    }
                }
            }
        }

        // we try to find a base frame among the bottom 5
        if !frames.iter().rev().take(5).any(|frame| {
            is_likely_base_frame(
                frame
                    .raw
                    .function
                    .as_deref()
                    .or(frame.raw.symbol.as_deref()),
            )
        }) {
            self.truncated_traces += 1;
        }
        // macOS has some extremely short but perfectly fine stacks, such as:
        // `__workq_kernreturn` > `_pthread_wqthread` > `start_wqthread`
        if frames.len() < 3 {
            self.short_traces += 1;
        }
        if is_bad {
            self.bad_traces += 1;
        }
    }
}

/// Determine if a function is likely to be a thread base.
///
/// This is just a heuristic that matches the function to well known thread entry points.
fn is_likely_base_frame(function: Option<&str>) -> bool {
    let Some(function) = function else {
        return false;
    };

    // C start/main
    if matches!(function, "main" | "start" | "_start") {
        return true;
    }

    // Windows and posix thread base. These often have prefixes depending on the OS and Version, so
    // we use a substring match here.
    function.contains("UserThreadStart")
        || function.contains("thread_start")
        || function.contains("start_thread")
        || function.contains("start_wqthread")
}

pub fn record_symbolication_metrics(
    event_platform: Option<&Platform>,
    metrics: &StacktraceMetrics,
    modules: &[CompleteObjectInfo],
    stacktraces: &[CompleteStacktrace],
) {
    let event_platform = event_platform.map(Platform::as_str).unwrap_or("none");

    let mut unusable_modules = 0u64;
    for m in modules {
        metric!(
            counter("symbolication.debug_status") += 1,
            "status" => m.debug_status.name()
        );
        if m.cache_id().is_none() {
            unusable_modules += 1;
        }
    }

    metric!(
        histogram("symbolication.num_modules") = modules.len() as u64,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.unusable_modules") = unusable_modules,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.stacktraces") = stacktraces.len() as u64,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.short_stacktraces") = metrics.short_traces,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.truncated_stacktraces") = metrics.truncated_traces,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.bad_stacktraces") = metrics.bad_traces,
        "platform" => event_platform
    );

    // Count number of frames by platform (including no platform)
    let frames_by_platform = stacktraces.iter().flat_map(|st| st.frames.iter()).fold(
        HashMap::new(),
        |mut map, frame| {
            let platform = frame.raw.platform.as_ref();
            let count: &mut u64 = map.entry(platform).or_default();
            *count += 1;
            map
        },
    );

    for (p, count) in frames_by_platform {
        let frame_platform = p.map(Platform::as_str).unwrap_or("none");
        metric!(
            histogram("symbolication.frames") = count,
            "frame_platform" => frame_platform, "event_platform" => event_platform
        );
    }

    metric!(
        histogram("symbolication.frames.scanned") = metrics.scanned_frames,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.frames.unsymbolicated") = metrics.unsymbolicated_frames,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.frames.unsymbolicated_scanned") =
            metrics.unsymbolicated_scanned_frames,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.frames.unmapped") = metrics.unmapped_frames,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.frames.inlined") = metrics.inlined_frames,
        "platform" => event_platform
    );
    metric!(
        histogram("symbolication.frames.passthrough") = metrics.passthrough_frames,
        "platform" => event_platform
    );
}
