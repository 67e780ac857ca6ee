//! The external representation of symbolicated backtraces.
//!
//! Internally, addresses are kept in their minimal hex form. The external form pads
//! instruction addresses with zeros according to [`AddrPadding`] and uses camel case field
//! names.

use serde::Serialize;
use symbolicator_service::config::{AddrPadding, SymbolicationConfig};
use symbolicator_service::types::Platform;
use symbolicator_service::utils::hex::HexValue;

use crate::interface::{
    CompleteObjectInfo, CompleteStacktrace, CompletedSymbolicationResponse, FrameTrust, StackId,
    SymbolicatedFrame,
};
use crate::symbolication::mechanism::Mechanism;

/// A frame in its external representation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApiFrame {
    pub function: Option<String>,
    pub symbol: Option<String>,
    pub package: Option<String>,
    pub filename: Option<String>,
    pub abs_path: Option<String>,
    pub line_no: Option<u32>,
    pub col_no: Option<u32>,
    pub symbol_addr: Option<HexValue>,
    /// The zero-padded instruction address.
    pub instruction_addr: Option<String>,
    pub in_app: bool,
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "is_default_trust")]
    pub trust: FrameTrust,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vars: Option<serde_json::Value>,
}

fn is_default_trust(trust: &FrameTrust) -> bool {
    *trust == FrameTrust::None
}

/// A backtrace in its external representation.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ApiStacktrace {
    pub id: StackId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,
    pub frames: Vec<ApiFrame>,
}

/// A symbolication response in its external representation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ApiResponse {
    pub stacktraces: Vec<ApiStacktrace>,
    pub modules: Vec<CompleteObjectInfo>,
}

/// Renders frames and addresses according to the configured padding.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    padding: AddrPadding,
    default_width: usize,
}

impl Renderer {
    pub fn new(config: &SymbolicationConfig) -> Self {
        Self {
            padding: config.addr_padding,
            default_width: config.default_addr_width,
        }
    }

    pub fn render_response(&self, response: &CompletedSymbolicationResponse) -> ApiResponse {
        ApiResponse {
            stacktraces: response
                .stacktraces
                .iter()
                .map(|trace| self.render_stacktrace(trace, &response.modules))
                .collect(),
            modules: response.modules.clone(),
        }
    }

    /// Renders one backtrace.
    ///
    /// `modules` are the images of the response, in the order `module_index` refers to.
    pub fn render_stacktrace(
        &self,
        trace: &CompleteStacktrace,
        modules: &[CompleteObjectInfo],
    ) -> ApiStacktrace {
        let longest = trace
            .frames
            .iter()
            .filter_map(|frame| frame.raw.instruction_addr)
            .map(HexValue::digits)
            .max()
            .unwrap_or(self.default_width);

        let frames = trace
            .frames
            .iter()
            .map(|frame| {
                let width = match self.padding {
                    AddrPadding::Longest => longest,
                    AddrPadding::PointerWidth => frame
                        .module_index
                        .and_then(|i| modules.get(i))
                        .and_then(CompleteObjectInfo::pointer_width)
                        .unwrap_or(self.default_width),
                };
                render_frame(frame, width)
            })
            .collect();

        ApiStacktrace {
            id: trace.id,
            thread_id: trace.thread_id,
            mechanism: trace.mechanism.clone(),
            frames,
        }
    }
}

fn render_frame(frame: &SymbolicatedFrame, width: usize) -> ApiFrame {
    let raw = &frame.raw;
    ApiFrame {
        function: raw.function.clone(),
        symbol: raw.symbol.clone(),
        package: raw.package.clone(),
        filename: raw.filename.clone(),
        abs_path: raw.abs_path.clone(),
        line_no: raw.lineno,
        col_no: raw.colno,
        symbol_addr: raw.symbol_addr,
        instruction_addr: raw.instruction_addr.map(|addr| addr.padded(width)),
        in_app: raw.in_app.unwrap_or(false),
        platform: raw.platform.clone(),
        trust: raw.trust,
        vars: raw.vars.clone(),
    }
}
