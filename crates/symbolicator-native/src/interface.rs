use std::fmt;

use serde::{Deserialize, Serialize};
use symbolic::common::{Arch, DebugId};
use symbolicator_service::types::Platform;
use symbolicator_service::utils::hex::HexValue;
use thiserror::Error;

use crate::symbolication::mechanism::{Mechanism, RawMechanism};

/// A request for symbolication of multiple stack traces.
#[derive(Debug, Clone, Default)]
pub struct SymbolicateStacktraces {
    /// The event's platform.
    ///
    /// Frames without a platform of their own inherit this one. Non-native values are kept
    /// as they are.
    pub platform: Option<Platform>,

    /// Information about the SDK and OS that produced the event, if any.
    pub sdk_info: Option<SdkInfo>,

    /// A list of exception and thread stacks, in event order.
    pub stacktraces: Vec<RawStacktrace>,

    /// A list of images that were loaded into the process.
    ///
    /// This list must cover the instruction addresses of the frames in
    /// [`stacktraces`](Self::stacktraces). If a frame is not covered by any image, the frame cannot
    /// be symbolicated as it is not clear which debug file to load.
    pub modules: Vec<RawObjectInfo>,
}

/// The symbolicated crash data.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CompletedSymbolicationResponse {
    /// The stacks containing symbolicated frames, in request order.
    pub stacktraces: Vec<CompleteStacktrace>,

    /// A list of images, extended with status information.
    pub modules: Vec<CompleteObjectInfo>,
}

impl CompletedSymbolicationResponse {
    /// Returns the stack with the given id.
    pub fn stacktrace(&self, id: StackId) -> Option<&CompleteStacktrace> {
        self.stacktraces.iter().find(|trace| trace.id == id)
    }
}

/// Information on the symbolication status of this frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    /// The frame was symbolicated successfully.
    #[default]
    Symbolicated,
    /// The symbol provider had no information for this address.
    MissingSymbol,
    /// No image is specified for the address of the frame.
    UnknownImage,
    /// The symbol provider failed or timed out.
    Missing,
    /// The frame belongs to a non-native platform and was not looked up.
    Passthrough,
}

/// A potentially symbolicated frame in the symbolication response.
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SymbolicatedFrame {
    /// Symbolication status of this frame.
    pub status: FrameStatus,

    /// The index of this frame in the request.
    ///
    /// Frames might expand to multiple inline frames at the same instruction address, all of
    /// which share the index of the frame they were expanded from.
    pub original_index: Option<usize>,

    /// Index of the image this frame was attributed to, within the response's `modules`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_index: Option<usize>,

    #[serde(flatten)]
    pub raw: RawFrame,
}

/// Identifies a stack within an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum StackId {
    /// The stack of the n-th entry in `exception.values`.
    Exception(usize),
    /// The stack of the n-th entry in `threads.values`.
    Thread(usize),
}

impl Default for StackId {
    fn default() -> Self {
        StackId::Exception(0)
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StackId::Exception(index) => write!(f, "exception {index}"),
            StackId::Thread(index) => write!(f, "thread {index}"),
        }
    }
}

/// A symbolicated stacktrace.
///
/// Frames in this request may or may not be symbolicated. The status field contains information on
/// the individual success for each frame.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct CompleteStacktrace {
    /// Where in the event this stack came from.
    pub id: StackId,

    /// ID of thread that had this stacktrace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<u64>,

    /// The normalized mechanism of the exception owning this stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanism: Option<Mechanism>,

    /// Frames of this stack trace.
    pub frames: Vec<SymbolicatedFrame>,
}

fn is_default_value<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// An unsymbolicated frame from a symbolication request.
///
/// The same type carries the resolved data in [`SymbolicatedFrame`].
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RawFrame {
    /// The frame's platform.
    ///
    /// Frames of a non-native platform are passed through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,

    /// The absolute instruction address of this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<HexValue>,

    /// Whether this stack frame's instruction address needs to be adjusted for symbolication.
    ///
    /// * `Some(true)` means that the address will definitely be adjusted;
    /// * `Some(false)` means that the address will definitely not be adjusted;
    /// * `None` means the address is adjusted based on the frame's [`trust`](Self::trust).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjust_instruction_addr: Option<bool>,

    /// The path to the [module](RawObjectInfo) this frame is located in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// The mangled name of the function this frame is located in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Start address of the function this frame is located in (lower or equal to
    /// [`instruction_addr`](Self::instruction_addr)).
    #[serde(
        default,
        alias = "sym_addr",
        skip_serializing_if = "Option::is_none"
    )]
    pub symbol_addr: Option<HexValue>,

    /// The demangled function name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,

    /// Source file path relative to the compilation directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Absolute path to the source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,

    /// The line number within the source file, starting at `1` for the first line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,

    /// The column within the line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,

    /// Whether the frame is related to app-code (rather than libraries/dependencies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app: Option<bool>,

    /// Information about how the raw frame was created.
    #[serde(default, skip_serializing_if = "is_default_value")]
    pub trust: FrameTrust,

    /// Local variables captured by the client, kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vars: Option<serde_json::Value>,
}

/// How trustworth the instruction pointer of the frame is.
///
/// During stack walking it is not always possible to exactly be sure of the instruction
/// pointer and thus detected frame, especially if there was not enough Call Frame
/// Information available.  Frames that were detected by scanning may contain dubious
/// information.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameTrust {
    /// Unknown.
    #[default]
    None,
    /// Found by scanning the stack.
    Scan,
    /// Found by scanning the stack using Call Frame Info.
    CfiScan,
    /// Derived from the Frame Pointer.
    Fp,
    /// Derived from the Call Frame Info rules.
    Cfi,
    /// Explicitly provided by an external stack walker (probably on crashing device).
    PreWalked,
    /// Provided by the CPU context (i.e. the registers).
    ///
    /// This is only possible for the topmost, i.e. the crashing, frame as for the other
    /// frames the registers need to be reconstructed when unwinding the stack.
    Context,
}

impl FrameTrust {
    /// Whether the frame was found heuristically, in which case its address is a return address.
    pub fn is_scanned(self) -> bool {
        matches!(self, FrameTrust::Scan | FrameTrust::CfiScan)
    }
}

/// A stack trace containing unsymbolicated stack frames.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct RawStacktrace {
    /// Where in the event this stack came from.
    #[serde(default)]
    pub id: StackId,

    /// The OS-dependent identifier of the thread.
    #[serde(default)]
    pub thread_id: Option<u64>,

    /// The mechanism of the exception owning this stack, in any accepted shape.
    #[serde(default)]
    pub mechanism: Option<RawMechanism>,

    /// A list of unsymbolicated stack frames.
    ///
    /// The first entry in the list is the active frame, with its callers below.
    pub frames: Vec<RawFrame>,
}

/// The declared format of an image.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    Apple,
    Macho,
    Elf,
    Pe,
    Symbolic,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ObjectType {
    pub fn is_apple(self) -> bool {
        matches!(self, ObjectType::Apple | ObjectType::Macho)
    }
}

/// Information on a debug information file.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RawObjectInfo {
    /// Platform image file type (container format).
    #[serde(rename = "type", default)]
    pub ty: ObjectType,

    /// Identifier of the image, usually a build UUID.
    #[serde(
        default,
        alias = "debug_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub uuid: Option<String>,

    /// Mach-O CPU type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_type: Option<u32>,

    /// Mach-O CPU subtype.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_subtype: Option<u32>,

    /// Explicit architecture name, such as `arm64` or `x86_64`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Absolute address at which the image was mounted into virtual memory.
    #[serde(default)]
    pub image_addr: HexValue,

    /// Preferred load address of the image in virtual memory, as declared in the headers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_vmaddr: Option<HexValue>,

    /// Size of the image in virtual memory.
    ///
    /// A missing or zero size extends the image up to the next image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<u64>,

    /// Path to the image at runtime.
    #[serde(
        default,
        alias = "code_file",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
}

/// Whether the symbol provider had usable information for an image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ObjectFileStatus {
    /// At least one frame of this image was symbolicated.
    Found,
    /// No frame referenced this image.
    #[default]
    Unused,
    /// The provider had no symbols for any frame of this image.
    Missing,
    /// The provider failed or timed out for a frame of this image.
    FetchingFailed,
}

impl ObjectFileStatus {
    /// Returns a name for this status, used as metric tag.
    pub fn name(self) -> &'static str {
        match self {
            ObjectFileStatus::Found => "found",
            ObjectFileStatus::Unused => "unused",
            ObjectFileStatus::Missing => "missing",
            ObjectFileStatus::FetchingFailed => "fetching_failed",
        }
    }
}

/// Normalized [`RawObjectInfo`] with status attached.
///
/// [`RawObjectInfo`] is what the user sends and [`CompleteObjectInfo`] is what the user
/// gets.
#[derive(Debug, Clone, Serialize, Eq, PartialEq, Deserialize)]
pub struct CompleteObjectInfo {
    /// Status of symbol lookups for this image.
    pub debug_status: ObjectFileStatus,

    /// Actual architecture of this image.
    pub arch: Arch,

    /// More information on the object file.
    #[serde(flatten)]
    pub raw: RawObjectInfo,
}

impl CompleteObjectInfo {
    /// The parsed image identifier, if it is a valid debug identifier.
    pub fn debug_id(&self) -> Option<DebugId> {
        self.raw.uuid.as_deref()?.parse().ok()
    }

    /// A stable identifier of this image across events.
    ///
    /// Images without a valid identifier cannot be told apart across builds and yield `None`.
    pub fn cache_id(&self) -> Option<String> {
        self.debug_id()
            .filter(|id| !id.is_nil())
            .map(|id| id.to_string())
    }

    /// The number of hex digits of a pointer on this image's architecture.
    pub fn pointer_width(&self) -> Option<usize> {
        self.arch.cpu_family().pointer_size().map(|bytes| bytes * 2)
    }

    /// Converts an absolute address into one relative to the image load address.
    ///
    /// Returns `None` if the address lies below the image.
    pub fn abs_to_rel_addr(&self, addr: u64) -> Option<u64> {
        addr.checked_sub(self.raw.image_addr.0)
    }
}

impl From<RawObjectInfo> for CompleteObjectInfo {
    fn from(mut raw: RawObjectInfo) -> Self {
        raw.uuid = raw.uuid.filter(|id| !id.is_empty());

        let arch = crate::symbolication::module_lookup::detect_arch(&raw);

        CompleteObjectInfo {
            debug_status: ObjectFileStatus::Unused,
            arch,
            raw,
        }
    }
}

/// Information about the SDK and operating system that produced an event.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SdkInfo {
    /// The debug format of the images, e.g. `macho`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsym_type: Option<String>,

    /// The operating system name, e.g. `iOS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdk_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_major: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_minor: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_patchlevel: Option<u32>,
}

impl SdkInfo {
    /// The full OS version, with missing components treated as `0`.
    ///
    /// Returns `None` if not even the major version is known.
    pub fn version(&self) -> Option<(u32, u32, u32)> {
        Some((
            self.version_major?,
            self.version_minor.unwrap_or(0),
            self.version_patchlevel.unwrap_or(0),
        ))
    }
}

/// Whether a frame's instruction address needs to be "adjusted" by subtracting a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustInstructionAddr {
    /// The frame's address needs to be adjusted.
    Yes,
    /// The frame's address does not need to be adjusted.
    No,
}

impl AdjustInstructionAddr {
    /// Returns the adjustment strategy for the given frame.
    ///
    /// If the frame has the [`adjust_instruction_addr`](RawFrame::adjust_instruction_addr)
    /// field set, this will be [`Yes`](Self::Yes) or [`No`](Self::No) accordingly. Otherwise
    /// frames found by stack scanning are adjusted, as their address is a return address.
    pub fn for_frame(frame: &RawFrame) -> Self {
        match frame.adjust_instruction_addr {
            Some(true) => Self::Yes,
            Some(false) => Self::No,
            None if frame.trust.is_scanned() => Self::Yes,
            None => Self::No,
        }
    }
}

/// A structured failure for input that cannot be symbolicated at all.
#[derive(Debug, Error)]
pub enum SymbolicationError {
    /// The event is not a JSON object of the expected shape.
    #[error("invalid event payload")]
    InvalidEvent(#[source] serde_json::Error),

    /// A frame could not be parsed.
    #[error("invalid frame {index} in {stack}")]
    InvalidFrame {
        stack: StackId,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}
