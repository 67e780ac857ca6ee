//! Normalization of exception mechanisms.
//!
//! Clients report the low-level fault that terminated a process either in the current shape
//! (`{type, meta: {signal, mach_exception, errno}}`) or in the legacy shape
//! (`{posix_signal, mach_exception}`). Both are turned into one canonical [`Mechanism`] with
//! numeric codes expanded into names.

use serde::{Deserialize, Deserializer, Serialize};

use crate::interface::SdkInfo;

pub use super::codes::OsHint;
use super::codes::mach_exception_name;

const GENERIC: &str = "generic";

fn generic() -> String {
    GENERIC.to_owned()
}

/// Deserializes an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_type<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(generic))
}

/// A signal that terminated the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMeta {
    pub number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,
}

/// A Mach exception raised by the kernel on Apple platforms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachExceptionMeta {
    pub exception: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subcode: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// An error number set by a failing system call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrnoMeta {
    pub number: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Operating system specific details of a mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MechanismMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mach_exception: Option<MachExceptionMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errno: Option<ErrnoMeta>,
}

impl MechanismMeta {
    pub fn is_empty(&self) -> bool {
        self.signal.is_none() && self.mach_exception.is_none() && self.errno.is_none()
    }

    /// Fills in names that are missing, leaving the given ones untouched.
    fn expand_names(&mut self, os: OsHint) {
        if let Some(signal) = &mut self.signal {
            if signal.name.is_none() {
                signal.name = os.signal_name(signal.number).map(str::to_owned);
            }
            if signal.code_name.is_none()
                && let Some(code) = signal.code
            {
                signal.code_name = os.signal_code_name(signal.number, code).map(str::to_owned);
            }
        }

        if let Some(exception) = &mut self.mach_exception
            && exception.name.is_none()
        {
            exception.name = mach_exception_name(exception.exception).map(str::to_owned);
        }

        if let Some(errno) = &mut self.errno
            && errno.name.is_none()
        {
            errno.name = os.errno_name(errno.number).map(str::to_owned);
        }
    }
}

/// The canonical description of the fault that produced an exception.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mechanism {
    /// The kind of mechanism, e.g. `mach` or `signalhandler`. `generic` if unknown.
    #[serde(rename = "type", default = "generic", deserialize_with = "deserialize_type")]
    pub ty: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_link: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: MechanismMeta,
}

impl Mechanism {
    /// A `generic` mechanism without any details.
    pub fn generic() -> Self {
        Self {
            ty: generic(),
            handled: None,
            synthetic: None,
            description: None,
            help_link: None,
            meta: MechanismMeta::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyPosixSignal {
    pub signal: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMachException {
    pub exception: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subcode: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_name: Option<String>,
}

/// A mechanism in the legacy `{posix_signal, mach_exception}` shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyMechanism {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posix_signal: Option<LegacyPosixSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mach_exception: Option<LegacyMachException>,
}

impl From<LegacyMechanism> for Mechanism {
    fn from(legacy: LegacyMechanism) -> Self {
        let signal = legacy.posix_signal.map(|signal| SignalMeta {
            number: signal.signal,
            code: signal.code,
            name: signal.name,
            code_name: signal.code_name,
        });
        let mach_exception = legacy.mach_exception.map(|exception| MachExceptionMeta {
            exception: exception.exception,
            code: exception.code,
            subcode: exception.subcode,
            name: exception.exception_name,
        });

        Mechanism {
            meta: MechanismMeta {
                signal,
                mach_exception,
                errno: None,
            },
            ..Mechanism::generic()
        }
    }
}

/// A mechanism as found in an event.
///
/// Deserialization never fails: input of an unrecognizable shape is kept as
/// [`Malformed`](Self::Malformed).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawMechanism {
    Current(Mechanism),
    Legacy(LegacyMechanism),
    Malformed(serde_json::Value),
}

impl RawMechanism {
    /// Determines the shape of a mechanism from the fields present.
    pub fn from_value(value: serde_json::Value) -> Self {
        let Some(map) = value.as_object() else {
            return RawMechanism::Malformed(value);
        };

        let is_legacy = !map.contains_key("meta")
            && (map.contains_key("posix_signal") || map.contains_key("mach_exception"));
        let is_current = map.contains_key("meta") || map.contains_key("type");

        if is_legacy {
            match serde_json::from_value(value.clone()) {
                Ok(legacy) => RawMechanism::Legacy(legacy),
                Err(_) => RawMechanism::Malformed(value),
            }
        } else if is_current {
            match serde_json::from_value(value.clone()) {
                Ok(current) => RawMechanism::Current(current),
                Err(_) => RawMechanism::Malformed(value),
            }
        } else {
            RawMechanism::Malformed(value)
        }
    }
}

impl<'de> Deserialize<'de> for RawMechanism {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(RawMechanism::from_value)
    }
}

impl From<Mechanism> for RawMechanism {
    fn from(mechanism: Mechanism) -> Self {
        RawMechanism::Current(mechanism)
    }
}

impl OsHint {
    /// Derives the signal numbering from the SDK that sent an event.
    ///
    /// Defaults to Darwin, also when the SDK is unknown.
    pub fn from_sdk_info(sdk_info: Option<&SdkInfo>) -> Self {
        let Some(sdk_info) = sdk_info else {
            return OsHint::default();
        };

        match sdk_info.sdk_name.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("linux" | "android") => OsHint::Linux,
            Some("ios" | "ipados" | "macos" | "mac os x" | "tvos" | "watchos" | "visionos") => {
                OsHint::Darwin
            }
            _ => match sdk_info.dsym_type.as_deref() {
                Some("elf") => OsHint::Linux,
                _ => OsHint::default(),
            },
        }
    }
}

/// Normalizes a mechanism using Darwin numbering.
pub fn classify(raw: RawMechanism) -> Mechanism {
    classify_for(raw, OsHint::default())
}

/// Normalizes a mechanism into its canonical form.
///
/// Legacy and malformed input classify as `generic`. Names that are present in the input are
/// preserved, missing ones are looked up by number. Unknown numbers leave the name absent.
pub fn classify_for(raw: RawMechanism, os: OsHint) -> Mechanism {
    let mut mechanism = match raw {
        RawMechanism::Current(mechanism) => mechanism,
        RawMechanism::Legacy(legacy) => legacy.into(),
        RawMechanism::Malformed(value) => {
            tracing::debug!(%value, "unrecognized mechanism shape");
            Mechanism::generic()
        }
    };

    mechanism.meta.expand_names(os);
    mechanism
}
