//! Types shared between the symbolication crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A native platform, i.e. one whose frames carry instruction addresses into loaded images.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NativePlatform {
    Native,
    Cocoa,
    Objc,
    Swift,
    C,
    Cpp,
}

impl NativePlatform {
    pub fn as_str(self) -> &'static str {
        match self {
            NativePlatform::Native => "native",
            NativePlatform::Cocoa => "cocoa",
            NativePlatform::Objc => "objc",
            NativePlatform::Swift => "swift",
            NativePlatform::C => "c",
            NativePlatform::Cpp => "cpp",
        }
    }
}

/// The platform of an event or of a single frame.
///
/// Anything that is not a [`NativePlatform`] is kept verbatim, e.g. `javascript` or `java`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum Platform {
    Native(NativePlatform),
    Other(String),
}

impl Platform {
    /// Whether addresses of this platform should be resolved against loaded images.
    pub fn is_native(&self) -> bool {
        matches!(self, Platform::Native(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Platform::Native(native) => native.as_str(),
            Platform::Other(other) => other,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
