//! The capability of resolving an address within an image into symbol records.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use symbolicator_service::utils::hex::HexValue;
use thiserror::Error;

use crate::interface::{CompleteObjectInfo, FrameTrust, SdkInfo};

mod symbol_table;

pub use symbol_table::SymbolTable;

/// One logical frame found for an address.
///
/// Any field left out keeps the value the raw frame already had.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abs_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colno: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_addr: Option<HexValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_addr: Option<HexValue>,
}

/// An error returned by a [`SymbolProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Reading debug information failed.
    #[error("failed to read debug information")]
    Io(#[from] std::io::Error),
    /// The debug information could not be understood.
    #[error("malformed debug information: {0}")]
    Malformed(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Resolves addresses into symbol records.
///
/// Results are ordered innermost to outermost: an address within inlined code yields one
/// record per inlined function followed by the function it was inlined into. An empty result
/// means nothing is known about the address.
#[async_trait]
pub trait SymbolProvider: Send + Sync {
    /// Resolves an address within one of the application's own images.
    async fn resolve_app_frame(
        &self,
        addr: u64,
        image: &CompleteObjectInfo,
        sdk_info: Option<&SdkInfo>,
        trust: FrameTrust,
    ) -> Result<Vec<SymbolRecord>, ProviderError>;

    /// Resolves an address within a system or third-party library.
    async fn resolve_system_frame(
        &self,
        _addr: u64,
        _image: &CompleteObjectInfo,
        _sdk_info: Option<&SdkInfo>,
        _trust: FrameTrust,
    ) -> Result<Vec<SymbolRecord>, ProviderError> {
        Ok(Vec::new())
    }
}

/// A provider that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

#[async_trait]
impl SymbolProvider for NoopProvider {
    async fn resolve_app_frame(
        &self,
        _addr: u64,
        _image: &CompleteObjectInfo,
        _sdk_info: Option<&SdkInfo>,
        _trust: FrameTrust,
    ) -> Result<Vec<SymbolRecord>, ProviderError> {
        Ok(Vec::new())
    }
}
