use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use symbolic::common::DebugId;
use symbolicator_service::utils::hex::HexValue;

use super::{ProviderError, SymbolProvider, SymbolRecord};
use crate::interface::{CompleteObjectInfo, FrameTrust, SdkInfo};

#[derive(Debug, Deserialize)]
struct RawSymbolTable {
    #[serde(default)]
    images: Vec<RawImageSymbols>,
}

#[derive(Debug, Deserialize)]
struct RawImageSymbols {
    #[serde(default, alias = "debug_id")]
    uuid: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    symbols: Vec<SymbolRange>,
}

/// Records for a range of addresses relative to the image load address.
#[derive(Debug, Clone, Deserialize)]
struct SymbolRange {
    start: HexValue,
    end: HexValue,
    #[serde(default)]
    frames: Vec<SymbolRecord>,
}

impl SymbolRange {
    fn contains(&self, rel_addr: u64) -> bool {
        self.start.0 <= rel_addr && rel_addr < self.end.0
    }
}

/// A [`SymbolProvider`] backed by a JSON table of symbols.
///
/// The table lists, per image, ranges of image-relative addresses and the records each range
/// resolves to:
///
/// ```json
/// {"images": [{
///     "uuid": "C05B4DDD-69A7-3840-A649-32180D341587",
///     "name": "SentryTest",
///     "symbols": [{"start": "0x10", "end": "0x14", "frames": [{"function": "real_main"}]}]
/// }]}
/// ```
///
/// Images are matched by their identifier, or by name when the table entry has no identifier.
/// A name matches either the full image path or its file name. Records are returned as they
/// are, except that the outermost record without a `symbol_addr` gets the absolute start of
/// its range.
#[derive(Debug, Default)]
pub struct SymbolTable {
    by_id: HashMap<DebugId, usize>,
    by_name: HashMap<String, usize>,
    images: Vec<Vec<SymbolRange>>,
}

impl SymbolTable {
    /// Parses a symbol table from JSON.
    pub fn from_slice(data: &[u8]) -> anyhow::Result<Self> {
        let raw: RawSymbolTable =
            serde_json::from_slice(data).context("failed to parse symbol table")?;
        Ok(Self::from_raw(raw))
    }

    /// Reads a symbol table from a JSON file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read symbol table {}", path.display()))?;
        Self::from_slice(&data)
    }

    fn from_raw(raw: RawSymbolTable) -> Self {
        let mut table = Self::default();

        for image in raw.images {
            let index = table.images.len();

            match image.uuid.as_deref().map(str::parse::<DebugId>) {
                Some(Ok(id)) => {
                    table.by_id.entry(id).or_insert(index);
                }
                Some(Err(_)) => {
                    tracing::warn!(uuid = ?image.uuid, "ignoring invalid image id in symbol table");
                }
                None => {}
            }
            if let Some(name) = image.name {
                table.by_name.entry(name).or_insert(index);
            }

            let mut symbols = image.symbols;
            symbols.sort_by_key(|range| range.start);
            table.images.push(symbols);
        }

        table
    }

    /// The number of images with symbols.
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn symbols_for(&self, image: &CompleteObjectInfo) -> Option<&[SymbolRange]> {
        let index = match image.debug_id() {
            Some(id) if self.by_id.contains_key(&id) => self.by_id.get(&id),
            _ => {
                let path = image.raw.name.as_deref()?;
                let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
                self.by_name
                    .get(path)
                    .or_else(|| self.by_name.get(file_name))
            }
        }?;
        self.images.get(*index).map(Vec::as_slice)
    }

    /// Looks up the records for an absolute address within `image`.
    pub fn lookup(&self, addr: u64, image: &CompleteObjectInfo) -> Vec<SymbolRecord> {
        let Some(symbols) = self.symbols_for(image) else {
            return Vec::new();
        };
        let Some(rel_addr) = image.abs_to_rel_addr(addr) else {
            return Vec::new();
        };

        let index = symbols.partition_point(|range| range.start.0 <= rel_addr);
        let Some(range) = index.checked_sub(1).and_then(|i| symbols.get(i)) else {
            return Vec::new();
        };
        if !range.contains(rel_addr) {
            return Vec::new();
        }

        let mut records = range.frames.clone();
        if let Some(outermost) = records.last_mut()
            && outermost.symbol_addr.is_none()
        {
            let start_addr = image.raw.image_addr.0.saturating_add(range.start.0);
            outermost.symbol_addr = Some(HexValue(start_addr));
        }
        records
    }
}

#[async_trait]
impl SymbolProvider for SymbolTable {
    async fn resolve_app_frame(
        &self,
        addr: u64,
        image: &CompleteObjectInfo,
        _sdk_info: Option<&SdkInfo>,
        _trust: FrameTrust,
    ) -> Result<Vec<SymbolRecord>, ProviderError> {
        Ok(self.lookup(addr, image))
    }

    async fn resolve_system_frame(
        &self,
        addr: u64,
        image: &CompleteObjectInfo,
        _sdk_info: Option<&SdkInfo>,
        _trust: FrameTrust,
    ) -> Result<Vec<SymbolRecord>, ProviderError> {
        Ok(self.lookup(addr, image))
    }
}
