use std::sync::Arc;
use std::time::Duration;

use symbolic::common::{Arch, InstructionInfo};
use symbolicator_service::metric;
use symbolicator_service::types::Platform;
use symbolicator_service::utils::hex::HexValue;

use crate::caches::symbols::{SymbolCacheKey, SymbolCacheStore};
use crate::interface::{
    AdjustInstructionAddr, CompleteObjectInfo, FrameStatus, FrameTrust, RawFrame, SdkInfo,
    SymbolicatedFrame,
};
use crate::provider::{SymbolProvider, SymbolRecord};

use super::in_app;
use super::module_lookup::{ModuleLookup, ModuleLookupResult};

/// Addresses below this are never adjusted, as there is no preceding instruction to go back to.
const MIN_ADJUSTABLE_ADDR: u64 = 16;

/// Returns the address that is passed to the symbol provider for a frame.
///
/// Return addresses point past the call instruction, so they are moved back to the instruction
/// preceding them. An adjusted address never leaves the image it was found in.
pub fn get_caller_addr(
    addr: u64,
    image: &CompleteObjectInfo,
    arch: Arch,
    adjustment: AdjustInstructionAddr,
) -> u64 {
    match adjustment {
        AdjustInstructionAddr::No => addr,
        AdjustInstructionAddr::Yes if addr < MIN_ADJUSTABLE_ADDR => addr,
        AdjustInstructionAddr::Yes => {
            let caller_addr = InstructionInfo::new(arch, addr).previous_address();
            if caller_addr < image.raw.image_addr.0 {
                tracing::trace!(addr, "adjusted address underflows image");
                metric!(counter("relative_addr.underflow") += 1);
                addr
            } else {
                caller_addr
            }
        }
    }
}

/// Overlays a provider record onto the raw frame it was resolved from.
///
/// Fields the record leaves out keep the raw frame's value. The symbol address and variables
/// only apply to the outermost function, not its inlinees.
fn merge_record(
    frame: &RawFrame,
    record: &SymbolRecord,
    package: Option<&str>,
    is_outermost: bool,
) -> RawFrame {
    RawFrame {
        platform: frame.platform.clone(),
        instruction_addr: record.instruction_addr.or(frame.instruction_addr),
        adjust_instruction_addr: frame.adjust_instruction_addr,
        package: record
            .package
            .clone()
            .or_else(|| package.map(str::to_owned))
            .or_else(|| frame.package.clone()),
        symbol: record.symbol.clone().or_else(|| frame.symbol.clone()),
        symbol_addr: if is_outermost {
            record.symbol_addr.or(frame.symbol_addr)
        } else {
            record.symbol_addr
        },
        function: record.function.clone().or_else(|| frame.function.clone()),
        filename: record.filename.clone().or_else(|| frame.filename.clone()),
        abs_path: record.abs_path.clone().or_else(|| frame.abs_path.clone()),
        lineno: record.lineno.or(frame.lineno),
        colno: record.colno.or(frame.colno),
        in_app: frame.in_app,
        trust: frame.trust,
        vars: if is_outermost { frame.vars.clone() } else { None },
    }
}

/// Resolves the frames of one event.
///
/// The resolver only reads the images of the event. Frames of different stacks can be
/// resolved concurrently.
pub struct FrameResolver<'a> {
    pub modules: &'a ModuleLookup,
    pub provider: &'a dyn SymbolProvider,
    pub symbol_cache: Option<&'a dyn SymbolCacheStore>,
    pub sdk_info: Option<&'a SdkInfo>,
    /// The platform of the event, used for frames without their own.
    pub platform: Option<&'a Platform>,
    /// Upper bound for each call into the provider.
    pub timeout: Duration,
}

impl FrameResolver<'_> {
    /// Resolves one raw frame into one or more frames.
    ///
    /// Inlined functions expand to multiple frames, innermost first. Whatever goes wrong, at
    /// least one frame is returned.
    pub async fn resolve(&self, mut frame: RawFrame, index: usize) -> Vec<SymbolicatedFrame> {
        if frame.platform.as_ref().is_some_and(|platform| !platform.is_native()) {
            frame.in_app = frame.in_app.or(Some(true));
            return vec![SymbolicatedFrame {
                status: FrameStatus::Passthrough,
                original_index: Some(index),
                module_index: None,
                raw: frame,
            }];
        }

        if frame.platform.is_none() {
            frame.platform = self.platform.cloned();
        }

        let found = frame
            .instruction_addr
            .and_then(|addr| Some((addr, self.modules.find_image(addr.0)?)));

        let Some((addr, found)) = found else {
            frame.in_app = frame
                .in_app
                .or_else(|| Some(in_app::unmatched_frame_in_app(frame.package.as_deref())));
            return vec![SymbolicatedFrame {
                status: FrameStatus::UnknownImage,
                original_index: Some(index),
                module_index: None,
                raw: frame,
            }];
        };

        self.resolve_in_image(frame, index, addr, found).await
    }

    /// Resolves a frame that lies inside one of the event's images.
    ///
    /// Without an explicit flag, `in_app` follows the image alone. It stays set for frames of
    /// application images even when the provider fails or has no symbol for the address.
    async fn resolve_in_image(
        &self,
        mut frame: RawFrame,
        index: usize,
        addr: HexValue,
        found: ModuleLookupResult<'_>,
    ) -> Vec<SymbolicatedFrame> {
        let ModuleLookupResult {
            module_index,
            object_info,
        } = found;

        let is_app = in_app::is_app_image(&object_info.raw);
        frame.in_app = frame.in_app.or(Some(is_app));

        let adjustment = AdjustInstructionAddr::for_frame(&frame);
        let caller_addr = get_caller_addr(addr.0, object_info, object_info.arch, adjustment);
        tracing::trace!("Symbolicating {:#x}", caller_addr);

        let records = self
            .lookup_symbols(caller_addr, object_info, is_app, frame.trust)
            .await;

        let package = object_info.raw.name.as_deref();
        let status = match &records {
            Ok(records) if !records.is_empty() => {
                let last = records.len() - 1;
                return records
                    .iter()
                    .enumerate()
                    .map(|(i, record)| SymbolicatedFrame {
                        status: FrameStatus::Symbolicated,
                        original_index: Some(index),
                        module_index: Some(module_index),
                        raw: merge_record(&frame, record, package, i == last),
                    })
                    .collect();
            }
            Ok(_) => FrameStatus::MissingSymbol,
            Err(status) => *status,
        };

        if let Some(package) = package {
            frame.package = Some(package.to_owned());
        }

        vec![SymbolicatedFrame {
            status,
            original_index: Some(index),
            module_index: Some(module_index),
            raw: frame,
        }]
    }

    /// Asks the cache, and then the provider, for the records of an address.
    ///
    /// Provider errors and timeouts are logged and turned into [`FrameStatus::Missing`].
    async fn lookup_symbols(
        &self,
        addr: u64,
        image: &CompleteObjectInfo,
        is_app: bool,
        trust: FrameTrust,
    ) -> Result<Arc<[SymbolRecord]>, FrameStatus> {
        let cache_key = match (self.symbol_cache, image.cache_id()) {
            (Some(_), Some(image_id)) => Some(SymbolCacheKey {
                image_id: image_id.into(),
                image_addr: image.raw.image_addr.0,
                addr,
                trust,
            }),
            _ => None,
        };

        if let (Some(cache), Some(key)) = (self.symbol_cache, &cache_key) {
            if let Some(records) = cache.get(key) {
                metric!(counter("symbolcache.hit") += 1);
                return Ok(records);
            }
            metric!(counter("symbolcache.miss") += 1);
        }

        let provider_call = if is_app {
            self.provider
                .resolve_app_frame(addr, image, self.sdk_info, trust)
        } else {
            self.provider
                .resolve_system_frame(addr, image, self.sdk_info, trust)
        };

        let image_name = image.raw.name.as_deref().unwrap_or_default();
        let records: Arc<[SymbolRecord]> =
            match tokio::time::timeout(self.timeout, provider_call).await {
                Ok(Ok(records)) => records.into(),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, image = image_name, "symbol provider failed");
                    metric!(counter("symbolication.provider.errors") += 1);
                    return Err(FrameStatus::Missing);
                }
                Err(_) => {
                    tracing::warn!(
                        image = image_name,
                        timeout = ?self.timeout,
                        "symbol provider timed out"
                    );
                    metric!(counter("symbolication.provider.timeouts") += 1);
                    return Err(FrameStatus::Missing);
                }
            };

        if let (Some(cache), Some(key)) = (self.symbol_cache, cache_key) {
            cache.set(key, records.clone());
        }

        Ok(records)
    }
}
