use std::sync::Arc;

use futures::future;
use serde_json::Value;
use symbolicator_service::config::{Config, SymbolicationConfig};

use crate::caches::symbols::{SymbolCache, SymbolCacheStore};
use crate::interface::{
    CompleteObjectInfo, CompleteStacktrace, CompletedSymbolicationResponse, FrameStatus,
    ObjectFileStatus, RawStacktrace, SymbolicateStacktraces, SymbolicationError,
};
use crate::metrics::{StacktraceMetrics, record_symbolication_metrics};
use crate::provider::SymbolProvider;

use super::mechanism::{OsHint, classify_for};
use super::module_lookup::ModuleLookup;
use super::native::FrameResolver;

/// Turns raw events into symbolicated backtraces.
///
/// The actor is cheap to clone and can serve concurrent requests. The symbol cache, if enabled,
/// is shared by all clones.
#[derive(Clone)]
pub struct SymbolicationActor {
    provider: Arc<dyn SymbolProvider>,
    symbol_cache: Option<Arc<dyn SymbolCacheStore>>,
    config: SymbolicationConfig,
}

impl std::fmt::Debug for SymbolicationActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolicationActor")
            .field("symbol_cache", &self.symbol_cache.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl SymbolicationActor {
    pub fn new(provider: Arc<dyn SymbolProvider>, config: &Config) -> Self {
        let symbol_cache = SymbolCache::new(&config.caches.symbols)
            .map(|cache| Arc::new(cache) as Arc<dyn SymbolCacheStore>);

        SymbolicationActor {
            provider,
            symbol_cache,
            config: config.symbolication.clone(),
        }
    }

    /// Replaces the symbol cache, or disables it with `None`.
    pub fn with_symbol_cache(mut self, symbol_cache: Option<Arc<dyn SymbolCacheStore>>) -> Self {
        self.symbol_cache = symbol_cache;
        self
    }

    pub fn config(&self) -> &SymbolicationConfig {
        &self.config
    }

    /// Parses and symbolicates an event payload.
    pub async fn symbolicate_event(
        &self,
        event: &Value,
    ) -> Result<CompletedSymbolicationResponse, SymbolicationError> {
        let request = SymbolicateStacktraces::from_event(event)?;
        Ok(self.symbolicate(request).await)
    }

    #[tracing::instrument(skip_all)]
    pub async fn symbolicate(
        &self,
        request: SymbolicateStacktraces,
    ) -> CompletedSymbolicationResponse {
        let SymbolicateStacktraces {
            platform,
            sdk_info,
            stacktraces,
            modules,
        } = request;

        let module_lookup = ModuleLookup::new(modules.into_iter().map(CompleteObjectInfo::from));
        let os = OsHint::from_sdk_info(sdk_info.as_ref());

        let resolver = FrameResolver {
            modules: &module_lookup,
            provider: self.provider.as_ref(),
            symbol_cache: self.symbol_cache.as_deref(),
            sdk_info: sdk_info.as_ref(),
            platform: platform.as_ref(),
            timeout: self.config.provider_timeout,
        };

        let stacktraces = future::join_all(
            stacktraces
                .into_iter()
                .map(|trace| symbolicate_stacktrace(&resolver, trace, os)),
        )
        .await;

        let mut metrics = StacktraceMetrics::default();
        for trace in &stacktraces {
            metrics.record_stacktrace(trace);
        }

        // bring modules back into the original order
        let mut modules = module_lookup.into_inner();
        update_debug_status(&mut modules, &stacktraces);

        record_symbolication_metrics(platform.as_ref(), &metrics, &modules, &stacktraces);

        CompletedSymbolicationResponse {
            stacktraces,
            modules,
        }
    }
}

async fn symbolicate_stacktrace(
    resolver: &FrameResolver<'_>,
    trace: RawStacktrace,
    os: OsHint,
) -> CompleteStacktrace {
    let RawStacktrace {
        id,
        thread_id,
        mechanism,
        frames: raw_frames,
    } = trace;

    let mut frames = Vec::with_capacity(raw_frames.len());
    for (index, frame) in raw_frames.into_iter().enumerate() {
        frames.extend(resolver.resolve(frame, index).await);
    }

    CompleteStacktrace {
        id,
        thread_id,
        mechanism: mechanism.map(|mechanism| classify_for(mechanism, os)),
        frames,
    }
}

/// Derives the status of each image from the outcome of the frames that hit it.
///
/// A single symbolicated frame makes an image `found`. Otherwise provider failures take
/// precedence over missing symbols.
fn update_debug_status(modules: &mut [CompleteObjectInfo], stacktraces: &[CompleteStacktrace]) {
    let frames = stacktraces.iter().flat_map(|trace| trace.frames.iter());
    for frame in frames {
        let Some(module) = frame.module_index.and_then(|i| modules.get_mut(i)) else {
            continue;
        };

        let status = match frame.status {
            FrameStatus::Symbolicated => ObjectFileStatus::Found,
            FrameStatus::Missing => ObjectFileStatus::FetchingFailed,
            FrameStatus::MissingSymbol => ObjectFileStatus::Missing,
            FrameStatus::UnknownImage | FrameStatus::Passthrough => continue,
        };

        if status_rank(status) > status_rank(module.debug_status) {
            module.debug_status = status;
        }
    }
}

fn status_rank(status: ObjectFileStatus) -> u8 {
    match status {
        ObjectFileStatus::Unused => 0,
        ObjectFileStatus::Missing => 1,
        ObjectFileStatus::FetchingFailed => 2,
        ObjectFileStatus::Found => 3,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use symbolicator_service::utils::hex::HexValue;

    use super::*;
    use crate::interface::{
        FrameTrust, RawFrame, RawObjectInfo, SdkInfo, StackId, SymbolicatedFrame,
    };
    use crate::provider::{NoopProvider, ProviderError, SymbolRecord};

    struct MainProvider;

    #[async_trait]
    impl SymbolProvider for MainProvider {
        async fn resolve_app_frame(
            &self,
            addr: u64,
            _image: &CompleteObjectInfo,
            _sdk_info: Option<&SdkInfo>,
            _trust: FrameTrust,
        ) -> Result<Vec<SymbolRecord>, ProviderError> {
            if addr == 0x1000 {
                return Err(ProviderError::Malformed("broken".into()));
            }
            Ok(vec![SymbolRecord {
                function: Some("main".into()),
                ..Default::default()
            }])
        }
    }

    fn request() -> SymbolicateStacktraces {
        let modules = serde_json::from_value(serde_json::json!([
            {"type": "elf", "image_addr": "0x1000", "image_size": 4096, "name": "/opt/app/bin/app"},
            {"type": "elf", "image_addr": "0x8000", "image_size": 4096, "name": "/opt/app/lib/libunused.so"},
        ]))
        .unwrap();

        let frame = |addr| RawFrame {
            instruction_addr: Some(HexValue(addr)),
            ..Default::default()
        };

        SymbolicateStacktraces {
            platform: None,
            sdk_info: None,
            stacktraces: vec![
                RawStacktrace {
                    id: StackId::Exception(0),
                    frames: vec![frame(0x1010), frame(0x1000)],
                    ..Default::default()
                },
                RawStacktrace {
                    id: StackId::Thread(0),
                    thread_id: Some(7),
                    frames: vec![frame(0x20)],
                    ..Default::default()
                },
            ],
            modules,
        }
    }

    #[tokio::test]
    async fn test_symbolicate_keeps_order() {
        let actor = SymbolicationActor::new(Arc::new(MainProvider), &Config::default());
        let response = actor.symbolicate(request()).await;

        assert_eq!(response.stacktraces.len(), 2);
        let exception = &response.stacktraces[0];
        assert_eq!(exception.id, StackId::Exception(0));
        let statuses: Vec<_> = exception.frames.iter().map(|f| f.status).collect();
        assert_eq!(statuses, [FrameStatus::Symbolicated, FrameStatus::Missing]);

        let thread = response.stacktrace(StackId::Thread(0)).unwrap();
        assert_eq!(thread.thread_id, Some(7));
        assert_eq!(thread.frames[0].status, FrameStatus::UnknownImage);

        assert_eq!(response.modules[0].debug_status, ObjectFileStatus::Found);
        assert_eq!(response.modules[1].debug_status, ObjectFileStatus::Unused);
    }

    #[tokio::test]
    async fn test_debug_status_without_symbols() {
        let actor = SymbolicationActor::new(Arc::new(NoopProvider), &Config::default());
        let mut request = request();
        request.stacktraces.truncate(1);
        request.stacktraces[0].frames.truncate(1);

        let response = actor.symbolicate(request).await;
        assert_eq!(
            response.stacktraces[0].frames[0].status,
            FrameStatus::MissingSymbol
        );
        assert_eq!(response.modules[0].debug_status, ObjectFileStatus::Missing);
    }

    #[tokio::test]
    async fn test_empty_request() {
        let actor = SymbolicationActor::new(Arc::new(NoopProvider), &Config::default())
            .with_symbol_cache(None);
        let response = actor.symbolicate(SymbolicateStacktraces::default()).await;
        assert!(response.stacktraces.is_empty());
        assert!(response.modules.is_empty());
    }

    #[test]
    fn test_status_precedence() {
        let mut modules = vec![CompleteObjectInfo::from(RawObjectInfo::default())];
        let frame = |status| SymbolicatedFrame {
            status,
            original_index: Some(0),
            module_index: Some(0),
            raw: RawFrame::default(),
        };
        let stacktraces = vec![CompleteStacktrace {
            frames: vec![frame(FrameStatus::MissingSymbol), frame(FrameStatus::Missing)],
            ..Default::default()
        }];

        update_debug_status(&mut modules, &stacktraces);
        assert_eq!(modules[0].debug_status, ObjectFileStatus::FetchingFailed);
    }
}
