use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use symbolicator_native::provider::{NoopProvider, SymbolProvider, SymbolTable};
use symbolicator_native::{Renderer, SymbolicationActor};

use crate::output::{print_compact, print_pretty};
use crate::settings::{OutputFormat, Settings};

pub async fn process_event(settings: Settings) -> Result<()> {
    let Settings {
        event,
        symbols,
        config,
        output_format,
    } = settings;

    let provider: Arc<dyn SymbolProvider> = match symbols {
        Some(path) => {
            let table = SymbolTable::from_path(&path)?;
            tracing::info!(images = table.len(), "loaded symbol table");
            Arc::new(table)
        }
        None => {
            tracing::warn!("no symbol table given, frames will not be resolved");
            Arc::new(NoopProvider)
        }
    };

    let payload = fs::read(&event)
        .with_context(|| format!("failed to read event {}", event.display()))?;
    let payload = serde_json::from_slice(&payload).context("event is not valid JSON")?;

    let symbolication = SymbolicationActor::new(provider, &config);
    tracing::info!(path = %event.display(), "symbolicating event");
    let response = symbolication
        .symbolicate_event(&payload)
        .await
        .context("failed to symbolicate event")?;

    match output_format {
        OutputFormat::Json => {
            let rendered = Renderer::new(symbolication.config()).render_response(&response);
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        OutputFormat::Pretty => print_pretty(response),
        OutputFormat::Compact => print_compact(response),
    }

    Ok(())
}
