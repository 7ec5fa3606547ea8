//! Optional library watcher: debounces filesystem events under the library
//! root and triggers the refresh pipeline.

use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{event::ModifyKind, Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::carousel::Carousel;
use crate::config::Configuration;
use crate::scan;

/// Watch the configured library root until cancelled, rebuilding the
/// catalog after each quiet window that follows a relevant change.
pub async fn watch_library(
    carousel: Carousel,
    config: Arc<Configuration>,
    cancel: CancellationToken,
) -> Result<()> {
    // Tokens, not events: any arrival within a window means one rebuild.
    let (tx, mut rx) = mpsc::channel::<()>(8);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if is_relevant(&event) {
                let _ = tx.try_send(());
            }
        }
        Err(err) => warn!(error = %err, "library watch error"),
    })
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(&config.library_path, RecursiveMode::Recursive)
        .with_context(|| {
            format!("failed to watch library at {}", config.library_path.display())
        })?;
    info!(
        path = %config.library_path.display(),
        debounce = %humantime::format_duration(config.watch_debounce),
        "watching library for changes"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            token = rx.recv() => {
                if token.is_none() {
                    break;
                }
                // Absorb further events until the debounce window stays quiet.
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(config.watch_debounce) => break,
                        more = rx.recv() => {
                            if more.is_none() {
                                break;
                            }
                        }
                    }
                }
                if let Err(err) = scan::rebuild_catalog(&carousel, &config).await {
                    warn!(error = %err, "watch-triggered rebuild failed");
                }
            }
        }
    }
    Ok(())
}

fn is_relevant(event: &Event) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(ModifyKind::Name(_) | ModifyKind::Data(_))
    );
    // Extension-less paths are directories being created, renamed, removed.
    kind_matters
        && event
            .paths
            .iter()
            .any(|p| p.extension().is_none() || scan::is_supported_image(p))
}
