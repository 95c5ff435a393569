// SPDX-FileCopyrightText: 2026 Molarisse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand bodies. Each writes its user-facing output to `out`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use molarisse_config::MolarisseConfig;
use molarisse_core::{
    HealthStatus, MessagingTransport, MolarisseError, PartnerId, PluginAdapter, SessionStore,
};
use molarisse_http::HttpTransport;
use molarisse_sync::display_name::{display_name, placeholder};
use molarisse_sync::resource_cache::audio_mime_type;
use molarisse_sync::{JsonFileSessionStore, MemorySessionStore, SyncEngine};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::render;

/// Attachment requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    None,
    Image(PathBuf),
    Voice(PathBuf),
}

pub fn build_transport(config: &MolarisseConfig) -> Result<Arc<HttpTransport>, MolarisseError> {
    Ok(Arc::new(HttpTransport::new(config)?))
}

/// Engine over `transport`, with names persisted when configured.
pub fn build_engine(
    config: &MolarisseConfig,
    transport: Arc<dyn MessagingTransport>,
) -> SyncEngine {
    let session: Arc<dyn SessionStore> = match &config.session.store_path {
        Some(path) => {
            debug!(path = %path, "using file-backed name cache");
            Arc::new(JsonFileSessionStore::open(path))
        }
        None => Arc::new(MemorySessionStore::new()),
    };
    SyncEngine::from_config(config, transport, session)
}

fn write_err(e: std::io::Error) -> MolarisseError {
    MolarisseError::Internal(format!("failed to write output: {e}"))
}

/// `molarisse status`: probe the server. Unhealthy is an error; degraded
/// (reachable, credentials rejected) is reported but succeeds.
pub async fn status(
    transport: &dyn PluginAdapter,
    out: &mut impl Write,
) -> Result<HealthStatus, MolarisseError> {
    let health = transport.health_check().await?;
    writeln!(out, "{}: {}", transport.name(), render::health_line(&health)).map_err(write_err)?;
    match health {
        HealthStatus::Unhealthy(reason) => Err(MolarisseError::transport(reason)),
        other => Ok(other),
    }
}

/// `molarisse inbox [--filter Q]`
pub async fn inbox(
    engine: &SyncEngine,
    filter: Option<&str>,
    out: &mut impl Write,
) -> Result<(), MolarisseError> {
    engine.conversations.refresh_now().await?;
    let rows = match filter {
        Some(query) => engine.conversations.filter(query).await,
        None => engine.conversations.summaries().await,
    };

    if rows.is_empty() {
        writeln!(out, "no conversations").map_err(write_err)?;
    }
    for row in &rows {
        writeln!(out, "{}", render::summary_line(row)).map_err(write_err)?;
    }

    match engine.unread.refresh_now().await {
        Ok(count) => writeln!(out, "unread: {count}").map_err(write_err)?,
        Err(e) => warn!(error = %e, "unread count unavailable"),
    }
    Ok(())
}

/// `molarisse thread <partner>`
pub async fn thread(
    engine: &SyncEngine,
    partner: PartnerId,
    out: &mut impl Write,
) -> Result<(), MolarisseError> {
    engine.thread.open(partner).await;
    if engine.thread.messages().await.is_empty() {
        // The initial load swallows transport errors; ask again so they reach the user.
        engine.thread.refresh_now().await?;
    }
    print_thread(engine, partner, out).await
}

async fn print_thread(
    engine: &SyncEngine,
    partner: PartnerId,
    out: &mut impl Write,
) -> Result<(), MolarisseError> {
    let name = match engine.thread.profile().await {
        Some(profile) => {
            writeln!(out, "{}", render::profile_header(&profile)).map_err(write_err)?;
            display_name(&profile.name, profile.role)
        }
        None => placeholder(partner),
    };

    let messages = engine.thread.messages().await;
    if messages.is_empty() {
        writeln!(out, "no messages yet").map_err(write_err)?;
    }
    for message in &messages {
        writeln!(out, "{}", render::message_line(message, &name)).map_err(write_err)?;
    }
    Ok(())
}

async fn read_attachment(path: &Path) -> Result<Vec<u8>, MolarisseError> {
    tokio::fs::read(path).await.map_err(|e| {
        MolarisseError::Precondition(format!("cannot read {}: {e}", path.display()))
    })
}

/// `molarisse send <partner> [text] [--image PATH | --voice PATH]`
pub async fn send(
    engine: &SyncEngine,
    partner: PartnerId,
    text: &str,
    attachment: Attachment,
    out: &mut impl Write,
) -> Result<(), MolarisseError> {
    engine.thread.open(partner).await;

    let local_id = match &attachment {
        Attachment::None => engine.thread.send_text(text).await?,
        Attachment::Image(path) => {
            let bytes = read_attachment(path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "image.jpg".to_string());
            let mime = render::image_mime_type(&file_name);
            engine.thread.send_image(&file_name, mime, bytes, text).await?
        }
        Attachment::Voice(path) => {
            let bytes = read_attachment(path).await?;
            let mime = audio_mime_type(&path.to_string_lossy());
            engine.thread.send_voice(mime, bytes).await?
        }
    };
    info!(%partner, %local_id, "message sent");

    let messages = engine.thread.messages().await;
    match messages.iter().rev().find(|m| m.is_mine) {
        Some(sent) => writeln!(out, "{}", render::message_line(sent, "")).map_err(write_err)?,
        None => writeln!(out, "sent").map_err(write_err)?,
    }
    Ok(())
}

/// `molarisse watch [<partner>]`: poll until `cancel` fires, printing events.
pub async fn watch(
    engine: &SyncEngine,
    partner: Option<PartnerId>,
    cancel: CancellationToken,
    out: &mut impl Write,
) -> Result<(), MolarisseError> {
    let mut events = engine.events.subscribe();

    engine.conversations.load().await;
    for row in engine.conversations.summaries().await {
        writeln!(out, "{}", render::summary_line(&row)).map_err(write_err)?;
    }
    if let Some(partner) = partner {
        engine.thread.open(partner).await;
        print_thread(engine, partner, out).await?;
    }

    let pollers = engine.spawn_pollers(&cancel);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(line) = render::event_line(&event) {
                        writeln!(out, "{line}").map_err(write_err)?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    cancel.cancel();
    for handle in pollers {
        if let Err(e) = handle.await {
            warn!(error = %e, "poller task failed");
        }
    }
    info!("watch stopped");
    Ok(())
}
