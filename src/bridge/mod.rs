//! Line-delimited JSON gateway to the platform adapter.
//!
//! The adapter owns the platform session: it classifies updates, resolves
//! handles to numeric ids and pushes administrator rosters. The bridge
//! feeds those frames into the [`Engine`] in arrival order and writes
//! removals, notices and command replies back.

mod frames;
mod transport;

pub use frames::{Inbound, Outbound, Reply, ReplyError, scope_of};
pub use transport::BridgeTransport;

use crate::engine::Engine;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

/// Longest accepted inbound line. A longer line ends the session.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Capacity of the outbound frame queue.
pub const OUTBOUND_QUEUE: usize = 1024;

/// Why [`Bridge::run_until`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stopped {
    /// The adapter closed its end of the pipe.
    InputClosed,
    /// The stop future resolved first.
    Interrupted,
}

pub struct Bridge {
    engine: Arc<Engine>,
    transport: Arc<BridgeTransport>,
}

impl Bridge {
    pub fn new(engine: Arc<Engine>, transport: Arc<BridgeTransport>) -> Self {
        Self { engine, transport }
    }

    /// Read frames until EOF. Malformed lines are logged and skipped.
    pub async fn run<R: AsyncRead + Unpin>(&self, reader: R) -> Result<(), LinesCodecError> {
        self.run_until(reader, std::future::pending()).await?;
        Ok(())
    }

    /// Read frames until EOF or until `stop` resolves.
    ///
    /// `stop` is only polled between frames, so a frame being handled
    /// always completes. A pending read is dropped on stop.
    pub async fn run_until<R, F>(&self, reader: R, stop: F) -> Result<Stopped, LinesCodecError>
    where
        R: AsyncRead + Unpin,
        F: Future<Output = ()>,
    {
        let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_FRAME_LEN));
        tokio::pin!(stop);

        loop {
            let line = tokio::select! {
                biased;
                () = &mut stop => {
                    info!("Bridge stopped");
                    return Ok(Stopped::Interrupted);
                }
                line = lines.next() => line,
            };
            let Some(line) = line else {
                break;
            };
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Inbound>(line) {
                Ok(frame) => self.handle_frame(frame).await,
                Err(e) => warn!(error = %e, "Malformed bridge frame"),
            }
        }

        info!("Bridge input closed");
        Ok(Stopped::InputClosed)
    }

    pub async fn handle_frame(&self, frame: Inbound) {
        debug!(?frame, "Bridge frame");
        let engine = &self.engine;
        let admin = &engine.admin;

        let reply = match frame {
            Inbound::Edit {
                actor,
                space,
                message,
            } => {
                engine.router.handle_edit(actor, space, message).await;
                return;
            }
            Inbound::Media {
                actor,
                space,
                message,
            } => {
                engine.router.handle_media(actor, space, message).await;
                return;
            }
            Inbound::SpaceRemoved { space } => {
                let cancelled = engine.router.handle_space_removed(space);
                self.transport.forget_space(space);
                info!(%space, cancelled, "Left space");
                return;
            }
            Inbound::Admins { space, admins } => {
                self.transport.update_roster(space, admins);
                return;
            }
            Inbound::Grant {
                id,
                invoker,
                space,
                identity,
            } => match admin.grant_exemption(invoker, scope_of(space), identity).await {
                Ok(()) => Reply::ok(id),
                Err(e) => Reply::failed(id, &e),
            },
            Inbound::Revoke {
                id,
                invoker,
                space,
                identity,
            } => match admin.revoke_exemption(invoker, scope_of(space), identity).await {
                Ok(existed) => Reply::ok(id).with_existed(existed),
                Err(e) => Reply::failed(id, &e),
            },
            Inbound::List { id, invoker, space } => {
                match admin.list_exemptions(invoker, scope_of(space)).await {
                    Ok(records) => Reply::ok(id).with_identities(&records),
                    Err(e) => Reply::failed(id, &e),
                }
            }
            Inbound::SetDelay {
                id,
                invoker,
                space,
                seconds,
            } => match admin.set_delay(invoker, space, seconds).await {
                Ok(secs) => Reply::ok(id).with_delay(secs),
                Err(e) => Reply::failed(id, &e),
            },
            Inbound::ResetDelay { id, invoker, space } => {
                match admin.reset_delay(invoker, space).await {
                    Ok(existed) => Reply::ok(id)
                        .with_existed(existed)
                        .with_delay(engine.delays.default_secs()),
                    Err(e) => Reply::failed(id, &e),
                }
            }
            Inbound::GetDelay { id, space } => Reply::ok(id).with_delay(admin.get_delay(space).await),
        };

        if let Err(e) = self.transport.send(Outbound::Reply(reply)).await {
            warn!(error = %e, "Failed to queue command reply");
        }
    }
}

/// Serialize outbound frames onto `writer` until every sender is dropped.
pub async fn write_frames<W: AsyncWrite + Unpin>(
    writer: W,
    mut frames: mpsc::Receiver<Outbound>,
) -> anyhow::Result<()> {
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(frame) = frames.recv().await {
        let line = serde_json::to_string(&frame)?;
        sink.send(line).await?;
    }
    Ok(())
}
