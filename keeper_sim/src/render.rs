// Render requests queued by client-side maps.
//
// The sim never touches the scene graph. When a client map creates or
// destroys a building's visuals it queues a `RenderRequest`, and whatever
// frontend drains the `RenderReceiver` applies it on its own thread. Server
// maps never queue render requests.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::warn;

use crate::types::TileCoord;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderRequest {
    /// Show the visuals of `building` on one of its tiles.
    CreateBuilding { building: String, tile: TileCoord },
    /// Remove the visuals of `building` from one of its tiles.
    DestroyBuilding { building: String, tile: TileCoord },
}

pub fn render_channel() -> (RenderSender, RenderReceiver) {
    let (tx, rx) = mpsc::channel();
    (RenderSender { tx }, RenderReceiver { rx })
}

#[derive(Clone, Debug)]
pub struct RenderSender {
    tx: Sender<RenderRequest>,
}

impl RenderSender {
    pub fn queue(&self, request: RenderRequest) {
        if self.tx.send(request).is_err() {
            warn!("render receiver is gone, dropping request");
        }
    }
}

#[derive(Debug)]
pub struct RenderReceiver {
    rx: Receiver<RenderRequest>,
}

impl RenderReceiver {
    pub fn drain(&self) -> Vec<RenderRequest> {
        self.rx.try_iter().collect()
    }
}
