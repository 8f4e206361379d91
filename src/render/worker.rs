//! Renderer thread and its mailbox.
//!
//! One thread per track. The thread blocks on its mailbox, then drains every
//! message already queued before rendering, so a burst of `SetScale`/`Resize`
//! collapses into a single render of the latest state.
//!
//! Each result carries the sequence number of the last message it reflects
//! and the id of the renderer that produced it; the canvas uses both to drop
//! stale frames.

use crossbeam_channel::{Receiver, Sender, unbounded};
use image::RgbaImage;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

use super::track_renderer::{RenderError, RenderMessage, TrackRenderer};
use crate::entities::track::TrackId;

/// Rasterized frame posted back to the interactive thread
#[derive(Debug, Clone)]
pub struct RenderResult {
    pub track_id: TrackId,
    pub renderer_id: Uuid,
    pub seq: u64,
    pub image: RgbaImage,
    pub visible: usize,
    pub skipped: usize,
    pub elapsed: Duration,
}

struct Envelope {
    seq: u64,
    msg: RenderMessage,
}

/// Interactive-side handle to a renderer thread.
///
/// Dropping the handle destroys the renderer.
pub struct RendererHandle {
    id: Uuid,
    track_id: TrackId,
    next_seq: u64,
    tx: Option<Sender<Envelope>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RendererHandle {
    /// Spawn a renderer thread posting results to `results`
    pub fn spawn(track_id: TrackId, results: Sender<RenderResult>) -> anyhow::Result<Self> {
        let id = Uuid::new_v4();
        let (tx, rx) = unbounded::<Envelope>();
        let thread_track = track_id.clone();
        let thread = thread::Builder::new()
            .name(format!("frameline-render-{}", track_id))
            .spawn(move || run(thread_track, id, rx, results))?;
        log::debug!("Renderer '{}' spawned ({})", track_id, id);
        Ok(Self {
            id,
            track_id,
            next_seq: 0,
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn track_id(&self) -> &TrackId {
        &self.track_id
    }

    /// Sequence number of the last message sent (0 = none yet)
    pub fn last_seq(&self) -> u64 {
        self.next_seq
    }

    pub fn is_destroyed(&self) -> bool {
        self.tx.is_none()
    }

    /// Fire-and-forget. Returns the message's sequence number.
    pub fn send(&mut self, msg: RenderMessage) -> Result<u64, RenderError> {
        let tx = self.tx.as_ref().ok_or(RenderError::Destroyed)?;
        let seq = self.next_seq + 1;
        tx.send(Envelope { seq, msg })
            .map_err(|_| RenderError::Disconnected)?;
        self.next_seq = seq;
        Ok(seq)
    }

    /// Stop the thread and wait for it. Idempotent.
    pub fn destroy(&mut self) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        let _ = tx.send(Envelope {
            seq: self.next_seq,
            msg: RenderMessage::Destroy,
        });
        drop(tx);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Renderer '{}' thread panicked", self.track_id);
            }
        }
        log::debug!("Renderer '{}' destroyed ({})", self.track_id, self.id);
    }
}

impl Drop for RendererHandle {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn run(track_id: TrackId, renderer_id: Uuid, rx: Receiver<Envelope>, results: Sender<RenderResult>) {
    let mut renderer = TrackRenderer::new(track_id.clone());
    log::trace!("Renderer '{}' thread started", track_id);

    // Block for the first message, then take whatever else is queued
    while let Ok(first) = rx.recv() {
        let batch: Vec<Envelope> = std::iter::once(first).chain(rx.try_iter()).collect();
        let count = batch.len();
        let mut seq = 0;
        let mut dirty = false;
        for env in batch {
            seq = env.seq;
            match renderer.apply(env.msg) {
                Ok(needs_render) => dirty |= needs_render,
                Err(e) => log::debug!("Renderer '{}': {}", track_id, e),
            }
            if renderer.is_destroyed() {
                break;
            }
        }
        if renderer.is_destroyed() {
            break;
        }
        if count > 1 {
            log::trace!("Renderer '{}': coalesced {} messages", track_id, count);
        }
        if !dirty {
            continue;
        }
        let Some(out) = renderer.render() else {
            continue;
        };
        let result = RenderResult {
            track_id: track_id.clone(),
            renderer_id,
            seq,
            image: out.image,
            visible: out.visible,
            skipped: out.skipped,
            elapsed: out.elapsed,
        };
        if results.send(result).is_err() {
            log::debug!("Renderer '{}': result channel closed", track_id);
            break;
        }
    }

    renderer.destroy();
    log::trace!("Renderer '{}' thread stopped", track_id);
}
