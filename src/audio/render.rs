//! The audio-thread side of the graph: routes each captured block through the
//! gate (or straight through), meters it, and pushes it into the output ring.

use super::host::StreamFormat;
use super::meter::{energy_db, LiveMeter};
use crate::gate::{AudioTransform, Passthrough};
use crossbeam_channel::{bounded, Receiver, Sender};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Frames handed to a processor per call; larger device blocks are split.
const RENDER_CHUNK_FRAMES: usize = 1_024;

/// State shared between the controller and the render callback.
#[derive(Debug)]
pub(crate) struct RenderShared {
    running: AtomicBool,
    bypassed: AtomicBool,
    blocks: AtomicU64,
    faulted_blocks: AtomicU64,
    dropped_samples: AtomicU64,
    meter: LiveMeter,
}

impl RenderShared {
    pub(crate) fn set_bypassed(&self, bypassed: bool) {
        self.bypassed.store(bypassed, Ordering::Release);
    }

    pub(crate) fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.running.store(false, Ordering::Release);
        self.meter.reset();
    }

    pub(crate) fn stats(&self) -> GraphStats {
        GraphStats {
            blocks: self.blocks.load(Ordering::Relaxed),
            faulted_blocks: self.faulted_blocks.load(Ordering::Relaxed),
            dropped_samples: self.dropped_samples.load(Ordering::Relaxed),
        }
    }
}

/// Counters for observability. Values only grow while a graph is alive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub blocks: u64,
    pub faulted_blocks: u64,
    pub dropped_samples: u64,
}

/// Callback-owned routing node.
pub(crate) struct RenderNode {
    shared: Arc<RenderShared>,
    processor: Option<Box<dyn AudioTransform>>,
    bypass: Passthrough,
    installs: Receiver<Box<dyn AudioTransform>>,
    output: HeapProd<f32>,
    scratch: Vec<f32>,
    channels: usize,
}

impl RenderNode {
    pub(crate) fn render(&mut self, input: &[f32]) {
        if !self.shared.running.load(Ordering::Acquire) {
            return;
        }
        if let Ok(processor) = self.installs.try_recv() {
            self.processor = Some(processor);
        }
        if input.is_empty() {
            return;
        }

        let bypassed = self.shared.is_bypassed();
        let chunk_len = self.scratch.len();
        let mut faulted = false;
        let mut sum_squares = 0.0f32;
        let mut dropped = 0usize;

        for chunk in input.chunks(chunk_len) {
            let out = &mut self.scratch[..chunk.len()];
            let result = match self.processor.as_mut() {
                Some(processor) if !bypassed => processor.process(chunk, out, self.channels),
                _ => self.bypass.process(chunk, out, self.channels),
            };
            if let Err(fault) = result {
                faulted = true;
                if !fault.output_written() {
                    out.copy_from_slice(chunk);
                }
            }
            sum_squares += out.iter().map(|s| s * s).sum::<f32>();
            dropped += chunk.len() - self.output.push_slice(out);
        }

        self.shared
            .meter
            .set_db(energy_db(sum_squares, input.len()));
        self.shared.blocks.fetch_add(1, Ordering::Relaxed);
        if faulted {
            self.shared.faulted_blocks.fetch_add(1, Ordering::Relaxed);
        }
        if dropped > 0 {
            self.shared
                .dropped_samples
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }
}

/// Read-only handle on the cleaned stream.
///
/// Holders can read samples and observe the stream, but have no path back to
/// the graph that produces it.
pub struct ProcessedStream {
    consumer: HeapCons<f32>,
    format: StreamFormat,
    shared: Arc<RenderShared>,
}

impl ProcessedStream {
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Copy up to `buf.len()` interleaved samples; returns how many were copied.
    pub fn read(&mut self, buf: &mut [f32]) -> usize {
        self.consumer.pop_slice(buf)
    }

    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// False once the graph that feeds this stream has been torn down.
    pub fn is_live(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn volume(&self) -> f32 {
        self.shared.meter.volume()
    }
}

/// Pieces of a freshly built context, before the node is handed to the device.
pub(crate) struct RenderParts {
    pub(crate) shared: Arc<RenderShared>,
    pub(crate) installs: Sender<Box<dyn AudioTransform>>,
    pub(crate) node: RenderNode,
    pub(crate) stream: ProcessedStream,
}

/// Build a context that starts on the bypass route.
pub(crate) fn render_parts(
    format: StreamFormat,
    capacity_samples: usize,
    meter: LiveMeter,
) -> RenderParts {
    let channels = format.channel_count();
    let shared = Arc::new(RenderShared {
        running: AtomicBool::new(true),
        bypassed: AtomicBool::new(true),
        blocks: AtomicU64::new(0),
        faulted_blocks: AtomicU64::new(0),
        dropped_samples: AtomicU64::new(0),
        meter,
    });
    let (installs, install_rx) = bounded(1);
    let (producer, consumer) = HeapRb::<f32>::new(capacity_samples.max(channels)).split();
    RenderParts {
        node: RenderNode {
            shared: shared.clone(),
            processor: None,
            bypass: Passthrough,
            installs: install_rx,
            output: producer,
            scratch: vec![0.0; RENDER_CHUNK_FRAMES * channels],
            channels,
        },
        stream: ProcessedStream {
            consumer,
            format,
            shared: shared.clone(),
        },
        shared,
        installs,
    }
}
