//! Graph controller: owns the microphone and the processing context for one
//! session, and decides whether audio flows through the gate or around it.
//!
//! Every resource is held by a guard that releases it on drop, so an `enable()`
//! that fails or is cancelled partway through gives back exactly what it took.

use super::host::{AudioHost, CaptureConstraints, CaptureDevice, StreamFormat};
use super::meter::LiveMeter;
use super::registry::{ProcessorContext, ProcessorRegistry};
use super::render::{render_parts, GraphStats, ProcessedStream, RenderParts, RenderShared};
use crate::error::GateError;
use crate::gate::{
    AudioTransform, ParameterSet, ProcessorOptions, SharedParameters, NOISE_GATE_PROCESSOR,
};
use crate::log_debug;
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

pub const DEFAULT_STREAM_CAPACITY_MS: u64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Uninitialized,
    Initializing,
    Active { bypassed: bool },
    Failed,
    TornDown,
}

impl GraphState {
    pub fn label(&self) -> &'static str {
        match self {
            GraphState::Uninitialized => "uninitialized",
            GraphState::Initializing => "initializing",
            GraphState::Active { bypassed: false } => "active",
            GraphState::Active { bypassed: true } => "active (bypassed)",
            GraphState::Failed => "failed",
            GraphState::TornDown => "torn down",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, GraphState::Active { .. })
    }
}

#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub constraints: CaptureConstraints,
    pub processor_name: String,
    pub stream_capacity_ms: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            constraints: CaptureConstraints::default(),
            processor_name: NOISE_GATE_PROCESSOR.to_string(),
            stream_capacity_ms: DEFAULT_STREAM_CAPACITY_MS,
        }
    }
}

/// Lets another thread abort an in-flight `enable()` at its next step.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// The acquired microphone; stops its tracks when dropped.
struct DeviceCapture {
    device: Box<dyn CaptureDevice>,
    label: String,
}

impl DeviceCapture {
    fn acquire(
        host: &dyn AudioHost,
        constraints: &CaptureConstraints,
    ) -> Result<Self, GateError> {
        let device = host.open_capture(constraints)?;
        let label = device.label();
        log_debug(&format!("acquired capture device '{label}' via {}", host.name()));
        Ok(Self { device, label })
    }
}

impl Drop for DeviceCapture {
    fn drop(&mut self) {
        self.device.stop();
    }
}

/// Control-side half of the render context; closes it when dropped.
struct ProcessingContext {
    shared: Arc<RenderShared>,
    installs: Sender<Box<dyn AudioTransform>>,
    format: StreamFormat,
}

impl ProcessingContext {
    fn install(&self, processor: Box<dyn AudioTransform>) -> Result<(), GateError> {
        let name = processor.name();
        self.installs
            .try_send(processor)
            .map_err(|_| GateError::ProcessorLoadFailure {
                name: name.to_string(),
                reason: "render context refused the processor".to_string(),
            })
    }
}

impl Drop for ProcessingContext {
    fn drop(&mut self) {
        self.shared.close();
    }
}

/// Everything one enabled session holds. Fields drop in order: the device
/// first so no callback outlives the context.
struct GraphHandle {
    device: DeviceCapture,
    context: ProcessingContext,
    processor: Option<&'static str>,
    warning: Option<GateError>,
}

impl Drop for GraphHandle {
    fn drop(&mut self) {
        self.device.device.stop();
        self.context.shared.close();
        log_debug(&format!("audio graph on '{}' released", self.device.label));
    }
}

pub struct AudioGraphController {
    host: Box<dyn AudioHost>,
    registry: ProcessorRegistry,
    settings: GraphSettings,
    parameters: Arc<SharedParameters>,
    meter: LiveMeter,
    cancel: CancelHandle,
    state: GraphState,
    graph: Option<GraphHandle>,
    stream_ready: Option<Box<dyn FnMut(ProcessedStream)>>,
    pending_stream: Option<ProcessedStream>,
    last_error: Option<GateError>,
    reported_faults: u64,
}

impl AudioGraphController {
    pub fn new(
        host: Box<dyn AudioHost>,
        registry: ProcessorRegistry,
        settings: GraphSettings,
        initial: ParameterSet,
    ) -> Self {
        Self {
            host,
            registry,
            settings,
            parameters: Arc::new(SharedParameters::new(initial)),
            meter: LiveMeter::new(),
            cancel: CancelHandle::default(),
            state: GraphState::Uninitialized,
            graph: None,
            stream_ready: None,
            pending_stream: None,
            last_error: None,
            reported_faults: 0,
        }
    }

    /// Called with the cleaned stream once per successful `enable()`.
    pub fn on_processed_stream_ready<F>(&mut self, handler: F)
    where
        F: FnMut(ProcessedStream) + 'static,
    {
        self.stream_ready = Some(Box::new(handler));
    }

    /// Stream from the last `enable()` when no ready handler was registered.
    pub fn take_processed_stream(&mut self) -> Option<ProcessedStream> {
        self.pending_stream.take()
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn volume_meter(&self) -> LiveMeter {
        self.meter.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn parameters(&self) -> ParameterSet {
        self.parameters.latest()
    }

    pub fn last_error(&self) -> Option<&GateError> {
        self.last_error.as_ref()
    }

    pub fn device_label(&self) -> Option<&str> {
        self.graph.as_ref().map(|graph| graph.device.label.as_str())
    }

    pub fn stream_format(&self) -> Option<StreamFormat> {
        self.graph.as_ref().map(|graph| graph.context.format)
    }

    /// Name of the processor in the graph, if one loaded.
    pub fn active_processor(&self) -> Option<&'static str> {
        self.graph.as_ref().and_then(|graph| graph.processor)
    }

    pub fn stats(&self) -> GraphStats {
        self.graph
            .as_ref()
            .map(|graph| graph.context.shared.stats())
            .unwrap_or_default()
    }

    /// Acquire the microphone and build the graph.
    ///
    /// `Ok(None)` means audio flows through the gate. `Ok(Some(warning))` means
    /// audio flows on the bypass route. `Err` means there is no audio.
    pub fn enable(&mut self) -> Result<Option<GateError>, GateError> {
        match self.state {
            GraphState::Active { .. } | GraphState::Initializing => {
                return Err(GateError::InvalidState {
                    operation: "enable",
                    state: self.state.label(),
                });
            }
            GraphState::Failed | GraphState::TornDown => {
                log_debug(&format!(
                    "restarting audio graph from {}",
                    self.state.label()
                ));
                self.state = GraphState::Uninitialized;
            }
            GraphState::Uninitialized => {}
        }

        self.cancel.clear();
        self.state = GraphState::Initializing;
        let started = Instant::now();

        match self.build_graph() {
            Ok((graph, stream)) => {
                let bypassed = graph.context.shared.is_bypassed();
                let warning = graph.warning.clone();
                tracing::info!(
                    event = "graph_enabled",
                    device = %graph.device.label,
                    sample_rate = graph.context.format.sample_rate,
                    channels = graph.context.format.channels,
                    bypassed,
                    warning = warning.as_ref().map(GateError::label),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                );
                self.graph = Some(graph);
                self.state = GraphState::Active { bypassed };
                self.reported_faults = 0;
                if warning.is_some() {
                    self.last_error = warning.clone();
                }
                self.deliver_stream(stream);
                Ok(warning)
            }
            Err(err) => {
                self.state = match err {
                    GateError::Cancelled => GraphState::TornDown,
                    _ => GraphState::Failed,
                };
                self.meter.reset();
                log_debug(&format!("audio graph enable failed: {err}"));
                tracing::warn!(
                    event = "graph_enable_failed",
                    error = err.label(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                );
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn build_graph(&self) -> Result<(GraphHandle, ProcessedStream), GateError> {
        self.check_cancelled()?;
        let mut device = DeviceCapture::acquire(self.host.as_ref(), &self.settings.constraints)?;
        self.check_cancelled()?;

        let format = device.device.format();
        let capacity = format.samples_for_ms(self.settings.stream_capacity_ms);
        let RenderParts {
            shared,
            installs,
            mut node,
            stream,
        } = render_parts(format, capacity, self.meter.clone());
        let context = ProcessingContext {
            shared,
            installs,
            format,
        };

        // Source straight to destination first, so audio flows before the gate loads.
        device
            .device
            .start(Box::new(move |block: &[f32]| node.render(block)))?;
        self.check_cancelled()?;

        let mut graph = GraphHandle {
            device,
            context,
            processor: None,
            warning: None,
        };
        let loaded = self
            .load_processor(format)
            .and_then(|processor| {
                let name = processor.name();
                graph.context.install(processor).map(|()| name)
            });
        match loaded {
            Ok(name) => {
                graph.context.shared.set_bypassed(false);
                graph.processor = Some(name);
                log_debug(&format!("processor '{name}' connected; bypass route dropped"));
            }
            Err(warning) => {
                log_debug(&format!("continuing on bypass route: {warning}"));
                graph.warning = Some(warning);
            }
        }
        Ok((graph, stream))
    }

    fn load_processor(&self, format: StreamFormat) -> Result<Box<dyn AudioTransform>, GateError> {
        if !self.host.supports_realtime_processing() {
            return Err(GateError::RuntimeUnsupported {
                host: self.host.name().to_string(),
                reason: "no real-time processing callback available".to_string(),
            });
        }
        let options = ProcessorOptions::from(self.parameters.latest());
        let context = ProcessorContext {
            format,
            parameters: self.parameters.clone(),
        };
        self.registry
            .instantiate(&self.settings.processor_name, &options, &context)
    }

    fn check_cancelled(&self) -> Result<(), GateError> {
        if self.cancel.is_cancelled() {
            Err(GateError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn deliver_stream(&mut self, stream: ProcessedStream) {
        match self.stream_ready.as_mut() {
            Some(handler) => handler(stream),
            None => self.pending_stream = Some(stream),
        }
    }

    /// Release the device and the graph. Safe to call in any state, any number of times.
    pub fn disable(&mut self) {
        self.cancel.cancel();
        if let Some(graph) = self.graph.take() {
            let stats = graph.context.shared.stats();
            tracing::info!(
                event = "graph_disabled",
                blocks = stats.blocks,
                faulted_blocks = stats.faulted_blocks,
                dropped_samples = stats.dropped_samples,
            );
            drop(graph);
        }
        self.pending_stream = None;
        self.meter.reset();
        if self.state != GraphState::Uninitialized {
            self.state = GraphState::TornDown;
        }
    }

    /// Flip between the gate and the bypass route without rebuilding the graph.
    pub fn toggle(&mut self) -> Result<bool, GateError> {
        match self.state {
            GraphState::Active { bypassed } => self.set_bypassed(!bypassed),
            state => Err(GateError::InvalidState {
                operation: "toggle bypass",
                state: state.label(),
            }),
        }
    }

    pub fn set_bypassed(&mut self, bypassed: bool) -> Result<bool, GateError> {
        let Some(graph) = self.graph.as_ref() else {
            return Err(GateError::InvalidState {
                operation: "change bypass",
                state: self.state.label(),
            });
        };
        if !bypassed && graph.processor.is_none() {
            // Without a processor the bypass route is the only route.
            return Err(graph
                .warning
                .clone()
                .unwrap_or_else(|| GateError::ProcessorLoadFailure {
                    name: self.settings.processor_name.clone(),
                    reason: "processor not loaded".to_string(),
                }));
        }
        graph.context.shared.set_bypassed(bypassed);
        self.state = GraphState::Active { bypassed };
        log_debug(&format!("noise gate bypass set to {bypassed}"));
        Ok(bypassed)
    }

    /// Publish new gate parameters; the audio thread picks them up next block.
    pub fn update_parameters(&mut self, params: ParameterSet) -> ParameterSet {
        let applied = self.parameters.publish(params);
        log_debug(&format!(
            "gate parameters: threshold={:.1}dB attack={:.3}s release={:.3}s",
            applied.threshold_db, applied.attack_s, applied.release_s
        ));
        applied
    }

    /// Report blocks the processor faulted on since the last call.
    pub fn poll_warning(&mut self) -> Option<GateError> {
        let faulted = self.graph.as_ref()?.context.shared.stats().faulted_blocks;
        if faulted <= self.reported_faults {
            return None;
        }
        let warning = GateError::ProcessorRuntimeError {
            faulted_blocks: faulted - self.reported_faults,
        };
        self.reported_faults = faulted;
        log_debug(&format!("processor warning: {warning}"));
        tracing::warn!(event = "processor_faults", faulted_blocks = faulted);
        self.last_error = Some(warning.clone());
        Some(warning)
    }
}

impl Drop for AudioGraphController {
    fn drop(&mut self) {
        self.disable();
    }
}
