//! Named processor factories the controller loads from at `enable()` time.

use super::host::StreamFormat;
use crate::error::GateError;
use crate::gate::{
    AudioTransform, NoiseGateProcessor, ProcessorOptions, SharedParameters, MAX_CHANNELS,
    NOISE_GATE_PROCESSOR,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a factory gets besides its options.
pub struct ProcessorContext {
    pub format: StreamFormat,
    pub parameters: Arc<SharedParameters>,
}

/// Builds a processor, or explains why it cannot for this stream.
pub type ProcessorFactory = Arc<
    dyn Fn(&ProcessorOptions, &ProcessorContext) -> Result<Box<dyn AudioTransform>, String>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    factories: BTreeMap<String, ProcessorFactory>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the noise gate under [`NOISE_GATE_PROCESSOR`].
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(NOISE_GATE_PROCESSOR, Arc::new(build_noise_gate));
        registry
    }

    pub fn register(&mut self, name: &str, factory: ProcessorFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn instantiate(
        &self,
        name: &str,
        options: &ProcessorOptions,
        context: &ProcessorContext,
    ) -> Result<Box<dyn AudioTransform>, GateError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| GateError::ProcessorLoadFailure {
                name: name.to_string(),
                reason: "no processor registered under this name".to_string(),
            })?;
        factory(options, context).map_err(|reason| GateError::ProcessorLoadFailure {
            name: name.to_string(),
            reason,
        })
    }
}

fn build_noise_gate(
    options: &ProcessorOptions,
    context: &ProcessorContext,
) -> Result<Box<dyn AudioTransform>, String> {
    let format = context.format;
    if !(8_000..=384_000).contains(&format.sample_rate) {
        return Err(format!("unsupported sample rate {}Hz", format.sample_rate));
    }
    let channels = usize::from(format.channels);
    if !(1..=MAX_CHANNELS).contains(&channels) {
        return Err(format!(
            "unsupported channel count {channels} (1..={MAX_CHANNELS})"
        ));
    }
    let gate = NoiseGateProcessor::new(*options, format.sample_rate, channels)
        .with_live_parameters(context.parameters.clone());
    Ok(Box::new(gate))
}
