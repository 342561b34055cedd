//! Block processors that run inside the audio callback.

use super::curve::GateCurve;
use super::envelope::{level_db, EnvelopeFollower, SmoothingCoefficients};
use super::params::{ParameterSet, SharedParameters};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Registry name of the built-in noise gate.
pub const NOISE_GATE_PROCESSOR: &str = "noise-gate-processor";

/// Largest channel count a gate allocates envelope state for.
pub const MAX_CHANNELS: usize = 8;

/// Why a block (or part of one) was not gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFault {
    LengthMismatch { input: usize, output: usize },
    ChannelLayout { channels: usize, samples: usize },
    /// One channel was copied through unprocessed; the rest of the block is valid.
    ChannelPassthrough { channel: usize },
}

impl BlockFault {
    /// Whether the processor still filled the output buffer.
    pub fn output_written(&self) -> bool {
        matches!(self, BlockFault::ChannelPassthrough { .. })
    }
}

/// A real-time transform over interleaved f32 blocks.
///
/// Implementations must not allocate, lock, or block inside `process`, and must
/// report problems through the returned fault rather than panicking.
pub trait AudioTransform: Send {
    fn name(&self) -> &'static str;

    /// `input` and `output` hold the same number of interleaved samples.
    fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        channels: usize,
    ) -> Result<(), BlockFault>;

    fn reset(&mut self) {}
}

/// Identity route used while the gate is bypassed or unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl AudioTransform for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        _channels: usize,
    ) -> Result<(), BlockFault> {
        if input.len() != output.len() {
            return Err(BlockFault::LengthMismatch {
                input: input.len(),
                output: output.len(),
            });
        }
        output.copy_from_slice(input);
        Ok(())
    }
}

/// Construction options handed to a processor factory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorOptions {
    pub threshold: f32,
    pub attack_time: f32,
    pub release_time: f32,
}

impl From<ParameterSet> for ProcessorOptions {
    fn from(params: ParameterSet) -> Self {
        Self {
            threshold: params.threshold_db,
            attack_time: params.attack_s,
            release_time: params.release_s,
        }
    }
}

impl From<ProcessorOptions> for ParameterSet {
    fn from(options: ProcessorOptions) -> Self {
        ParameterSet::new(options.threshold, options.attack_time, options.release_time)
    }
}

/// Envelope-driven noise gate with one follower per channel.
pub struct NoiseGateProcessor {
    sample_rate: f32,
    params: ParameterSet,
    coefficients: SmoothingCoefficients,
    curve: GateCurve,
    envelopes: Vec<EnvelopeFollower>,
    live: Option<Arc<SharedParameters>>,
    applied_version: Option<u64>,
    last_gain: f32,
}

impl NoiseGateProcessor {
    pub fn new(options: ProcessorOptions, sample_rate: u32, channels: usize) -> Self {
        let params = ParameterSet::from(options);
        let sample_rate = sample_rate as f32;
        Self {
            sample_rate,
            params,
            coefficients: SmoothingCoefficients::derive(
                params.attack_s,
                params.release_s,
                sample_rate,
            ),
            curve: GateCurve::default(),
            envelopes: vec![EnvelopeFollower::new(); channels.clamp(1, MAX_CHANNELS)],
            live: None,
            applied_version: None,
            last_gain: 1.0,
        }
    }

    /// Follow a shared snapshot; it is re-read at the start of every block.
    pub fn with_live_parameters(mut self, live: Arc<SharedParameters>) -> Self {
        self.live = Some(live);
        self
    }

    pub fn parameters(&self) -> ParameterSet {
        self.params
    }

    pub fn coefficients(&self) -> SmoothingCoefficients {
        self.coefficients
    }

    pub fn envelope_db(&self, channel: usize) -> Option<f32> {
        self.envelopes.get(channel).map(EnvelopeFollower::envelope_db)
    }

    /// Gain applied to the last sample of the last processed channel.
    pub fn last_gain(&self) -> f32 {
        self.last_gain
    }

    pub fn set_parameters(&mut self, params: ParameterSet) {
        let next = params.sanitized_against(&self.params);
        if !next.same_timing(&self.params) {
            self.coefficients =
                SmoothingCoefficients::derive(next.attack_s, next.release_s, self.sample_rate);
        }
        self.params = next;
    }

    fn refresh_parameters(&mut self) {
        let Some(live) = self.live.as_ref() else {
            return;
        };
        let snapshot = live.read();
        if self.applied_version == Some(snapshot.version) {
            return;
        }
        self.applied_version = Some(snapshot.version);
        self.set_parameters(snapshot.params);
    }
}

impl AudioTransform for NoiseGateProcessor {
    fn name(&self) -> &'static str {
        NOISE_GATE_PROCESSOR
    }

    fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        channels: usize,
    ) -> Result<(), BlockFault> {
        if input.is_empty() {
            return Ok(());
        }
        if input.len() != output.len() {
            return Err(BlockFault::LengthMismatch {
                input: input.len(),
                output: output.len(),
            });
        }
        if channels == 0 || input.len() % channels != 0 {
            return Err(BlockFault::ChannelLayout {
                channels,
                samples: input.len(),
            });
        }

        self.refresh_parameters();
        let threshold_db = self.params.threshold_db;
        let mut fault = None;

        for channel in 0..channels {
            let Some(envelope) = self.envelopes.get_mut(channel) else {
                copy_channel_sanitized(input, output, channel, channels);
                fault.get_or_insert(BlockFault::ChannelPassthrough { channel });
                continue;
            };
            if input
                .iter()
                .skip(channel)
                .step_by(channels)
                .any(|sample| !sample.is_finite())
            {
                copy_channel_sanitized(input, output, channel, channels);
                fault.get_or_insert(BlockFault::ChannelPassthrough { channel });
                continue;
            }

            let mut gain = self.last_gain;
            let frames = input
                .iter()
                .skip(channel)
                .step_by(channels)
                .zip(output.iter_mut().skip(channel).step_by(channels));
            for (sample, out) in frames {
                let envelope_db = envelope.next(level_db(*sample), &self.coefficients);
                gain = self.curve.gain(envelope_db, threshold_db);
                *out = *sample * gain;
            }
            self.last_gain = gain;
        }

        match fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    fn reset(&mut self) {
        self.envelopes.iter_mut().for_each(EnvelopeFollower::reset);
        self.last_gain = 1.0;
    }
}

fn copy_channel_sanitized(input: &[f32], output: &mut [f32], channel: usize, channels: usize) {
    let frames = input
        .iter()
        .skip(channel)
        .step_by(channels)
        .zip(output.iter_mut().skip(channel).step_by(channels));
    for (sample, out) in frames {
        *out = if sample.is_finite() { *sample } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::curve::FLOOR_GAIN;
    use crate::gate::envelope::LEVEL_FLOOR_DB;
    use std::f32::consts::PI;

    const RATE: u32 = 48_000;

    fn options(threshold: f32, attack: f32, release: f32) -> ProcessorOptions {
        ProcessorOptions {
            threshold,
            attack_time: attack,
            release_time: release,
        }
    }

    fn sine(frequency: f32, amplitude: f32, samples: usize, offset: usize) -> Vec<f32> {
        (offset..offset + samples)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / RATE as f32).sin())
            .collect()
    }

    fn run_blocks(gate: &mut NoiseGateProcessor, signal: &[f32], block: usize) -> Vec<f32> {
        let mut output = vec![0.0; signal.len()];
        for (input, out) in signal.chunks(block).zip(output.chunks_mut(block)) {
            gate.process(input, out, 1).unwrap();
        }
        output
    }

    #[test]
    fn empty_block_is_a_silent_success() {
        let mut gate = NoiseGateProcessor::new(options(-30.0, 0.01, 0.1), RATE, 1);
        let mut output: [f32; 0] = [];
        assert_eq!(gate.process(&[], &mut output, 1), Ok(()));
        assert_eq!(gate.envelope_db(0), Some(-60.0));
    }

    #[test]
    fn mismatched_buffers_are_reported_not_panicked() {
        let mut gate = NoiseGateProcessor::new(options(-30.0, 0.01, 0.1), RATE, 1);
        let mut output = [0.0f32; 2];
        let fault = gate.process(&[0.1, 0.2, 0.3], &mut output, 1).unwrap_err();
        assert!(!fault.output_written());
        let fault = gate.process(&[0.1, 0.2, 0.3], &mut [0.0; 3], 2).unwrap_err();
        assert_eq!(
            fault,
            BlockFault::ChannelLayout {
                channels: 2,
                samples: 3
            }
        );
    }

    #[test]
    fn sine_above_threshold_passes_at_unity() {
        let mut gate = NoiseGateProcessor::new(options(-30.0, 0.01, 0.1), RATE, 1);
        let signal = sine(440.0, 0.5, RATE as usize, 0);
        let output = run_blocks(&mut gate, &signal, 128);
        assert!(gate.envelope_db(0).unwrap() > -24.0);
        // after the attack has settled the output is the input
        let tail = RATE as usize / 2;
        for (out, inp) in output[tail..].iter().zip(&signal[tail..]) {
            assert!((out - inp).abs() < 1e-6);
        }
    }

    #[test]
    fn sine_removed_for_longer_than_release_reaches_floor() {
        let mut gate = NoiseGateProcessor::new(options(-30.0, 0.01, 0.1), RATE, 1);
        let loud = sine(440.0, 0.5, RATE as usize / 2, 0);
        run_blocks(&mut gate, &loud, 128);
        assert_eq!(gate.last_gain(), 1.0);

        let quiet = sine(440.0, 0.0005, RATE as usize, 0);
        let output = run_blocks(&mut gate, &quiet, 128);
        assert_eq!(gate.last_gain(), FLOOR_GAIN);
        let tail = &output[output.len() - 256..];
        let input_tail = &quiet[quiet.len() - 256..];
        for (out, inp) in tail.iter().zip(input_tail) {
            assert!((out - inp * FLOOR_GAIN).abs() < 1e-9);
        }
    }

    #[test]
    fn silence_converges_to_level_floor() {
        let mut gate = NoiseGateProcessor::new(options(-30.0, 0.01, 0.1), RATE, 1);
        let silence = vec![0.0f32; RATE as usize * 3 / 2];
        run_blocks(&mut gate, &silence, 256);
        let envelope = gate.envelope_db(0).unwrap();
        assert!((envelope - LEVEL_FLOOR_DB).abs() < 0.5, "envelope {envelope}");
        assert_eq!(gate.last_gain(), FLOOR_GAIN);
    }

    #[test]
    fn transient_rises_faster_than_it_decays() {
        let mut gate = NoiseGateProcessor::new(options(-30.0, 0.01, 0.1), RATE, 1);
        let burst = (RATE as usize * 5) / 1000;
        let mut trace = Vec::new();
        let mut out = [0.0f32; 1];
        for i in 0..burst + RATE as usize / 2 {
            let sample = if i < burst { 1.0 } else { 0.0 };
            gate.process(&[sample], &mut out, 1).unwrap();
            trace.push(gate.envelope_db(0).unwrap());
        }

        let start = -60.0;
        let rise_samples = trace.iter().position(|&db| db >= start + 10.0).unwrap();
        let peak = trace[burst - 1];
        let fall_samples = trace[burst..]
            .iter()
            .position(|&db| db <= peak - 10.0)
            .unwrap();
        assert!(
            fall_samples > rise_samples * 3,
            "rise {rise_samples} fall {fall_samples}"
        );
    }

    #[test]
    fn live_update_applies_on_next_block() {
        let live = Arc::new(SharedParameters::new(ParameterSet::new(-30.0, 0.01, 0.1)));
        let mut gate = NoiseGateProcessor::new(options(-30.0, 0.01, 0.1), RATE, 1)
            .with_live_parameters(live.clone());
        let block = vec![0.01f32; 128];
        let mut out = vec![0.0; 128];
        gate.process(&block, &mut out, 1).unwrap();
        let before = gate.coefficients();

        live.publish(ParameterSet::new(-12.0, 0.01, 0.1));
        gate.process(&block, &mut out, 1).unwrap();
        assert_eq!(gate.parameters().threshold_db, -12.0);
        assert_eq!(gate.coefficients(), before);

        live.publish(ParameterSet::new(-12.0, 0.002, 0.5));
        gate.process(&block, &mut out, 1).unwrap();
        assert_ne!(gate.coefficients(), before);
        assert_eq!(gate.parameters().release_s, 0.5);
    }

    #[test]
    fn unsupported_channel_passes_through() {
        let mut gate = NoiseGateProcessor::new(options(-20.0, 0.01, 0.1), RATE, 1);
        let input = [0.001f32, 0.5, 0.001, 0.5];
        let mut out = [0.0f32; 4];
        let fault = gate.process(&input, &mut out, 2).unwrap_err();
        assert_eq!(fault, BlockFault::ChannelPassthrough { channel: 1 });
        assert!(fault.output_written());
        assert_eq!(out[1], 0.5);
        assert_eq!(out[3], 0.5);
        assert!(out[0] < input[0]);
    }

    #[test]
    fn non_finite_channel_is_sanitized_and_others_still_gated() {
        let mut gate = NoiseGateProcessor::new(options(-20.0, 0.01, 0.1), RATE, 2);
        let input = [0.001f32, f32::NAN, 0.001, 0.25];
        let mut out = [0.0f32; 4];
        let fault = gate.process(&input, &mut out, 2).unwrap_err();
        assert_eq!(fault, BlockFault::ChannelPassthrough { channel: 1 });
        assert_eq!(out[1], 0.0);
        assert_eq!(out[3], 0.25);
        assert!(out[0] < 0.001);
        assert_eq!(gate.envelope_db(1), Some(-60.0));
    }

    #[test]
    fn passthrough_copies_block() {
        let mut identity = Passthrough;
        let input = [0.1f32, -0.2, 0.3];
        let mut out = [0.0f32; 3];
        identity.process(&input, &mut out, 1).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn options_serialize_with_processor_option_names() {
        let json = serde_json::to_string(&options(-40.0, 0.01, 0.2)).unwrap();
        assert!(json.contains("attackTime"));
        assert!(json.contains("releaseTime"));
    }
}
