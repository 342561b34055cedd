//! Drains the cleaned stream on its own thread, optionally into a WAV file.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use voicegate::audio::{ProcessedStream, StreamFormat};
use voicegate::log_debug;

const SINK_CHUNK_SAMPLES: usize = 4_096;
const SINK_IDLE: Duration = Duration::from_millis(10);

#[cfg(feature = "wav-record")]
mod wav {
    use anyhow::{Context, Result};
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::fs::File;
    use std::io::BufWriter;
    use std::path::Path;
    use voicegate::audio::StreamFormat;

    pub(super) struct WavRecorder {
        writer: WavWriter<BufWriter<File>>,
    }

    impl WavRecorder {
        pub(super) fn create(path: &Path, format: StreamFormat) -> Result<Self> {
            let spec = WavSpec {
                channels: format.channels,
                sample_rate: format.sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            };
            let writer = WavWriter::create(path, spec)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self { writer })
        }

        pub(super) fn write(&mut self, samples: &[f32]) -> Result<()> {
            for &sample in samples {
                self.writer.write_sample(sample)?;
            }
            Ok(())
        }

        pub(super) fn finalize(self) -> Result<()> {
            self.writer.finalize()?;
            Ok(())
        }
    }
}

#[cfg(not(feature = "wav-record"))]
mod wav {
    use anyhow::{bail, Result};
    use std::path::Path;
    use voicegate::audio::StreamFormat;

    pub(super) struct WavRecorder;

    impl WavRecorder {
        pub(super) fn create(_path: &Path, _format: StreamFormat) -> Result<Self> {
            bail!("--record-wav requires building with the 'wav-record' feature")
        }

        pub(super) fn write(&mut self, _samples: &[f32]) -> Result<()> {
            Ok(())
        }

        pub(super) fn finalize(self) -> Result<()> {
            Ok(())
        }
    }
}

use wav::WavRecorder;

pub(crate) struct StreamSink {
    handle: thread::JoinHandle<Result<u64>>,
    stop: Arc<AtomicBool>,
    record_path: Option<PathBuf>,
}

pub(crate) fn spawn_stream_sink(
    mut stream: ProcessedStream,
    record_path: Option<&Path>,
) -> Result<StreamSink> {
    let mut recorder = record_path
        .map(|path| open_recorder(path, stream.format()))
        .transpose()?;
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let handle = thread::spawn(move || -> Result<u64> {
        let mut buf = vec![0.0f32; SINK_CHUNK_SAMPLES];
        let mut total = 0u64;
        loop {
            let n = stream.read(&mut buf);
            if n > 0 {
                if let Some(recorder) = recorder.as_mut() {
                    recorder.write(&buf[..n])?;
                }
                total += n as u64;
                continue;
            }
            if stop_flag.load(Ordering::Relaxed) || !stream.is_live() {
                break;
            }
            thread::sleep(SINK_IDLE);
        }
        if let Some(recorder) = recorder {
            recorder.finalize()?;
        }
        Ok(total)
    });
    Ok(StreamSink {
        handle,
        stop,
        record_path: record_path.map(Path::to_path_buf),
    })
}

fn open_recorder(path: &Path, format: StreamFormat) -> Result<WavRecorder> {
    let recorder = WavRecorder::create(path, format)?;
    log_debug(&format!(
        "recording cleaned stream to {} ({} Hz, {} ch)",
        path.display(),
        format.sample_rate,
        format.channels
    ));
    Ok(recorder)
}

impl StreamSink {
    pub(crate) fn record_path(&self) -> Option<&Path> {
        self.record_path.as_deref()
    }

    /// Drain whatever is left and return the number of samples consumed.
    pub(crate) fn finish(self) -> Result<u64> {
        self.stop.store(true, Ordering::Relaxed);
        self.handle
            .join()
            .map_err(|_| anyhow!("stream sink thread panicked"))?
    }
}
