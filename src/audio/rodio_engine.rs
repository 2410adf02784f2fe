// rodio-backed engine - real playback for the console player.
// The output stream is not Send, so it lives on its own thread for as long as
// the backend exists; engines only hold sinks created from its handle.
// A sink that drains well before the decoded length is reported as a decode error.

use super::{AudioBackend, AudioEngine, EngineError, EngineNotifier, EngineSettings};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const FINISH_POLL_INTERVAL: Duration = Duration::from_millis(100);
const EARLY_DRAIN_TOLERANCE_SECS: f64 = 1.0;

/// True when playback stopped short of a known track length.
fn drained_early(last_position: f64, duration: f64) -> bool {
    duration > 0.0 && last_position + EARLY_DRAIN_TOLERANCE_SECS < duration
}

pub struct RodioBackend {
    handle: OutputStreamHandle,
    // dropping the sender lets the output thread exit and close the device
    _shutdown: mpsc::Sender<()>,
}

impl RodioBackend {
    pub fn new() -> Result<Self, EngineError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((stream, handle)) => {
                    let _ = ready_tx.send(Ok(handle));
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| EngineError::Output(e.to_string()))?;

        let handle = ready_rx
            .recv()
            .map_err(|e| EngineError::Output(e.to_string()))?
            .map_err(EngineError::Output)?;

        Ok(Self {
            handle,
            _shutdown: shutdown_tx,
        })
    }
}

impl AudioBackend for RodioBackend {
    fn open(
        &self,
        settings: &EngineSettings,
        notifier: EngineNotifier,
    ) -> Result<Box<dyn AudioEngine>, EngineError> {
        let open_error = |reason: String| EngineError::Open {
            resource: settings.resource.to_string(),
            reason,
        };

        let file = File::open(settings.resource.path()).map_err(|e| open_error(e.to_string()))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| open_error(format!("unsupported or corrupted audio: {}", e)))?;

        // mp3 streams often cannot report their length up front
        let duration = source
            .total_duration()
            .map(|d| d.as_secs_f64())
            .or(settings.duration_hint)
            .unwrap_or(0.0);

        let sink = Sink::try_new(&self.handle).map_err(|e| EngineError::Output(e.to_string()))?;
        sink.pause();
        sink.append(source);

        let rate = if settings.enable_rate { settings.rate } else { 1.0 };
        sink.set_speed(rate);

        let mut engine = RodioEngine {
            sink: Arc::new(sink),
            duration,
            rate,
            enable_rate: settings.enable_rate,
            stopped: Arc::new(AtomicBool::new(false)),
        };
        if settings.start_time > 0.0 {
            engine.set_current_time(settings.start_time);
        }
        engine.watch_for_end(notifier);

        debug!("rodio engine opened for {} ({:.1}s)", settings.resource, duration);
        Ok(Box::new(engine))
    }
}

pub struct RodioEngine {
    sink: Arc<Sink>,
    duration: f64,
    rate: f32,
    enable_rate: bool,
    stopped: Arc<AtomicBool>,
}

impl RodioEngine {
    /// The sink has no completion callback, so poll for it draining.
    fn watch_for_end(&self, notifier: EngineNotifier) {
        let sink = Arc::clone(&self.sink);
        let stopped = Arc::clone(&self.stopped);
        let duration = self.duration;

        let spawned = thread::Builder::new()
            .name("audio-finish-watch".to_string())
            .spawn(move || {
                let mut last_position = 0.0;
                loop {
                    thread::sleep(FINISH_POLL_INTERVAL);
                    if stopped.load(Ordering::SeqCst) {
                        return;
                    }
                    if !sink.empty() {
                        last_position = sink.get_pos().as_secs_f64();
                        continue;
                    }
                    if drained_early(last_position, duration) {
                        warn!(
                            "Stream ended at {:.1}s of {:.1}s, treating as a decode error",
                            last_position, duration
                        );
                        notifier.decode_error(Some(format!(
                            "playback stopped at {:.1}s of {:.1}s",
                            last_position, duration
                        )));
                    } else {
                        notifier.finished(true);
                    }
                    return;
                }
            });

        if let Err(e) = spawned {
            warn!("Could not start end-of-track watcher: {}", e);
        }
    }
}

impl AudioEngine for RodioEngine {
    fn play(&mut self) {
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
    }

    fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.sink.stop();
        }
    }

    fn is_playing(&self) -> bool {
        !self.sink.is_paused() && !self.sink.empty()
    }

    fn current_time(&self) -> f64 {
        self.sink.get_pos().as_secs_f64()
    }

    fn set_current_time(&mut self, seconds: f64) {
        let target = Duration::from_secs_f64(seconds.max(0.0));
        if let Err(e) = self.sink.try_seek(target) {
            warn!("Seek to {:.1}s failed: {}", seconds, e);
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn rate(&self) -> f32 {
        self.rate
    }

    fn set_rate(&mut self, rate: f32) {
        if self.enable_rate {
            self.rate = rate;
            self.sink.set_speed(rate);
        }
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
