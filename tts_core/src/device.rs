//! Playback on the default output device.
//!
//! `write` pushes samples into a bounded queue and blocks while it is full;
//! the device callback pops from the front and pads with silence on underrun.
//! A `cpal::Stream` cannot leave the thread that built it, so the sink must be
//! driven from the thread that opened it.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, warn};

use crate::{audio::AudioFrame, error::SinkError, sink::AudioSink};

const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Slack on top of the queued audio's play time before `finish` gives up.
const DRAIN_MARGIN: Duration = Duration::from_secs(1);

struct Shared {
    queue: Mutex<VecDeque<f32>>,
    space: Condvar,
    capacity: usize,
    /// Set by the stream's error callback.
    failed: AtomicBool,
}

impl Shared {
    fn check_stream(&self) -> Result<(), SinkError> {
        if self.failed.load(Ordering::SeqCst) {
            return Err(SinkError::Device("audio output stream failed".into()));
        }
        Ok(())
    }
}

/// Latest time `finish` waits for `queued` mono samples to play at `sample_rate`.
fn drain_deadline(start: Instant, queued: usize, sample_rate: u32) -> Instant {
    let play_time = Duration::from_secs_f64(queued as f64 / sample_rate.max(1) as f64);
    start + play_time + DRAIN_MARGIN
}

pub struct DeviceSink {
    stream: Option<cpal::Stream>,
    shared: Arc<Shared>,
    sample_rate: u32,
}

fn device_err(e: impl std::fmt::Display) -> SinkError {
    SinkError::Device(e.to_string())
}

impl DeviceSink {
    /// Open the default output device at `sample_rate`, buffering at most
    /// `buffer_secs` of audio ahead of the device.
    pub fn open(sample_rate: u32, buffer_secs: f32) -> Result<Self, SinkError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| SinkError::Device("no audio output device available".into()))?;
        let default_config = device.default_output_config().map_err(device_err)?;
        let channels = default_config.channels().max(1);
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = ((sample_rate as f32 * buffer_secs.max(0.05)) as usize).max(1024);
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            space: Condvar::new(),
            capacity,
            failed: AtomicBool::new(false),
        });

        let cb_shared = shared.clone();
        let err_shared = shared.clone();
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    let Ok(mut queue) = cb_shared.queue.lock() else {
                        data.fill(0.0);
                        return;
                    };
                    for frame in data.chunks_mut(channels as usize) {
                        let s = queue.pop_front().unwrap_or(0.0);
                        frame.fill(s);
                    }
                    drop(queue);
                    cb_shared.space.notify_all();
                },
                move |e| {
                    error!("audio output stream error: {e}");
                    err_shared.failed.store(true, Ordering::SeqCst);
                    err_shared.space.notify_all();
                },
                None,
            )
            .map_err(device_err)?;
        stream.play().map_err(device_err)?;
        debug!(sample_rate, channels, capacity, "opened output device");

        Ok(Self {
            stream: Some(stream),
            shared,
            sample_rate,
        })
    }

    fn clear(&self) {
        if let Ok(mut queue) = self.shared.queue.lock() {
            queue.clear();
        }
        self.shared.space.notify_all();
    }
}

impl AudioSink for DeviceSink {
    fn reset(&mut self) -> Result<(), SinkError> {
        let stream = self.stream.as_ref().ok_or(SinkError::Closed)?;
        stream.pause().map_err(device_err)?;
        self.clear();
        stream.play().map_err(device_err)?;
        Ok(())
    }

    fn write(&mut self, frame: AudioFrame) -> Result<(), SinkError> {
        if frame.sample_rate() != self.sample_rate {
            warn!(
                frame_rate = frame.sample_rate(),
                device_rate = self.sample_rate,
                "frame sample rate differs from device"
            );
        }
        let mut pending = frame.samples();
        while !pending.is_empty() {
            if self.stream.is_none() {
                return Err(SinkError::Closed);
            }
            self.shared.check_stream()?;
            let queue = self
                .shared
                .queue
                .lock()
                .map_err(|_| SinkError::Device("sample queue lock poisoned".into()))?;
            let (mut queue, _) = self
                .shared
                .space
                .wait_timeout_while(queue, WAIT_SLICE, |q| q.len() >= self.shared.capacity)
                .map_err(|_| SinkError::Device("sample queue lock poisoned".into()))?;
            let room = self.shared.capacity.saturating_sub(queue.len());
            let take = room.min(pending.len());
            queue.extend(&pending[..take]);
            pending = &pending[take..];
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                warn!(error = %e, "failed to pause output stream");
            }
        }
        self.clear();
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        // Let queued audio play out before the caller moves on.
        let mut queue = self
            .shared
            .queue
            .lock()
            .map_err(|_| SinkError::Device("sample queue lock poisoned".into()))?;
        let deadline = drain_deadline(Instant::now(), queue.len(), self.sample_rate);
        loop {
            if queue.is_empty() || self.stream.is_none() {
                return Ok(());
            }
            self.shared.check_stream()?;
            if Instant::now() >= deadline {
                warn!(remaining = queue.len(), "output device stopped draining");
                return Err(SinkError::Device("timed out waiting for playback to drain".into()));
            }
            queue = self
                .shared
                .space
                .wait_timeout(queue, WAIT_SLICE)
                .map_err(|_| SinkError::Device("sample queue lock poisoned".into()))?
                .0;
        }
    }
}
