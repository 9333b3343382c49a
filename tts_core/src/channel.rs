//! Ordered single-producer single-consumer frame queue between synthesis and
//! playback.
//!
//! Backed by a bounded `tokio::sync::mpsc` channel: the producer thread uses
//! `blocking_send`, so it stalls whenever the consumer falls `capacity` frames
//! behind. The consumer may receive either from a plain thread
//! ([`FrameReceiver::recv_blocking`]) or from an async task
//! ([`FrameReceiver::recv`]).

use tokio::sync::mpsc;
use tracing::debug;

use crate::{audio::AudioFrame, request::StopFlag};

/// Why a frame could not be sent.
#[derive(Debug, PartialEq)]
pub enum SendError {
    /// The consumer closed or dropped its end.
    Closed(AudioFrame),
    /// The stop flag was set before the frame was queued.
    Stopped(AudioFrame),
}

impl SendError {
    pub fn into_frame(self) -> AudioFrame {
        match self {
            SendError::Closed(f) | SendError::Stopped(f) => f,
        }
    }
}

/// Create a channel that buffers at most `capacity` frames (minimum 1).
pub fn audio_channel(capacity: usize, stop: StopFlag) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        FrameSender {
            tx,
            stop: stop.clone(),
        },
        FrameReceiver {
            rx,
            stop,
            closed: false,
        },
    )
}

#[derive(Debug)]
pub struct FrameSender {
    tx: mpsc::Sender<AudioFrame>,
    stop: StopFlag,
}

impl FrameSender {
    /// Queue a frame, blocking while the channel is full.
    ///
    /// Must not be called from inside an async runtime.
    pub fn send(&self, frame: AudioFrame) -> Result<(), SendError> {
        if self.stop.is_stopped() {
            return Err(SendError::Stopped(frame));
        }
        self.tx
            .blocking_send(frame)
            .map_err(|mpsc::error::SendError(frame)| SendError::Closed(frame))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }
}

#[derive(Debug)]
pub struct FrameReceiver {
    rx: mpsc::Receiver<AudioFrame>,
    stop: StopFlag,
    closed: bool,
}

impl FrameReceiver {
    /// Next frame in send order, or `None` once closed and empty.
    ///
    /// Must not be called from inside an async runtime.
    pub fn recv_blocking(&mut self) -> Option<AudioFrame> {
        self.rx.blocking_recv()
    }

    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.rx.recv().await
    }

    /// Refuse further sends. Already queued frames can still be received.
    /// Senders blocked on a full queue are woken with an error.
    pub fn close(&mut self) {
        if !self.closed {
            self.rx.close();
            self.closed = true;
        }
    }

    /// Close the channel and discard whatever is still queued. Returns the
    /// number of discarded frames.
    pub fn drain_blocking(&mut self) -> usize {
        self.close();
        let mut discarded = 0;
        while self.rx.blocking_recv().is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "drained audio channel");
        }
        discarded
    }

    pub async fn drain(&mut self) -> usize {
        self.close();
        let mut discarded = 0;
        while self.rx.recv().await.is_some() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!(discarded, "drained audio channel");
        }
        discarded
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }
}
