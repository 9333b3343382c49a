//! Start/stop driver tying the producer, channel and a sink together.
//!
//! The producer runs on a scoped worker thread; the calling thread is the
//! consumer and performs the blocking sink writes. Both sides watch the
//! request's [`StopFlag`](crate::request::StopFlag).

use std::{ops::ControlFlow, thread};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    audio::{AudioFrame, AudioResult},
    channel::audio_channel,
    error::PipelineError,
    producer::{StreamStatus, Synthesizer},
    request::SynthesisRequest,
    rtf::RtfReport,
    sink::AudioSink,
};

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub status: StreamStatus,
    pub frames_emitted: u64,
    pub frames_written: usize,
    pub frames_discarded: usize,
    #[serde(skip)]
    pub audio: AudioResult,
    pub rtf: RtfReport,
}

#[derive(Clone)]
pub struct StreamingPipeline {
    synth: Synthesizer,
}

impl StreamingPipeline {
    pub fn new(synth: Synthesizer) -> Self {
        Self { synth }
    }

    pub fn synthesizer(&self) -> &Synthesizer {
        &self.synth
    }

    /// Synthesize `request` into `sink`, returning once the producer has
    /// exited and the channel is drained.
    pub fn run(
        &self,
        request: &SynthesisRequest,
        sink: &mut dyn AudioSink,
    ) -> Result<StreamReport, PipelineError> {
        request.check_voice(self.synth.engine())?;
        sink.reset()?;

        let stop = request.stop_flag().clone();
        let (tx, mut rx) = audio_channel(self.synth.config().channel_capacity, stop.clone());
        let synth = &self.synth;

        thread::scope(|scope| {
            let producer = scope.spawn(move || {
                let emit = |frame: AudioFrame| match tx.send(frame) {
                    Ok(()) => ControlFlow::Continue(()),
                    Err(e) => {
                        debug!(seq = e.into_frame().seq(), "frame refused, stopping producer");
                        ControlFlow::Break(())
                    }
                };
                synth.synthesize(request, &emit)
            });

            let mut written = 0usize;
            let mut discarded = 0usize;
            let mut sink_error = None;
            while let Some(frame) = rx.recv_blocking() {
                if stop.is_stopped() {
                    discarded += 1;
                    break;
                }
                if let Err(e) = sink.write(frame) {
                    warn!(error = %e, "sink write failed, stopping stream");
                    stop.request_stop();
                    sink_error = Some(e);
                    break;
                }
                written += 1;
            }
            discarded += rx.drain_blocking();

            let produced = producer.join();

            if let Some(e) = sink_error {
                sink.stop();
                return Err(PipelineError::Sink(e));
            }
            let outcome = match produced {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    sink.stop();
                    return Err(PipelineError::Synthesis(e));
                }
                Err(_) => {
                    sink.stop();
                    return Err(PipelineError::ProducerPanicked);
                }
            };

            let status = if outcome.is_cancelled() || stop.is_stopped() {
                StreamStatus::Cancelled
            } else {
                StreamStatus::Completed
            };
            match status {
                StreamStatus::Completed => {
                    if let Err(e) = sink.finish() {
                        sink.stop();
                        return Err(PipelineError::Sink(e));
                    }
                }
                StreamStatus::Cancelled => sink.stop(),
            }

            info!(
                ?status,
                written,
                discarded,
                emitted = outcome.frames_emitted,
                "stream finished"
            );

            Ok(StreamReport {
                status,
                frames_emitted: outcome.frames_emitted,
                frames_written: written,
                frames_discarded: discarded,
                audio: outcome.audio,
                rtf: outcome.rtf,
            })
        })
    }
}
