// Request and synthesis metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tts_core::{rtf::real_time_factor, RtfSummary, StreamStatus};

/// Latency samples kept for percentiles
const MAX_LATENCY_SAMPLES: usize = 1000;

/// Per-endpoint metrics
#[derive(Debug, Clone)]
pub struct EndpointMetrics {
    pub request_count: Arc<AtomicU64>,
    pub error_count: Arc<AtomicU64>,
    pub total_latency_ms: Arc<AtomicU64>,
    pub max_latency_ms: Arc<AtomicU64>,
    latency_samples: Arc<Mutex<VecDeque<u64>>>,
}

impl EndpointMetrics {
    pub fn new() -> Self {
        Self {
            request_count: Arc::new(AtomicU64::new(0)),
            error_count: Arc::new(AtomicU64::new(0)),
            total_latency_ms: Arc::new(AtomicU64::new(0)),
            max_latency_ms: Arc::new(AtomicU64::new(0)),
            latency_samples: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LATENCY_SAMPLES))),
        }
    }

    pub fn record_request(&self, latency_ms: u64) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.max_latency_ms.fetch_max(latency_ms, Ordering::Relaxed);

        if let Ok(mut samples) = self.latency_samples.lock() {
            if samples.len() == MAX_LATENCY_SAMPLES {
                samples.pop_front();
            }
            samples.push_back(latency_ms);
        }
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_ms(&self) -> f64 {
        let count = self.request_count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.total_latency_ms.load(Ordering::Relaxed) as f64 / count as f64
    }

    fn percentile(&self, p: u8) -> u64 {
        let Ok(samples) = self.latency_samples.lock() else {
            return 0;
        };
        if samples.is_empty() {
            return 0;
        }
        let mut sorted: Vec<u64> = samples.iter().copied().collect();
        sorted.sort_unstable();
        let index = (sorted.len() * p as usize / 100).min(sorted.len() - 1);
        sorted[index]
    }

    pub fn stats(&self) -> EndpointStats {
        EndpointStats {
            request_count: self.request_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            avg_latency_ms: self.avg_latency_ms(),
            max_latency_ms: self.max_latency_ms.load(Ordering::Relaxed),
            p50_latency_ms: self.percentile(50),
            p95_latency_ms: self.percentile(95),
        }
    }
}

impl Default for EndpointMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Totals over every finished synthesis, streamed or not
#[derive(Debug, Clone)]
pub struct SynthesisMetrics {
    pub completed: Arc<AtomicU64>,
    pub cancelled: Arc<AtomicU64>,
    pub segments: Arc<AtomicU64>,
    pub frames_streamed: Arc<AtomicU64>,
    pub total_processing_ms: Arc<AtomicU64>,
    // microseconds so sub-millisecond segments still count
    pub total_audio_us: Arc<AtomicU64>,
}

impl SynthesisMetrics {
    pub fn new() -> Self {
        Self {
            completed: Arc::new(AtomicU64::new(0)),
            cancelled: Arc::new(AtomicU64::new(0)),
            segments: Arc::new(AtomicU64::new(0)),
            frames_streamed: Arc::new(AtomicU64::new(0)),
            total_processing_ms: Arc::new(AtomicU64::new(0)),
            total_audio_us: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn record(&self, status: StreamStatus, summary: &RtfSummary, frames: u64) {
        match status {
            StreamStatus::Completed => self.completed.fetch_add(1, Ordering::Relaxed),
            StreamStatus::Cancelled => self.cancelled.fetch_add(1, Ordering::Relaxed),
        };
        self.segments
            .fetch_add(summary.segments as u64, Ordering::Relaxed);
        self.frames_streamed.fetch_add(frames, Ordering::Relaxed);
        self.total_processing_ms
            .fetch_add(summary.total_processing_ms, Ordering::Relaxed);
        self.total_audio_us.fetch_add(
            (summary.total_audio_secs * 1_000_000.0) as u64,
            Ordering::Relaxed,
        );
    }

    pub fn total_audio_secs(&self) -> f64 {
        self.total_audio_us.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }

    /// Processing time over audio time across all requests.
    pub fn overall_rtf(&self) -> Option<f64> {
        real_time_factor(
            self.total_processing_ms.load(Ordering::Relaxed),
            self.total_audio_secs(),
        )
    }

    pub fn stats(&self) -> SynthesisStats {
        SynthesisStats {
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            segments: self.segments.load(Ordering::Relaxed),
            frames_streamed: self.frames_streamed.load(Ordering::Relaxed),
            total_processing_ms: self.total_processing_ms.load(Ordering::Relaxed),
            total_audio_secs: self.total_audio_secs(),
            overall_rtf: self.overall_rtf(),
        }
    }
}

impl Default for SynthesisMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct AppMetrics {
    pub started_at: Instant,
    pub tts: EndpointMetrics,
    pub stream: EndpointMetrics,
    pub synthesis: SynthesisMetrics,
}

impl AppMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            tts: EndpointMetrics::new(),
            stream: EndpointMetrics::new(),
            synthesis: SynthesisMetrics::new(),
        }
    }

    pub fn snapshot(&self) -> MetricsResponse {
        MetricsResponse {
            timestamp: Utc::now(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            endpoints: EndpointMetricsResponse {
                tts: self.tts.stats(),
                stream: self.stream.stats(),
            },
            synthesis: self.synthesis.stats(),
        }
    }
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub endpoints: EndpointMetricsResponse,
    pub synthesis: SynthesisStats,
}

#[derive(Debug, Serialize)]
pub struct EndpointMetricsResponse {
    pub tts: EndpointStats,
    pub stream: EndpointStats,
}

#[derive(Debug, Serialize)]
pub struct EndpointStats {
    pub request_count: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SynthesisStats {
    pub completed: u64,
    pub cancelled: u64,
    pub segments: u64,
    pub frames_streamed: u64,
    pub total_processing_ms: u64,
    pub total_audio_secs: f64,
    pub overall_rtf: Option<f64>,
}
