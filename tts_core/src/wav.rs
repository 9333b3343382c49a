//! Minimal WAV codec: chunk-scanning decoder (8/16-bit PCM, any channel
//! count, downmixed to mono) and a canonical mono 16-bit encoder.

use std::{fs, path::Path};

use base64::{engine::general_purpose, Engine as _};
use tracing::debug;

use crate::error::WavError;

const RIFF: &[u8; 4] = b"RIFF";
const WAVE: &[u8; 4] = b"WAVE";
const FMT: &[u8; 4] = b"fmt ";
const DATA: &[u8; 4] = b"data";

/// Size of the header written by [`encode`].
pub const CANONICAL_HEADER_LEN: usize = 44;

/// Parsed `fmt ` + `data` chunk information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Payload length in bytes.
    pub data_len: usize,
    /// Byte offset of the first payload byte.
    pub data_offset: usize,
}

impl WavHeader {
    pub fn block_align(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }

    /// Number of sample frames (one sample per channel each).
    pub fn num_frames(&self) -> usize {
        self.data_len / self.block_align()
    }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Scan the RIFF container for `fmt ` and `data` chunks.
pub fn parse_header(bytes: &[u8]) -> Result<WavHeader, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != RIFF {
        return Err(WavError::MissingRiff);
    }
    if &bytes[8..12] != WAVE {
        return Err(WavError::NotWave);
    }

    // (channels, sample_rate, bits_per_sample)
    let mut fmt: Option<(u16, u32, u16)> = None;
    let mut pos = 12usize;

    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4) as usize;
        let body = pos + 8;

        if id == FMT {
            if size < 16 || body + 16 > bytes.len() {
                return Err(WavError::Truncated("fmt ".into()));
            }
            let channels = read_u16(bytes, body + 2);
            let sample_rate = read_u32(bytes, body + 4);
            let bits_per_sample = read_u16(bytes, body + 14);
            debug!(channels, sample_rate, bits_per_sample, "fmt chunk");
            fmt = Some((channels, sample_rate, bits_per_sample));
        } else if id == DATA {
            let (channels, sample_rate, bits_per_sample) = fmt.ok_or(WavError::MissingFmt)?;
            if channels == 0 {
                return Err(WavError::InvalidChannels);
            }
            if sample_rate == 0 {
                return Err(WavError::InvalidSampleRate);
            }
            if bits_per_sample != 8 && bits_per_sample != 16 {
                return Err(WavError::UnsupportedBitsPerSample(bits_per_sample));
            }
            if body + size > bytes.len() {
                return Err(WavError::Truncated("data".into()));
            }
            let header = WavHeader {
                sample_rate,
                channels,
                bits_per_sample,
                data_len: size,
                data_offset: body,
            };
            let block_align = header.block_align();
            if size % block_align != 0 {
                return Err(WavError::PayloadMisaligned {
                    len: size,
                    block_align,
                });
            }
            return Ok(header);
        }

        // chunks are word aligned
        pos = body + size + (size & 1);
    }

    if fmt.is_none() {
        Err(WavError::MissingFmt)
    } else {
        Err(WavError::MissingData)
    }
}

/// Decode WAV bytes into mono float samples in [-1.0, 1.0] and the sample rate.
pub fn decode(bytes: &[u8]) -> Result<(Vec<f32>, u32), WavError> {
    let header = parse_header(bytes)?;
    let payload = &bytes[header.data_offset..header.data_offset + header.data_len];
    let channels = header.channels as usize;
    let width = header.bits_per_sample as usize / 8;

    let samples = payload
        .chunks_exact(header.block_align())
        .map(|frame| {
            let sum: f32 = frame
                .chunks_exact(width)
                .map(|s| match width {
                    2 => i16::from_le_bytes([s[0], s[1]]) as f32 / 32768.0,
                    _ => (s[0] as i32 - 128) as f32 / 128.0,
                })
                .sum();
            sum / channels as f32
        })
        .collect::<Vec<f32>>();

    Ok((samples, header.sample_rate))
}

/// Scale by 32767 and truncate toward zero into little-endian 16-bit PCM.
pub fn float_to_pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(samples.len() * 2);
    for &s in samples {
        // `as` truncates toward zero and saturates; NaN maps to 0
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Encode mono float samples as a canonical 44-byte-header 16-bit PCM WAV.
pub fn encode(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 16;
    let block_align: u16 = num_channels * (bits_per_sample / 8);
    // Header fields saturate; RIFF sizes cannot describe more than u32::MAX bytes
    let byte_rate: u32 = sample_rate.saturating_mul(block_align as u32);
    let data_size: u32 = u32::try_from(samples.len().saturating_mul(2)).unwrap_or(u32::MAX);
    let riff_size: u32 = data_size.saturating_add(36);

    let mut out = Vec::<u8>::with_capacity(CANONICAL_HEADER_LEN + samples.len() * 2);

    // RIFF header
    out.extend_from_slice(RIFF);
    out.extend_from_slice(&riff_size.to_le_bytes());
    out.extend_from_slice(WAVE);

    // fmt chunk
    out.extend_from_slice(FMT);
    out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&num_channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    out.extend_from_slice(DATA);
    out.extend_from_slice(&data_size.to_le_bytes());
    out.extend_from_slice(&float_to_pcm16_bytes(samples));

    out
}

/// Encode as WAV and return Base64.
pub fn encode_base64(samples: &[f32], sample_rate: u32) -> String {
    general_purpose::STANDARD.encode(encode(samples, sample_rate))
}

pub fn read_file<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, u32), WavError> {
    let bytes = fs::read(path.as_ref())?;
    decode(&bytes)
}

pub fn write_file<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<(), WavError> {
    fs::write(path.as_ref(), encode(samples, sample_rate))?;
    Ok(())
}
