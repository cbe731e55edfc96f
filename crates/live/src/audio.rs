//! PCM helpers for the live session's audio path.
//!
//! The live API takes 16 kHz mono PCM16 and answers with 24 kHz PCM16, both
//! base64-encoded. Device-rate f32 samples are resampled and converted here.

use base64::Engine;
use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree};

pub const SEND_SAMPLE_RATE: f64 = 16000.0;
pub const RECEIVE_SAMPLE_RATE: f64 = 24000.0;
pub const CHUNK_SIZE: usize = 1024;

pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1,
    )?;
    Ok(resampler)
}

/// Splits samples into fixed-size chunks, zero-padding the tail.
pub fn split_for_chunks(samples: &[f32], chunk_size: usize) -> Vec<Vec<f32>> {
    samples
        .chunks(chunk_size)
        .map(|chunk| {
            let mut chunk = chunk.to_vec();
            chunk.resize(chunk_size, 0.0);
            chunk
        })
        .collect()
}

pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Base64 PCM16LE to normalized f32 samples.
pub fn decode(fragment: &str) -> Vec<f32> {
    if let Ok(pcm16) = base64::engine::general_purpose::STANDARD.decode(fragment) {
        pcm16
            .chunks_exact(2)
            .map(|chunk| {
                let v = i16::from_le_bytes([chunk[0], chunk[1]]);
                (v as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
            })
            .collect()
    } else {
        tracing::error!("failed to decode base64 audio fragment");
        Vec::new()
    }
}

/// Normalized f32 samples to base64 PCM16LE.
pub fn encode(pcm32: &[f32]) -> String {
    let pcm16: Vec<u8> = pcm32
        .iter()
        .flat_map(|&sample| {
            ((sample * i16::MAX as f32) as i16)
                .clamp(i16::MIN, i16::MAX)
                .to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_reads_little_endian_pcm16() {
        let encoded = base64::engine::general_purpose::STANDARD
            .encode([0x00u8, 0x00, 0xFF, 0x7F, 0x01, 0x80]);
        let samples = decode(&encoded);
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0], 0.0);
        assert!((samples[1] - 1.0).abs() < 1e-4);
        assert!((samples[2] + 1.0).abs() < 1e-4);
    }

    #[test]
    fn decode_of_garbage_is_empty() {
        assert!(decode("not base64 !!!").is_empty());
    }

    #[test]
    fn split_pads_the_last_chunk() {
        let chunks = split_for_chunks(&[1.0, 2.0, 3.0], 2);
        assert_eq!(chunks, vec![vec![1.0, 2.0], vec![3.0, 0.0]]);
    }

    #[test]
    fn encode_clamps_out_of_range_samples() {
        let encoded = encode(&[2.0]);
        let decoded = decode(&encoded);
        assert!((decoded[0] - 1.0).abs() < 1e-4);
    }
}
