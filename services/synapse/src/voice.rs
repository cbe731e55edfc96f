//! Microphone capture and speech recognition, plus the typed fallback.
//!
//! Capture runs on a blocking thread (cpal streams stay on the thread that
//! created them); transcription posts a 16 kHz mono WAV to the configured
//! speech-to-text endpoint. Every listen cycle produces a [`VoiceResult`],
//! never an abort.

use std::io::{BufRead, Cursor, Write};
use std::sync::mpsc as std_mpsc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use rubato::Resampler;
use synapse_live::audio;

use crate::config::Config;

const CAPTURE_CHUNK_SIZE: usize = 1024;
const STT_SAMPLE_RATE: u32 = 16000;
const TRAILING_SILENCE: Duration = Duration::from_millis(800);
const DICTATION_LIMIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceStatus {
    Listening,
    Processing,
    Success,
    Error,
    Timeout,
}

/// Outcome of one listen cycle.
#[derive(Debug, Clone)]
pub struct VoiceResult {
    pub status: VoiceStatus,
    pub text: String,
    pub confidence: f32,
    pub error: String,
}

impl VoiceResult {
    fn success(text: String, confidence: f32) -> Self {
        Self {
            status: VoiceStatus::Success,
            text,
            confidence,
            error: String::new(),
        }
    }

    fn timeout() -> Self {
        Self {
            status: VoiceStatus::Timeout,
            text: String::new(),
            confidence: 0.0,
            error: "no speech detected".to_string(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: VoiceStatus::Error,
            text: String::new(),
            confidence: 0.0,
            error: message.into(),
        }
    }
}

pub struct VoiceInput {
    language: String,
    timeout: Duration,
    phrase_limit: Duration,
    stt_endpoint: String,
    http: reqwest::Client,
    energy_threshold: Option<f32>,
}

impl VoiceInput {
    pub fn new(config: &Config) -> Self {
        Self {
            language: config.voice_language.clone(),
            timeout: config.voice_timeout,
            // Allow phrases longer than the configured pause.
            phrase_limit: config.voice_phrase_timeout * 3,
            stt_endpoint: config.stt_endpoint.clone(),
            http: reqwest::Client::new(),
            energy_threshold: None,
        }
    }

    /// Samples ambient noise for a second and sets the speech threshold.
    pub async fn calibrate(&mut self) -> Result<()> {
        println!("Calibrating microphone for ambient noise...");
        let ambient = tokio::task::spawn_blocking(|| {
            measure_ambient_rms(Duration::from_secs(1))
        })
        .await
        .context("calibration task panicked")??;
        let threshold = (ambient * 2.0).max(0.01);
        tracing::debug!(ambient, threshold, "microphone calibrated");
        self.energy_threshold = Some(threshold);
        println!("Microphone ready.");
        Ok(())
    }

    pub async fn listen(&mut self, prompt: &str) -> VoiceResult {
        self.listen_with_limit(prompt, self.phrase_limit).await
    }

    /// Longer capture window for spoken test scenarios. The closing phrase
    /// "end dictation" is stripped from the transcript.
    pub async fn listen_for_dictation(&mut self) -> VoiceResult {
        println!("Dictation mode. Say 'end dictation' when finished.");
        let mut result = self
            .listen_with_limit("Speak your test scenario", DICTATION_LIMIT)
            .await;
        if result.status == VoiceStatus::Success {
            result.text = result.text.replace("end dictation", "").trim().to_string();
        }
        result
    }

    /// Loops listen -> callback until the stop phrase is heard or the
    /// callback returns false. Timeouts and recognition errors continue the
    /// loop.
    pub async fn listen_continuous<F>(&mut self, mut callback: F, stop_phrase: &str)
    where
        F: FnMut(&str) -> bool,
    {
        println!("Continuous listening. Say '{stop_phrase}' to stop.");
        loop {
            let result = self.listen("Waiting for command...").await;
            match result.status {
                VoiceStatus::Success => {
                    if result.text.to_lowercase().contains(&stop_phrase.to_lowercase()) {
                        println!("Stopping continuous listening.");
                        break;
                    }
                    if !callback(&result.text) {
                        break;
                    }
                }
                VoiceStatus::Timeout => println!("No speech detected. Please try again."),
                _ => println!("{}", result.error),
            }
        }
    }

    async fn listen_with_limit(&mut self, prompt: &str, phrase_limit: Duration) -> VoiceResult {
        let threshold = match self.energy_threshold {
            Some(threshold) => threshold,
            None => match self.calibrate().await {
                Ok(()) => self.energy_threshold.unwrap_or(0.01),
                Err(e) => return VoiceResult::error(format!("microphone error: {e:#}")),
            },
        };

        println!("{prompt}");
        println!("Speak now...");
        tracing::debug!(status = ?VoiceStatus::Listening, "waiting for speech");

        let timeout = self.timeout;
        let captured = tokio::task::spawn_blocking(move || {
            capture_phrase(threshold, timeout, phrase_limit)
        })
        .await;

        let capture = match captured {
            Ok(Ok(Some(capture))) => capture,
            Ok(Ok(None)) => return VoiceResult::timeout(),
            Ok(Err(e)) => return VoiceResult::error(format!("capture error: {e:#}")),
            Err(e) => return VoiceResult::error(format!("capture task panicked: {e}")),
        };

        println!("Processing speech...");
        tracing::debug!(status = ?VoiceStatus::Processing, "transcribing capture");
        match self.transcribe(&capture).await {
            Ok(Some((text, confidence))) => {
                println!("Recognized: {text}");
                tracing::debug!(confidence, "transcription accepted");
                VoiceResult::success(text, confidence)
            }
            Ok(None) => VoiceResult::error("could not understand audio"),
            Err(e) => VoiceResult::error(format!("speech recognition error: {e:#}")),
        }
    }

    async fn transcribe(&self, capture: &Capture) -> Result<Option<(String, f32)>> {
        let samples = resample(&capture.samples, capture.sample_rate, STT_SAMPLE_RATE)?;
        let wav = encode_wav(&samples, STT_SAMPLE_RATE)?;

        let body = self
            .http
            .post(&self.stt_endpoint)
            .query(&[("client", "synapse"), ("lang", self.language.as_str())])
            .header("Content-Type", "audio/wav")
            .body(wav)
            .send()
            .await
            .context("speech recognition request failed")?
            .error_for_status()
            .context("speech recognition service error")?
            .text()
            .await
            .context("failed to read speech recognition response")?;

        Ok(parse_transcript(&body))
    }
}

/// Prints the available capture devices and returns their names.
pub fn list_inputs() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let default_name = host
        .default_input_device()
        .and_then(|d| d.name().ok())
        .unwrap_or_else(|| "<none>".to_string());

    let mut names = Vec::new();
    for device in host.input_devices().context("failed to enumerate input devices")? {
        if let Ok(name) = device.name() {
            names.push(name);
        }
    }

    println!("Available input devices:");
    for name in &names {
        println!("  {name}");
    }
    println!("Default input: {default_name}");
    Ok(names)
}

struct Capture {
    samples: Vec<f32>,
    sample_rate: u32,
}

fn open_capture() -> Result<(std_mpsc::Receiver<Vec<f32>>, cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("no default input device")?;
    let default_config = device
        .default_input_config()
        .context("failed to get default input config")?;
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(CAPTURE_CHUNK_SIZE as u32)),
    };
    let channel_count = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let (tx, rx) = std_mpsc::channel::<Vec<f32>>();
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = if channel_count > 1 {
                    data.chunks(channel_count)
                        .map(|c| c.iter().sum::<f32>() / channel_count as f32)
                        .collect::<Vec<f32>>()
                } else {
                    data.to_vec()
                };
                let _ = tx.send(mono);
            },
            move |err| tracing::error!("input stream error: {}", err),
            None,
        )
        .context("failed to build input stream")?;
    stream.play().context("failed to start input stream")?;
    Ok((rx, stream, sample_rate))
}

fn measure_ambient_rms(duration: Duration) -> Result<f32> {
    let (rx, _stream, _rate) = open_capture()?;
    let start = Instant::now();
    let mut total = 0.0f32;
    let mut chunks = 0usize;
    while start.elapsed() < duration {
        if let Ok(chunk) = rx.recv_timeout(Duration::from_millis(200)) {
            total += rms(&chunk);
            chunks += 1;
        }
    }
    if chunks == 0 {
        bail!("no audio received during calibration");
    }
    Ok(total / chunks as f32)
}

/// Waits for speech onset, then records until trailing silence or the
/// phrase limit. `None` means the timeout elapsed with no speech.
fn capture_phrase(
    threshold: f32,
    timeout: Duration,
    phrase_limit: Duration,
) -> Result<Option<Capture>> {
    let (rx, stream, sample_rate) = open_capture()?;

    let mut samples: Vec<f32> = Vec::new();
    let wait_start = Instant::now();
    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(chunk) => {
                if rms(&chunk) > threshold {
                    samples.extend(chunk);
                    break;
                }
            }
            Err(std_mpsc::RecvTimeoutError::Timeout) => {}
            Err(std_mpsc::RecvTimeoutError::Disconnected) => bail!("input stream closed"),
        }
        if wait_start.elapsed() > timeout {
            return Ok(None);
        }
    }

    let speech_start = Instant::now();
    let mut silent_for = Duration::ZERO;
    while speech_start.elapsed() < phrase_limit {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(chunk) => {
                let chunk_duration =
                    Duration::from_secs_f64(chunk.len() as f64 / sample_rate as f64);
                if rms(&chunk) > threshold {
                    silent_for = Duration::ZERO;
                } else {
                    silent_for += chunk_duration;
                }
                samples.extend(chunk);
                if silent_for >= TRAILING_SILENCE {
                    break;
                }
            }
            Err(_) => break,
        }
    }

    drop(stream);
    Ok(Some(Capture {
        samples,
        sample_rate,
    }))
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples.iter().map(|s| s * s).sum();
    (sum / samples.len() as f32).sqrt()
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }
    let mut resampler = audio::create_resampler(from_rate as f64, to_rate as f64, audio::CHUNK_SIZE)?;
    let mut out = Vec::new();
    for chunk in audio::split_for_chunks(samples, audio::CHUNK_SIZE) {
        let resampled = resampler
            .process(&[chunk.as_slice()], None)
            .context("resampling failed")?;
        if let Some(channel) = resampled.first() {
            out.extend_from_slice(channel);
        }
    }
    Ok(out)
}

fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("failed to create WAV writer")?;
        for &sample in samples {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value)?;
        }
        writer.finalize().context("failed to finalize WAV")?;
    }
    Ok(cursor.into_inner())
}

/// Parses the line-oriented JSON the speech API returns: each line is an
/// object whose `result` array holds alternatives; the first non-empty line
/// wins.
fn parse_transcript(body: &str) -> Option<(String, f32)> {
    for line in body.lines() {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        let Some(results) = value.get("result").and_then(|r| r.as_array()) else {
            continue;
        };
        let Some(first) = results.first() else {
            continue;
        };
        let Some(alternative) = first
            .get("alternative")
            .and_then(|a| a.as_array())
            .and_then(|a| a.first())
        else {
            continue;
        };
        let Some(transcript) = alternative.get("transcript").and_then(|t| t.as_str()) else {
            continue;
        };
        let transcript = transcript.trim();
        if transcript.is_empty() {
            continue;
        }
        let confidence = alternative
            .get("confidence")
            .and_then(|c| c.as_f64())
            .unwrap_or(1.0) as f32;
        return Some((transcript.to_string(), confidence));
    }
    None
}

/// Typed fallback when no microphone is in use.
pub struct TextInput;

impl TextInput {
    pub fn get_input(prompt: &str) -> Result<String> {
        println!("{prompt}");
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read stdin")?;
        Ok(line.trim().to_string())
    }

    /// Reads lines until an empty one.
    pub fn get_multiline_input(prompt: &str) -> Result<String> {
        println!("{prompt} (empty line to finish)");
        let mut lines = Vec::new();
        let stdin = std::io::stdin();
        loop {
            let mut line = String::new();
            stdin
                .lock()
                .read_line(&mut line)
                .context("failed to read stdin")?;
            let line = line.trim_end_matches(['\n', '\r']);
            if line.is_empty() {
                break;
            }
            lines.push(line.to_string());
        }
        Ok(lines.join("\n"))
    }
}

/// Input selection for the interactive modes.
pub enum InputSource {
    Voice(Box<VoiceInput>),
    Text,
}

impl InputSource {
    pub async fn get_input(&mut self, prompt: &str) -> Result<String> {
        match self {
            InputSource::Voice(voice) => {
                let result = voice.listen(prompt).await;
                match result.status {
                    VoiceStatus::Success => Ok(result.text),
                    VoiceStatus::Timeout => {
                        println!("No speech detected. Please try again.");
                        Ok(String::new())
                    }
                    _ => {
                        println!("{}", result.error);
                        Ok(String::new())
                    }
                }
            }
            InputSource::Text => TextInput::get_input(prompt),
        }
    }

    pub async fn dictate(&mut self) -> Result<String> {
        match self {
            InputSource::Voice(voice) => {
                let result = voice.listen_for_dictation().await;
                if result.status == VoiceStatus::Success {
                    Ok(result.text)
                } else {
                    println!("{}", result.error);
                    Ok(String::new())
                }
            }
            InputSource::Text => TextInput::get_multiline_input("Enter your test scenario:"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_takes_first_nonempty_result_line() {
        let body = concat!(
            "{\"result\":[]}\n",
            "{\"result\":[{\"alternative\":[{\"transcript\":\"generate scenarios\",\"confidence\":0.92}],\"final\":true}],\"result_index\":0}\n",
        );
        let (text, confidence) = parse_transcript(body).unwrap();
        assert_eq!(text, "generate scenarios");
        assert!((confidence - 0.92).abs() < 1e-6);
    }

    #[test]
    fn transcript_without_confidence_defaults_to_one() {
        let body = r#"{"result":[{"alternative":[{"transcript":"run tests"}]}]}"#;
        let (text, confidence) = parse_transcript(body).unwrap();
        assert_eq!(text, "run tests");
        assert_eq!(confidence, 1.0);
    }

    #[test]
    fn empty_or_garbage_body_has_no_transcript() {
        assert!(parse_transcript("").is_none());
        assert!(parse_transcript("not json").is_none());
        assert!(parse_transcript("{\"result\":[]}").is_none());
    }

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_of_constant_signal_is_its_amplitude() {
        assert!((rms(&[0.5, -0.5, 0.5, -0.5]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn wav_encoding_produces_a_riff_header() {
        let wav = encode_wav(&[0.0, 0.1, -0.1], 16000).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header plus 3 samples at 2 bytes each.
        assert_eq!(wav.len(), 44 + 6);
    }
}
