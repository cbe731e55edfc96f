//! Real-time voice session against the live LLM API.
//!
//! The session fans out over five concurrent pieces: the microphone callback
//! feeding a bounded queue, a sender task resampling to 16 kHz and shipping
//! base64 chunks, a receiver task splitting server messages into playback
//! audio, printed text and tool calls, a playback task feeding the output
//! ring buffer, and a keyboard task for typed turns. One cancellation token
//! tears all of them down.

use std::collections::VecDeque;
use std::io::Write;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use rubato::Resampler;
use serde_json::{json, Value};
use synapse_live::audio::{self, RECEIVE_SAMPLE_RATE, SEND_SAMPLE_RATE};
use synapse_live::types::FunctionCall;
use synapse_live::LiveClient;
use synapse_rpc::{GolemClient, MarkerClient, ScoutClient};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

const INPUT_CHUNK_SIZE: usize = 1024;
const OUTPUT_CHUNK_SIZE: usize = 1024;
const OUTPUT_LATENCY_MS: usize = 1000;
// Backpressure on the mic path: drop chunks rather than queue stale audio.
const MIC_QUEUE_DEPTH: usize = 5;

const SYSTEM_INSTRUCTION: &str = r#"You are Synapse, a voice-controlled test automation assistant.
You help users with test automation tasks by understanding their voice commands.

IMPORTANT: The user can speak to you OR type in the console. For paths, URLs, and technical details,
ASK the user to TYPE them in the console - don't try to understand paths from voice.

Available actions:
1. generate_scenarios - Generate test scenarios from a frontend project
   - Requires: project_path (ask user to type it)

2. generate_tests - Generate Playwright tests from scenarios
   - Requires: scenarios_path (ask user to type it)
   - Optional: framework (playwright/robot/cypress), base_url

3. run_tests - Run the generated tests
   - Requires: test_dir (ask user to type it)
   - Optional: base_url, headed (true/false)

4. add_test_ids - Add data-testid attributes to frontend components
   - Requires: project_path (ask user to type it)

Workflow:
1. User says what they want (e.g. "generate scenarios")
2. You identify the intent and ask them to TYPE any required paths/URLs
3. User types the path in console
4. You confirm and execute

Keep responses concise. Always ask for paths via typing, not voice."#;

enum PlaybackMsg {
    Audio(Vec<f32>),
    /// Drop any queued-but-unplayed audio (interruption support).
    Flush,
}

pub async fn run(config: Config) -> Result<()> {
    let api_key = config.require_api_key()?;

    println!("  VOICE: Speak commands naturally");
    println!("  TYPE:  Enter paths, URLs, or any text below");
    println!("  EXIT:  Say 'stop' or type 'q'");
    println!();
    println!("  TIP: Use headphones to prevent echo!");
    println!();
    println!("Connecting to live API...");

    let client = std::sync::Arc::new(
        LiveClient::connect(api_key)
            .await
            .context("failed to connect to live API")?,
    );
    let mut server_events = client.server_events();
    client
        .send_setup(&config.gemini_live_model, SYSTEM_INSTRUCTION)
        .await
        .context("failed to send session setup")?;

    let token = CancellationToken::new();

    // Microphone capture. The stream stays on this task; only samples cross
    // into the sender.
    let (mic_tx, mut mic_rx) = tokio::sync::mpsc::channel::<Vec<f32>>(MIC_QUEUE_DEPTH);

    let host = cpal::default_host();
    let input = host
        .default_input_device()
        .context("no default audio input device")?;
    tracing::info!("using input device: {:?}", input.name()?);
    let input_config = input
        .default_input_config()
        .context("failed to get default input config")?;
    let input_config = StreamConfig {
        channels: input_config.channels(),
        sample_rate: input_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(INPUT_CHUNK_SIZE as u32)),
    };
    let input_channel_count = input_config.channels as usize;
    let input_sample_rate = input_config.sample_rate.0 as f64;

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        let mono = if input_channel_count > 1 {
            data.chunks(input_channel_count)
                .map(|c| c.iter().sum::<f32>() / input_channel_count as f32)
                .collect::<Vec<f32>>()
        } else {
            data.to_vec()
        };
        // Full queue means the sender is behind; drop the chunk.
        let _ = mic_tx.try_send(mono);
    };
    let input_stream = input
        .build_input_stream(
            &input_config,
            input_data_fn,
            move |err| tracing::error!("input stream error: {}", err),
            None,
        )
        .context("failed to build input stream")?;
    input_stream.play().context("failed to start input stream")?;

    // Speaker output via a ring buffer drained by the device callback.
    let output = host
        .default_output_device()
        .context("no default audio output device")?;
    tracing::info!("using output device: {:?}", output.name()?);
    let output_config = output
        .default_output_config()
        .context("failed to get default output config")?;
    let output_config = StreamConfig {
        channels: output_config.channels(),
        sample_rate: output_config.sample_rate(),
        buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
    };
    let output_channel_count = output_config.channels as usize;
    let output_sample_rate = output_config.sample_rate.0 as f64;

    let buffer_len = output_sample_rate as usize * OUTPUT_LATENCY_MS / 1000;
    let (mut audio_out_tx, mut audio_out_rx) = audio::shared_buffer(buffer_len).split();

    let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        for frame in data.chunks_mut(output_channel_count) {
            let sample = audio_out_rx.try_pop().unwrap_or(0.0);
            for channel in frame {
                *channel = sample;
            }
        }
    };
    let output_stream = output
        .build_output_stream(
            &output_config,
            output_data_fn,
            move |err| tracing::error!("output stream error: {}", err),
            None,
        )
        .context("failed to build output stream")?;
    output_stream.play().context("failed to start output stream")?;

    // Sender: mic queue -> 16 kHz -> base64 -> session.
    let mut in_resampler =
        audio::create_resampler(input_sample_rate, SEND_SAMPLE_RATE, INPUT_CHUNK_SIZE)?;
    let send_client = client.clone();
    let send_token = token.clone();
    let sender = tokio::spawn(async move {
        let mut buffer: VecDeque<f32> = VecDeque::with_capacity(INPUT_CHUNK_SIZE * 2);
        loop {
            tokio::select! {
                _ = send_token.cancelled() => break,
                chunk = mic_rx.recv() => {
                    let Some(chunk) = chunk else { break };
                    buffer.extend(chunk);
                    let mut resampled: Vec<f32> = Vec::new();
                    while buffer.len() >= INPUT_CHUNK_SIZE {
                        let frame: Vec<f32> = buffer.drain(..INPUT_CHUNK_SIZE).collect();
                        if let Ok(out) = in_resampler.process(&[frame.as_slice()], None) {
                            if let Some(channel) = out.first() {
                                resampled.extend_from_slice(channel);
                            }
                        }
                    }
                    if resampled.is_empty() {
                        continue;
                    }
                    if send_client.send_audio_chunk(audio::encode(&resampled)).await.is_err() {
                        tracing::warn!("session closed while sending audio");
                        send_token.cancel();
                        break;
                    }
                }
            }
        }
    });

    // Receiver: server messages -> playback queue / stdout / tool calls.
    let (playback_tx, mut playback_rx) = tokio::sync::mpsc::unbounded_channel::<PlaybackMsg>();
    let recv_client = client.clone();
    let recv_token = token.clone();
    let recv_config = config.clone();
    let receiver = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = recv_token.cancelled() => break,
                message = server_events.recv() => message,
            };
            match message {
                Ok(message) => {
                    if message.setup_complete.is_some() {
                        println!("Connected! Listening...\n");
                    }
                    if let Some(content) = message.server_content {
                        if let Some(turn) = content.model_turn {
                            for part in turn.parts {
                                if let Some(chunk) = part.inline_data {
                                    let samples = audio::decode(&chunk.data);
                                    let _ = playback_tx.send(PlaybackMsg::Audio(samples));
                                }
                                if let Some(text) = part.text {
                                    print!("{text}");
                                    let _ = std::io::stdout().flush();
                                }
                            }
                        }
                        if content.interrupted || content.turn_complete {
                            let _ = playback_tx.send(PlaybackMsg::Flush);
                            if content.turn_complete {
                                println!();
                            }
                        }
                    }
                    if let Some(tool_call) = message.tool_call {
                        for call in tool_call.function_calls {
                            println!("\n[Tool call: {} {}]", call.name, call.args);
                            let response = handle_tool_call(&recv_config, &call).await;
                            if recv_client
                                .send_tool_response(call.id.clone(), &call.name, response)
                                .await
                                .is_err()
                            {
                                recv_token.cancel();
                            }
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("dropped {} server messages", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    recv_token.cancel();
                    break;
                }
            }
        }
    });

    // Playback: inbound 24 kHz audio -> device rate -> ring buffer.
    let mut out_resampler =
        audio::create_resampler(RECEIVE_SAMPLE_RATE, output_sample_rate, 100)?;
    let playback_token = token.clone();
    let playback = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                _ = playback_token.cancelled() => break,
                msg = playback_rx.recv() => msg,
            };
            match msg {
                Some(PlaybackMsg::Audio(samples)) => {
                    let chunk_size = out_resampler.input_frames_next();
                    for chunk in audio::split_for_chunks(&samples, chunk_size) {
                        if let Ok(out) = out_resampler.process(&[chunk.as_slice()], None) {
                            if let Some(channel) = out.first() {
                                for &sample in channel {
                                    let _ = audio_out_tx.try_push(sample);
                                }
                            }
                        }
                    }
                }
                Some(PlaybackMsg::Flush) => {
                    while playback_rx.try_recv().is_ok() {}
                }
                None => break,
            }
        }
    });

    // Keyboard: typed turns alongside voice; quit words end the session.
    let (line_tx, mut line_rx) = tokio::sync::mpsc::channel::<String>(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match std::io::BufRead::read_line(&mut stdin.lock(), &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if line_tx.blocking_send(line.trim().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    let kb_client = client.clone();
    let kb_token = token.clone();
    let keyboard = tokio::spawn(async move {
        loop {
            let line = tokio::select! {
                _ = kb_token.cancelled() => break,
                line = line_rx.recv() => match line {
                    Some(line) => line,
                    None => break,
                },
            };
            if line.is_empty() {
                continue;
            }
            if ["q", "quit", "exit", "stop", "koniec"].contains(&line.to_lowercase().as_str()) {
                kb_token.cancel();
                break;
            }
            println!(">>> {line}");
            if kb_client.send_text(&line).await.is_err() {
                tracing::warn!("session closed while sending text");
                kb_token.cancel();
                break;
            }
        }
    });

    tokio::select! {
        _ = token.cancelled() => {}
        _ = tokio::signal::ctrl_c() => {
            println!("\nReceived Ctrl-C, shutting down...");
            token.cancel();
        }
    }

    let _ = tokio::join!(sender, receiver, playback, keyboard);
    drop(input_stream);
    drop(output_stream);
    println!("\nSession ended.");
    Ok(())
}

fn error_value(message: &str) -> Value {
    json!({ "status": "error", "error": message })
}

/// Executes a model-requested tool against the backing gRPC services.
/// Failures come back as error payloads for the model, never as process
/// errors.
async fn handle_tool_call(config: &Config, call: &FunctionCall) -> Value {
    let args = &call.args;
    match call.name.as_str() {
        "generate_scenarios" => {
            let Some(project_path) = args.get("project_path").and_then(Value::as_str) else {
                return error_value("project_path is required");
            };
            match ScoutClient::connect(&config.scout_endpoint).await {
                Ok(mut client) => {
                    let result = client
                        .generate_scenarios(project_path, "synapse", "tester")
                        .await;
                    match result.data {
                        Some(summary) if result.success => json!({
                            "status": "success",
                            "output_path": summary.output_path,
                            "scenarios_count": summary.scenarios_count,
                        }),
                        _ => error_value(result.error_message()),
                    }
                }
                Err(e) => error_value(&e.to_string()),
            }
        }
        "generate_tests" => {
            let Some(scenarios_path) = args.get("scenarios_path").and_then(Value::as_str) else {
                return error_value("scenarios_path is required");
            };
            let framework = args
                .get("framework")
                .and_then(Value::as_str)
                .unwrap_or("playwright");
            let base_url = args.get("base_url").and_then(Value::as_str).unwrap_or("");
            match GolemClient::connect(&config.golem_endpoint).await {
                Ok(mut client) => {
                    let result = client
                        .generate_tests(scenarios_path, framework, "python", base_url)
                        .await;
                    match result.data {
                        Some(summary) if result.success => json!({
                            "status": "success",
                            "output_dir": summary.output_dir,
                            "tests_count": summary.tests_count,
                        }),
                        _ => error_value(result.error_message()),
                    }
                }
                Err(e) => error_value(&e.to_string()),
            }
        }
        "run_tests" => {
            let Some(test_dir) = args.get("test_dir").and_then(Value::as_str) else {
                return error_value("test_dir is required");
            };
            let base_url = args.get("base_url").and_then(Value::as_str).unwrap_or("");
            let headed = args.get("headed").and_then(Value::as_bool).unwrap_or(false);
            match GolemClient::connect(&config.golem_endpoint).await {
                Ok(mut client) => {
                    let result = client.run_tests(test_dir, base_url, headed, "chromium").await;
                    match result.data {
                        Some(summary) if result.success => json!({
                            "status": "success",
                            "tests_run": summary.tests_run,
                            "tests_passed": summary.tests_passed,
                            "tests_failed": summary.tests_failed,
                        }),
                        _ => error_value(result.error_message()),
                    }
                }
                Err(e) => error_value(&e.to_string()),
            }
        }
        "add_test_ids" => {
            let Some(project_path) = args.get("project_path").and_then(Value::as_str) else {
                return error_value("project_path is required");
            };
            match MarkerClient::connect(&config.marker_endpoint).await {
                Ok(mut client) => {
                    let result = client.run_marker(project_path, false, "", &[]).await;
                    match result.data {
                        Some(summary) if result.success => json!({
                            "status": "success",
                            "files_processed": summary.files_processed,
                            "ids_added": summary.ids_added,
                        }),
                        _ => error_value(result.error_message()),
                    }
                }
                Err(e) => error_value(&e.to_string()),
            }
        }
        other => error_value(&format!("unknown tool: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: Value) -> FunctionCall {
        serde_json::from_value(json!({ "name": name, "args": args })).unwrap()
    }

    fn test_config() -> Config {
        Config {
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash-exp".to_string(),
            gemini_live_model: "models/gemini-2.0-flash-exp".to_string(),
            // Unroutable port; connection failures must come back as error
            // payloads, not panics.
            scout_endpoint: "http://127.0.0.1:1".to_string(),
            golem_endpoint: "http://127.0.0.1:1".to_string(),
            marker_endpoint: "http://127.0.0.1:1".to_string(),
            output_dir: "output".to_string(),
            voice_language: "en-US".to_string(),
            voice_timeout: std::time::Duration::from_secs(5),
            voice_phrase_timeout: std::time::Duration::from_secs(3),
            stt_endpoint: crate::config::DEFAULT_STT_ENDPOINT.to_string(),
            log_level: tracing::Level::INFO,
        }
    }

    #[tokio::test]
    async fn missing_required_argument_is_an_error_payload() {
        let config = test_config();
        let response = handle_tool_call(&config, &call("generate_scenarios", json!({}))).await;
        assert_eq!(response["status"], "error");
        assert!(response["error"].as_str().unwrap().contains("project_path"));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_payload() {
        let config = test_config();
        let response = handle_tool_call(&config, &call("reboot_planet", json!({}))).await;
        assert_eq!(response["status"], "error");
        assert!(response["error"].as_str().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn unreachable_service_is_an_error_payload() {
        let config = test_config();
        let response = handle_tool_call(
            &config,
            &call("generate_scenarios", json!({ "project_path": "/srv/app" })),
        )
        .await;
        assert_eq!(response["status"], "error");
    }
}
