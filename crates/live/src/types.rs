//! Wire types for the v1beta `BidiGenerateContent` WebSocket protocol.
//!
//! Client messages carry exactly one top-level key, so they serialize from an
//! externally tagged enum. Server messages may carry extra sibling fields, so
//! they deserialize into a struct of options instead.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub enum ClientEvent {
    Setup(Setup),
    ClientContent(ClientContent),
    RealtimeInput(RealtimeInput),
    ToolResponse(ToolResponse),
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    pub model: String,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ClientContent {
    pub turns: Vec<Turn>,
    pub turn_complete: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct Turn {
    pub role: String,
    pub parts: Vec<TextPart>,
}

#[derive(Serialize, Debug, Clone)]
pub struct TextPart {
    pub text: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<MediaChunk>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MediaChunk {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub response: serde_json::Value,
}

impl ClientEvent {
    pub fn setup(model: &str, system_instruction: &str) -> Self {
        ClientEvent::Setup(Setup {
            model: model.to_string(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
            },
            system_instruction: Some(Content {
                parts: vec![Part {
                    text: Some(system_instruction.to_string()),
                    inline_data: None,
                }],
            }),
        })
    }

    /// One base64-encoded PCM chunk of microphone audio.
    pub fn audio_chunk(base64_pcm: String) -> Self {
        ClientEvent::RealtimeInput(RealtimeInput {
            media_chunks: vec![MediaChunk {
                mime_type: "audio/pcm".to_string(),
                data: base64_pcm,
            }],
        })
    }

    /// A typed user turn, closing the turn so the model responds.
    pub fn user_text(text: &str) -> Self {
        ClientEvent::ClientContent(ClientContent {
            turns: vec![Turn {
                role: "user".to_string(),
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            }],
            turn_complete: true,
        })
    }

    pub fn tool_response(
        id: Option<String>,
        name: &str,
        response: serde_json::Value,
    ) -> Self {
        ClientEvent::ToolResponse(ToolResponse {
            function_responses: vec![FunctionResponse {
                id,
                name: name.to_string(),
                response,
            }],
        })
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerMessage {
    pub setup_complete: Option<SetupComplete>,
    pub server_content: Option<ServerContent>,
    pub tool_call: Option<ToolCall>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SetupComplete {}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerContent {
    pub model_turn: Option<Content>,
    pub turn_complete: bool,
    pub interrupted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<MediaChunk>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolCall {
    pub function_calls: Vec<FunctionCall>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_serializes_with_a_single_tag() {
        let event = ClientEvent::setup("models/gemini-2.0-flash-exp", "be brief");
        let json = serde_json::to_value(&event).unwrap();
        let setup = &json["setup"];
        assert_eq!(setup["model"], "models/gemini-2.0-flash-exp");
        assert_eq!(setup["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(setup["systemInstruction"]["parts"][0]["text"], "be brief");
    }

    #[test]
    fn audio_chunk_uses_pcm_mime_type() {
        let json = serde_json::to_value(ClientEvent::audio_chunk("AAAA".to_string())).unwrap();
        let chunk = &json["realtimeInput"]["mediaChunks"][0];
        assert_eq!(chunk["mimeType"], "audio/pcm");
        assert_eq!(chunk["data"], "AAAA");
    }

    #[test]
    fn user_text_closes_the_turn() {
        let json = serde_json::to_value(ClientEvent::user_text("run the tests")).unwrap();
        let content = &json["clientContent"];
        assert_eq!(content["turnComplete"], true);
        assert_eq!(content["turns"][0]["role"], "user");
        assert_eq!(content["turns"][0]["parts"][0]["text"], "run the tests");
    }

    #[test]
    fn server_content_with_audio_part_deserializes() {
        let raw = r#"{
            "serverContent": {
                "modelTurn": {
                    "parts": [
                        {"inlineData": {"mimeType": "audio/pcm;rate=24000", "data": "UklG"}},
                        {"text": "done"}
                    ]
                },
                "turnComplete": true
            }
        }"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        let content = message.server_content.unwrap();
        assert!(content.turn_complete);
        let parts = &content.model_turn.unwrap().parts;
        assert_eq!(parts[0].inline_data.as_ref().unwrap().data, "UklG");
        assert_eq!(parts[1].text.as_deref(), Some("done"));
    }

    #[test]
    fn tool_call_deserializes_with_args() {
        let raw = r#"{
            "toolCall": {
                "functionCalls": [
                    {"id": "call-1", "name": "generate_scenarios", "args": {"project_path": "/srv/app"}}
                ]
            }
        }"#;
        let message: ServerMessage = serde_json::from_str(raw).unwrap();
        let call = &message.tool_call.unwrap().function_calls[0];
        assert_eq!(call.name, "generate_scenarios");
        assert_eq!(call.args["project_path"], "/srv/app");
    }

    #[test]
    fn unknown_server_message_is_all_none() {
        let message: ServerMessage = serde_json::from_str(r#"{"usageMetadata": {}}"#).unwrap();
        assert!(message.setup_complete.is_none());
        assert!(message.server_content.is_none());
        assert!(message.tool_call.is_none());
    }
}
