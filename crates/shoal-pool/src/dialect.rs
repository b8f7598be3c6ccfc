use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Wire-protocol family spoken by a worker.
///
/// The dialect determines the request path, the health path, the request
/// body layout, and where the completion text lives in the response. It is
/// a plain tag; all behavior is dispatched through the methods below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// OpenAI-style `/v1/completions` (LM Studio and friends).
    #[serde(alias = "openai")]
    Completions,
    /// Native `/api/generate` (Ollama-style).
    #[serde(alias = "native", alias = "ollama")]
    Generate,
    /// OpenAI chat-style `/v1/chat/completions` (clustered runtimes).
    #[serde(alias = "cluster")]
    Chat,
}

impl Dialect {
    pub fn request_path(&self) -> &'static str {
        match self {
            Dialect::Completions => "/v1/completions",
            Dialect::Generate => "/api/generate",
            Dialect::Chat => "/v1/chat/completions",
        }
    }

    /// Path of the model-listing endpoint used as the liveness probe.
    pub fn health_path(&self) -> &'static str {
        match self {
            Dialect::Completions | Dialect::Chat => "/v1/models",
            Dialect::Generate => "/api/tags",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Completions => "completions",
            Dialect::Generate => "generate",
            Dialect::Chat => "chat",
        }
    }

    /// Builds the dialect-specific request payload.
    ///
    /// `params` must already be normalized; this method only lays out
    /// fields. Streaming is always disabled: the pool deals in one
    /// response object per request.
    pub fn build_body(&self, model: &str, prompt: &str, params: &GenerationParams) -> Value {
        match self {
            Dialect::Completions => {
                let mut body = json!({
                    "model": model,
                    "prompt": prompt,
                    "max_tokens": params.max_tokens,
                    "temperature": params.temperature,
                    "top_p": params.top_p,
                    "stream": false,
                });
                if let Some(penalty) = params.frequency_penalty {
                    body["frequency_penalty"] = json!(penalty);
                }
                if let Some(stop) = &params.stop {
                    body["stop"] = json!(stop);
                }
                body
            }
            Dialect::Generate => {
                let mut options = json!({
                    "num_predict": params.max_tokens,
                    "temperature": params.temperature,
                    "top_p": params.top_p,
                });
                if let Some(stop) = &params.stop {
                    options["stop"] = json!(stop);
                }
                json!({
                    "model": model,
                    "prompt": prompt,
                    "stream": false,
                    "options": options,
                })
            }
            Dialect::Chat => {
                let mut messages = Vec::new();
                if let Some(system) = &params.system_prompt {
                    messages.push(json!({"role": "system", "content": system}));
                }
                messages.push(json!({"role": "user", "content": prompt}));

                let mut body = json!({
                    "model": model,
                    "messages": messages,
                    "max_tokens": params.max_tokens,
                    "temperature": params.temperature,
                    "top_p": params.top_p,
                    "stream": false,
                });
                if let Some(stop) = &params.stop {
                    body["stop"] = json!(stop);
                }
                body
            }
        }
    }

    /// Extracts the completion text from a dialect-specific response body.
    ///
    /// Returns `None` when the expected path is absent, which the
    /// dispatcher treats as a malformed response.
    pub fn extract_text(&self, body: &Value) -> Option<String> {
        let text = match self {
            Dialect::Completions => body.get("choices")?.get(0)?.get("text")?.as_str()?,
            Dialect::Generate => body.get("response")?.as_str()?,
            Dialect::Chat => body
                .get("choices")?
                .get(0)?
                .get("message")?
                .get("content")?
                .as_str()?,
        };
        Some(text.to_string())
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sampling parameters for one completion request.
///
/// Callers may pass out-of-range values; [`GenerationParams::normalized`]
/// clamps them once at the dispatcher boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Prepended as a `system` message on the chat dialect; ignored by the
    /// completion dialects, which have no message framing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            top_p: 0.9,
            stop: None,
            frequency_penalty: None,
            system_prompt: None,
        }
    }
}

impl GenerationParams {
    /// Returns a copy with every field clamped to its valid range.
    pub fn normalized(&self) -> Self {
        Self {
            max_tokens: self.max_tokens.max(1),
            temperature: self.temperature.clamp(0.0, 1.0),
            top_p: self.top_p.clamp(0.0, 1.0),
            stop: self.stop.clone(),
            frequency_penalty: self.frequency_penalty.map(|p| p.clamp(0.0, 2.0)),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_per_dialect() {
        assert_eq!(Dialect::Completions.request_path(), "/v1/completions");
        assert_eq!(Dialect::Generate.request_path(), "/api/generate");
        assert_eq!(Dialect::Chat.request_path(), "/v1/chat/completions");

        assert_eq!(Dialect::Completions.health_path(), "/v1/models");
        assert_eq!(Dialect::Generate.health_path(), "/api/tags");
        assert_eq!(Dialect::Chat.health_path(), "/v1/models");
    }

    #[test]
    fn test_dialect_deserializes_aliases() {
        let d: Dialect = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(d, Dialect::Completions);
        let d: Dialect = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(d, Dialect::Generate);
        let d: Dialect = serde_json::from_str("\"cluster\"").unwrap();
        assert_eq!(d, Dialect::Chat);
        let d: Dialect = serde_json::from_str("\"chat\"").unwrap();
        assert_eq!(d, Dialect::Chat);
    }

    #[test]
    fn test_completions_body_layout() {
        let params = GenerationParams {
            max_tokens: 10,
            stop: Some(vec!["\n".to_string()]),
            frequency_penalty: Some(0.5),
            ..Default::default()
        };
        let body = Dialect::Completions.build_body("m", "hello", &params);

        assert_eq!(body["model"], "m");
        assert_eq!(body["prompt"], "hello");
        assert_eq!(body["max_tokens"], 10);
        assert_eq!(body["stream"], false);
        assert_eq!(body["frequency_penalty"], 0.5);
        assert_eq!(body["stop"][0], "\n");
    }

    #[test]
    fn test_generate_body_nests_options() {
        let params = GenerationParams {
            max_tokens: 64,
            stop: Some(vec!["END".to_string()]),
            ..Default::default()
        };
        let body = Dialect::Generate.build_body("m", "hi", &params);

        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 64);
        assert_eq!(body["options"]["stop"][0], "END");
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_chat_body_messages() {
        let params = GenerationParams {
            system_prompt: Some("be terse".to_string()),
            ..Default::default()
        };
        let body = Dialect::Chat.build_body("m", "hi", &params);

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be terse");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
    }

    #[test]
    fn test_chat_body_without_system_prompt() {
        let body = Dialect::Chat.build_body("m", "hi", &GenerationParams::default());
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_extract_text_per_dialect() {
        let completions = serde_json::json!({"choices": [{"text": "a"}], "model": "m"});
        assert_eq!(
            Dialect::Completions.extract_text(&completions).as_deref(),
            Some("a")
        );

        let generate = serde_json::json!({"response": "b", "model": "m"});
        assert_eq!(
            Dialect::Generate.extract_text(&generate).as_deref(),
            Some("b")
        );

        let chat = serde_json::json!({"choices": [{"message": {"content": "c"}}]});
        assert_eq!(Dialect::Chat.extract_text(&chat).as_deref(), Some("c"));
    }

    #[test]
    fn test_extract_text_missing_path() {
        let body = serde_json::json!({"choices": []});
        assert!(Dialect::Completions.extract_text(&body).is_none());
        assert!(Dialect::Chat.extract_text(&body).is_none());
        assert!(Dialect::Generate.extract_text(&body).is_none());
    }

    #[test]
    fn test_params_normalization_clamps() {
        let params = GenerationParams {
            max_tokens: 0,
            temperature: 1.7,
            top_p: -0.2,
            frequency_penalty: Some(-1.0),
            ..Default::default()
        };
        let normalized = params.normalized();

        assert_eq!(normalized.max_tokens, 1);
        assert_eq!(normalized.temperature, 1.0);
        assert_eq!(normalized.top_p, 0.0);
        assert_eq!(normalized.frequency_penalty, Some(0.0));
    }

    #[test]
    fn test_params_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 500);
        assert_eq!(params.temperature, 0.7);
        assert_eq!(params.top_p, 0.9);
        assert!(params.stop.is_none());
    }
}
