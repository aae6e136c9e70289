//! Ollama node
//!
//! Local model server access: `/api/embeddings`, `/api/generate`, `/api/chat`.

use crate::*;
use reqwest::Client;
use serde_json::json;

/// Ollama model handle. One instance per model name.
pub struct OllamaProvider {
    client: Client,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl OllamaProvider {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        let api_base = api_base.into().trim_end_matches('/').to_string();

        Self {
            client: Client::new(),
            api_base,
            model: model.into(),
            max_tokens: 1024,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_chat_request(&self, params: &ChatParams) -> Value {
        let model = if params.model.is_empty() {
            self.model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<Value> = params
            .messages
            .iter()
            .map(|m| json!({ "role": &m.role, "content": &m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": params.temperature,
                "num_predict": params.max_tokens,
            },
        });

        // Ollama has no tool_choice; None withholds the tools, Required narrows them.
        let tools: Vec<Value> = match &params.tool_choice {
            ToolChoice::None => Vec::new(),
            ToolChoice::Auto => params.tools.iter().map(tool_json).collect(),
            ToolChoice::Required(name) => params
                .tools
                .iter()
                .filter(|t| &t.function.name == name)
                .map(tool_json)
                .collect(),
        };
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        body
    }

    fn parse_chat_response(&self, json: Value) -> Result<ChatResponse> {
        let message = json
            .get("message")
            .filter(|m| m.is_object())
            .ok_or(ProviderError::InvalidResponse)?;

        let content = message["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());
        let finish_reason = json["done_reason"].as_str().unwrap_or("stop").to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for (i, call) in calls.iter().enumerate() {
                let function = &call["function"];
                // Some models emit the arguments as an encoded string
                let args = function["arguments"]
                    .as_str()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| function["arguments"].clone());

                tool_calls.push(ToolCall {
                    id: call["id"]
                        .as_str()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| format!("call_{}", i)),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments: args,
                });
            }
        }

        let prompt_tokens = json["prompt_eval_count"].as_u64().unwrap_or(0) as u32;
        let completion_tokens = json["eval_count"].as_u64().unwrap_or(0) as u32;

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage: Usage {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
        })
    }

    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        let url = format!("{}{}", self.api_base, endpoint);
        trace!("◆ POST {} (model {})", url, self.model);

        let response = self.client.post(&url).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }
            let error = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"].as_str().map(|s| s.to_string()))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ProviderError::Api(error));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn tool_json(tool: &Tool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": &tool.function.name,
            "description": &tool.function.description,
            "parameters": &tool.function.parameters
        }
    })
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        let body = self.build_chat_request(&params);
        let json = self.post("/api/chat", &body).await?;

        debug!(
            "◆ CHAT RESPONSE: {} TOOL CALLS",
            json["message"]["tool_calls"]
                .as_array()
                .map(|v| v.len())
                .unwrap_or(0)
        );

        self.parse_chat_response(json)
    }

    fn default_model(&self) -> String {
        self.model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_base.is_empty() && !self.model.is_empty()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "model": &self.model, "prompt": text });
        let json = self.post("/api/embeddings", &body).await?;

        let values = json["embedding"]
            .as_array()
            .ok_or(ProviderError::InvalidResponse)?;

        values
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or(ProviderError::InvalidResponse)
    }
}

#[async_trait]
impl GenerationProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        let body = json!({
            "model": &self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": temperature,
                "num_predict": self.max_tokens,
            },
        });
        let json = self.post("/api/generate", &body).await?;

        json["response"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(ProviderError::InvalidResponse)
    }
}
