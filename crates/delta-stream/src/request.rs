use std::collections::BTreeMap;

use reqwest::{Method, Url};

use crate::errors::ClientError;

/// One role/content pair of a chat conversation.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    /// Speaker role (`system`, `user`, `assistant`).
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with an arbitrary role.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// JSON request body: an ordered message list plus any extra top-level
/// fields the endpoint understands (`model`, `temperature`, ...).
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatPayload {
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ChatPayload {
    /// Creates a payload from a message list.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            extra: serde_json::Map::new(),
        }
    }

    /// Appends a message.
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Sets an extra top-level field. Setting `messages` here is ignored.
    pub fn field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let key = key.into();
        if key != "messages" {
            self.extra.insert(key, value);
        }
        self
    }

    /// Content of the final message, which chat front ends echo as the
    /// user's line before the answer streams in.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }

    /// Rejects payloads without any message.
    pub fn validate_for_chat(&self) -> Result<(), ClientError> {
        if self.messages.is_empty() {
            return Err(ClientError::Validation(
                "payload must contain at least one message".into(),
            ));
        }
        Ok(())
    }
}

/// An immutable, fully resolved streaming request.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamRequest {
    url: Url,
    method: Method,
    headers: BTreeMap<String, String>,
    body: Option<ChatPayload>,
}

impl StreamRequest {
    /// Starts a request builder for `endpoint`.
    pub fn builder(endpoint: impl Into<String>) -> StreamRequestBuilder {
        StreamRequestBuilder::new(endpoint)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Headers with lower-cased names.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Body to send, always `None` for GET.
    pub fn body(&self) -> Option<&ChatPayload> {
        self.body.as_ref()
    }
}

/// Builder for `StreamRequest`.
#[derive(Clone, Debug)]
pub struct StreamRequestBuilder {
    endpoint: String,
    method: Method,
    headers: BTreeMap<String, String>,
    body: Option<ChatPayload>,
}

impl StreamRequestBuilder {
    pub(crate) fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: Method::POST,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Sets the HTTP method (default `POST`).
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets one header. Names are case-insensitive; the last write wins.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().trim().to_ascii_lowercase(), value.into());
        self
    }

    /// Merges a header mapping over the current one.
    pub fn headers<K, V, I>(mut self, headers: I) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (name, value) in headers {
            self = self.header(name, value);
        }
        self
    }

    /// Sets the JSON body.
    pub fn body(mut self, payload: ChatPayload) -> Self {
        self.body = Some(payload);
        self
    }

    /// Validates the endpoint and header names and freezes the request.
    pub fn build(self) -> Result<StreamRequest, ClientError> {
        let url = parse_endpoint(&self.endpoint)?;
        if self.headers.keys().any(|name| name.is_empty()) {
            return Err(ClientError::Validation(
                "header name must not be empty".into(),
            ));
        }
        let body = if self.method == Method::GET {
            None
        } else {
            self.body
        };
        Ok(StreamRequest {
            url,
            method: self.method,
            headers: self.headers,
            body,
        })
    }
}

pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, ClientError> {
    let url = Url::parse(endpoint.trim())
        .map_err(|e| ClientError::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ClientError::Config(format!(
            "endpoint scheme must be http or https, got {other}"
        ))),
    }
}
