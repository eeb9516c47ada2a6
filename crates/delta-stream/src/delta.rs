use serde::Deserialize;

use crate::errors::RecordError;
use crate::stream::StreamEvent;

/// `{"choices":[{"delta":{...}}]}` chunk as sent by chat-completion streams.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaChunk {
    #[serde(default)]
    pub choices: Vec<DeltaChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

/// Incremental payload of one record. Either field may be absent or empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
}

impl Delta {
    /// Non-empty reasoning text, if any.
    pub fn reasoning(&self) -> Option<&str> {
        self.reasoning_content.as_deref().filter(|s| !s.is_empty())
    }

    /// Non-empty answer text, if any.
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref().filter(|s| !s.is_empty())
    }
}

/// Parses a record payload and returns the first choice's delta.
pub fn parse_delta(payload: &str) -> Result<Delta, RecordError> {
    let chunk: DeltaChunk =
        serde_json::from_str(payload).map_err(|e| RecordError::InvalidJson(e.to_string()))?;
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .ok_or(RecordError::MissingDelta)
}

/// Turns record payloads into token events while keeping the running texts.
///
/// `content` only ever grows by content tokens; reasoning tokens go to a
/// separate accumulator.
#[derive(Debug, Default)]
pub struct DeltaInterpreter {
    content: String,
    reasoning: String,
}

impl DeltaInterpreter {
    /// Interprets one record payload.
    ///
    /// A record carrying both fields yields the thought event first.
    pub fn interpret(&mut self, payload: &str) -> Result<Vec<StreamEvent>, RecordError> {
        let delta = parse_delta(payload)?;
        let mut events = Vec::with_capacity(2);
        if let Some(thought) = delta.reasoning() {
            self.reasoning.push_str(thought);
            events.push(StreamEvent::ThoughtToken {
                text: thought.to_string(),
            });
        }
        if let Some(token) = delta.content() {
            self.content.push_str(token);
            events.push(StreamEvent::ContentToken {
                text: token.to_string(),
                full_text: self.content.clone(),
            });
        }
        Ok(events)
    }

    /// Content accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Reasoning accumulated so far.
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// Consumes the interpreter, returning `(content, reasoning)`.
    pub fn into_texts(self) -> (String, String) {
        (self.content, self.reasoning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_token_carries_updated_full_text() {
        let mut interp = DeltaInterpreter::default();
        interp
            .interpret(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#)
            .expect("first");
        let events = interp
            .interpret(r#"{"choices":[{"delta":{"content":" there"}}]}"#)
            .expect("second");
        assert_eq!(
            events,
            vec![StreamEvent::ContentToken {
                text: " there".into(),
                full_text: "Hi there".into(),
            }]
        );
    }

    #[test]
    fn reasoning_and_content_accumulate_independently() {
        let mut interp = DeltaInterpreter::default();
        for payload in [
            r#"{"choices":[{"delta":{"reasoning_content":"a "}}]}"#,
            r#"{"choices":[{"delta":{"reasoning_content":"b "}}]}"#,
            r#"{"choices":[{"delta":{"content":"x"}}]}"#,
            r#"{"choices":[{"delta":{"content":"y"}}]}"#,
        ] {
            interp.interpret(payload).expect("record");
        }
        assert_eq!(interp.reasoning(), "a b ");
        assert_eq!(interp.content(), "xy");
    }

    #[test]
    fn both_fields_yield_thought_before_content() {
        let mut interp = DeltaInterpreter::default();
        let events = interp
            .interpret(r#"{"choices":[{"delta":{"content":"c","reasoning_content":"r"}}]}"#)
            .expect("record");
        assert_eq!(
            events,
            vec![
                StreamEvent::ThoughtToken { text: "r".into() },
                StreamEvent::ContentToken {
                    text: "c".into(),
                    full_text: "c".into(),
                },
            ]
        );
    }

    #[test]
    fn empty_and_null_fields_produce_no_events() {
        let mut interp = DeltaInterpreter::default();
        let events = interp
            .interpret(r#"{"choices":[{"delta":{"content":"","reasoning_content":null,"role":"assistant"}}]}"#)
            .expect("record");
        assert!(events.is_empty());
        assert_eq!(interp.content(), "");
    }

    #[test]
    fn malformed_records_are_reported_not_accumulated() {
        let mut interp = DeltaInterpreter::default();
        assert!(matches!(
            interp.interpret("{not json}"),
            Err(RecordError::InvalidJson(_))
        ));
        assert_eq!(
            interp.interpret(r#"{"choices":[]}"#),
            Err(RecordError::MissingDelta)
        );
        assert_eq!(
            interp.interpret(r#"{"choices":[{"finish_reason":"stop"}]}"#),
            Err(RecordError::MissingDelta)
        );
        assert!(interp.content().is_empty());
    }
}
