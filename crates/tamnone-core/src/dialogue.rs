//! Dialogue context: speaker-tagged utterances and the transcript sent to the emotion Space.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Speaker label for snapshot lines that carry no speaker.
pub const DEFAULT_SNAPSHOT_SPEAKER: &str = "Speaker";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("화자 이름과 텍스트를 모두 입력해야 합니다.")]
    BlankUtterance,
    #[error("스냅샷에 유효한 발화가 없습니다.")]
    EmptySnapshot,
}

/// One line of dialogue, rendered as `speaker: text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utterance {
    speaker: String,
    text: String,
}

impl Utterance {
    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}

/// A line from an externally supplied snapshot (e.g. a live transcription feed).
/// Extra fields such as timestamps are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotLine {
    pub speaker: Option<String>,
    pub text: Option<String>,
}

impl SnapshotLine {
    /// Reads a loosely-typed snapshot entry. Non-object entries yield `None`;
    /// a non-string `text` counts as missing, a non-string `speaker` is rendered as-is.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let speaker = match obj.get("speaker") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        };
        let text = obj.get("text").and_then(Value::as_str).map(str::to_string);
        Some(Self { speaker, text })
    }
}

/// Ordered transcript; chronological order is the model's context window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    utterances: Vec<Utterance>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new transcript with one more utterance. Speaker and text are trimmed;
    /// either being blank is rejected and leaves `self` untouched.
    pub fn append(&self, speaker: &str, text: &str) -> Result<Transcript, DialogueError> {
        let speaker = speaker.trim();
        let text = text.trim();
        if speaker.is_empty() || text.is_empty() {
            return Err(DialogueError::BlankUtterance);
        }
        let mut next = self.clone();
        next.utterances.push(Utterance {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
        Ok(next)
    }

    /// Builds a transcript that replaces any prior state. Lines with blank text are
    /// dropped; blank or missing speakers fall back to [`DEFAULT_SNAPSHOT_SPEAKER`].
    pub fn replace<I>(lines: I) -> Result<Transcript, DialogueError>
    where
        I: IntoIterator<Item = SnapshotLine>,
    {
        let utterances: Vec<Utterance> = lines
            .into_iter()
            .filter_map(|line| {
                let text = line.text?.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                let speaker = line
                    .speaker
                    .filter(|s| !s.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SNAPSHOT_SPEAKER.to_string());
                Some(Utterance { speaker, text })
            })
            .collect();
        if utterances.is_empty() {
            return Err(DialogueError::EmptySnapshot);
        }
        Ok(Transcript { utterances })
    }

    /// Newline-joined rendering in transcript order.
    pub fn render(&self) -> String {
        self.lines().join("\n")
    }

    /// Each utterance rendered as `speaker: text`.
    pub fn lines(&self) -> Vec<String> {
        self.utterances.iter().map(ToString::to_string).collect()
    }

    pub fn last(&self) -> Option<&Utterance> {
        self.utterances.last()
    }

    pub fn len(&self) -> usize {
        self.utterances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utterances.is_empty()
    }

    pub fn clear(&mut self) {
        self.utterances.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn line(speaker: Option<&str>, text: Option<&str>) -> SnapshotLine {
        SnapshotLine {
            speaker: speaker.map(str::to_string),
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn append_trims_and_renders() {
        let t = Transcript::new().append("  Alice ", " I am happy ").unwrap();
        let t = t.append("Bob", "Me too").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.last().unwrap().to_string(), "Bob: Me too");
        assert_eq!(t.render(), "Alice: I am happy\nBob: Me too");
    }

    #[test]
    fn append_rejects_blank_and_keeps_original() {
        let t = Transcript::new().append("Alice", "hi").unwrap();
        assert_eq!(t.append("   ", "hello"), Err(DialogueError::BlankUtterance));
        assert_eq!(t.append("Bob", "\t\n"), Err(DialogueError::BlankUtterance));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn replace_filters_blank_text_and_defaults_speaker() {
        let t = Transcript::replace(vec![
            line(Some("A"), Some("first")),
            line(Some("B"), Some("   ")),
            line(None, Some(" second ")),
            line(Some("C"), None),
        ])
        .unwrap();
        assert_eq!(t.lines(), vec!["A: first", "Speaker: second"]);
    }

    #[test]
    fn replace_with_no_valid_lines_is_rejected() {
        let err = Transcript::replace(vec![line(Some("A"), Some("")), line(None, None)]);
        assert_eq!(err, Err(DialogueError::EmptySnapshot));
        assert_eq!(Transcript::replace(Vec::new()), Err(DialogueError::EmptySnapshot));
    }

    #[test]
    fn empty_transcript_renders_empty() {
        assert_eq!(Transcript::new().render(), "");
        assert!(Transcript::new().lines().is_empty());
    }

    #[test]
    fn snapshot_line_from_loose_json() {
        let l = SnapshotLine::from_value(&json!({"speaker": 1, "text": "hi", "start": 0.5})).unwrap();
        assert_eq!(l, line(Some("1"), Some("hi")));
        let l = SnapshotLine::from_value(&json!({"speaker": null, "text": 7})).unwrap();
        assert_eq!(l, line(None, None));
        assert!(SnapshotLine::from_value(&json!("not a line")).is_none());
    }

    #[test]
    fn transcript_serializes_as_list() {
        let t = Transcript::new().append("A", "x").unwrap();
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v, json!([{"speaker": "A", "text": "x"}]));
        let back: Transcript = serde_json::from_value(v).unwrap();
        assert_eq!(back, t);
    }
}
