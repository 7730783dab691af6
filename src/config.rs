//! Host-supplied game configuration
//!
//! The host hands over loosely-typed JSON: every quota may be missing or
//! null, and questions come in several shapes. All of that is resolved once
//! here, so the simulation only ever sees filled-in quotas and a tagged
//! [`Question`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ENEMIES: u32 = 10;
pub const DEFAULT_HEARTS: u32 = 3;
pub const DEFAULT_BRAINS: u32 = 3;
pub const DEFAULT_INITIAL_AMMO: u32 = 10;
pub const DEFAULT_AMMO_PER_CORRECT: u32 = 5;

/// Kind of an attached media reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

/// Media shown alongside a question or knowledge entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub url: String,
}

/// A quiz question, one case per answer shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Question {
    SingleChoice {
        prompt: String,
        options: Vec<String>,
        answer: usize,
        media: Vec<MediaRef>,
    },
    MultipleChoice {
        prompt: String,
        options: Vec<String>,
        answers: BTreeSet<usize>,
        media: Vec<MediaRef>,
    },
    FillIn {
        prompt: String,
        accepted: Vec<String>,
        media: Vec<MediaRef>,
    },
}

/// A player's submission
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Choice(usize),
    Choices(BTreeSet<usize>),
    Text(String),
}

impl Question {
    pub fn prompt(&self) -> &str {
        match self {
            Question::SingleChoice { prompt, .. }
            | Question::MultipleChoice { prompt, .. }
            | Question::FillIn { prompt, .. } => prompt,
        }
    }

    /// Choice labels (empty for fill-in)
    pub fn options(&self) -> &[String] {
        match self {
            Question::SingleChoice { options, .. } | Question::MultipleChoice { options, .. } => {
                options
            }
            Question::FillIn { .. } => &[],
        }
    }

    pub fn media(&self) -> &[MediaRef] {
        match self {
            Question::SingleChoice { media, .. }
            | Question::MultipleChoice { media, .. }
            | Question::FillIn { media, .. } => media,
        }
    }

    /// Whether `answer` is correct. A submission of the wrong shape is wrong.
    pub fn check(&self, answer: &Answer) -> bool {
        match (self, answer) {
            (Question::SingleChoice { answer: want, .. }, Answer::Choice(got)) => want == got,
            (Question::MultipleChoice { answers: want, .. }, Answer::Choices(got)) => want == got,
            (Question::FillIn { accepted, .. }, Answer::Text(got)) => {
                let got = normalize_text(got);
                accepted.iter().any(|a| normalize_text(a) == got)
            }
            _ => false,
        }
    }
}

fn normalize_text(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Informational content behind a knowledge box
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeEntry {
    pub title: Option<String>,
    #[serde(alias = "content")]
    pub text: String,
    pub media: Vec<MediaRef>,
}

/// Why a raw question was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionError {
    MissingPrompt,
    UnknownType(String),
    MissingAnswer,
    AnswerOutOfRange { index: usize, options: usize },
    NoOptions,
}

impl fmt::Display for QuestionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionError::MissingPrompt => write!(f, "question has no prompt"),
            QuestionError::UnknownType(t) => write!(f, "unknown question type {t:?}"),
            QuestionError::MissingAnswer => write!(f, "question has no usable answer"),
            QuestionError::AnswerOutOfRange { index, options } => {
                write!(f, "answer index {index} outside {options} options")
            }
            QuestionError::NoOptions => write!(f, "choice question has no options"),
        }
    }
}

impl std::error::Error for QuestionError {}

/// Question as it arrives from the host
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawQuestion {
    #[serde(rename = "type", alias = "kind", alias = "question_type")]
    pub question_type: Option<String>,
    #[serde(alias = "question", alias = "text", alias = "title")]
    pub prompt: Option<String>,
    pub options: Option<Vec<Value>>,
    pub answer: Option<Value>,
    #[serde(alias = "correctAnswer")]
    pub correct_answer: Option<Value>,
    pub answers: Option<Value>,
    pub media: Option<Vec<MediaRef>>,
    pub image: Option<String>,
    pub audio: Option<String>,
    pub video: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Single,
    Multiple,
    Fill,
}

impl TryFrom<RawQuestion> for Question {
    type Error = QuestionError;

    fn try_from(raw: RawQuestion) -> Result<Self, Self::Error> {
        let prompt = raw
            .prompt
            .filter(|p| !p.trim().is_empty())
            .ok_or(QuestionError::MissingPrompt)?;
        let options: Vec<String> = raw
            .options
            .unwrap_or_default()
            .iter()
            .map(value_label)
            .collect();
        let answer = raw
            .answer
            .or(raw.correct_answer)
            .or(raw.answers)
            .filter(|v| !v.is_null())
            .ok_or(QuestionError::MissingAnswer)?;

        let mut media = raw.media.unwrap_or_default();
        for (kind, url) in [
            (MediaKind::Image, raw.image),
            (MediaKind::Audio, raw.audio),
            (MediaKind::Video, raw.video),
        ] {
            if let Some(url) = url.filter(|u| !u.is_empty()) {
                media.push(MediaRef { kind, url });
            }
        }

        let shape = match raw.question_type.as_deref().map(str::to_lowercase).as_deref() {
            Some("single" | "single_choice" | "singlechoice" | "radio") => Shape::Single,
            Some("multiple" | "multiple_choice" | "multiplechoice" | "checkbox") => Shape::Multiple,
            Some("fill" | "fill_in" | "fillin" | "input" | "text") => Shape::Fill,
            Some(other) => return Err(QuestionError::UnknownType(other.to_string())),
            None if options.is_empty() => Shape::Fill,
            None if answer.as_array().is_some_and(|a| a.len() > 1) => Shape::Multiple,
            None => Shape::Single,
        };

        match shape {
            Shape::Single => {
                let index = match &answer {
                    Value::Array(items) if items.len() == 1 => resolve_index(&items[0], &options),
                    other => resolve_index(other, &options),
                }
                .ok_or(QuestionError::MissingAnswer)?;
                check_range(index, &options)?;
                Ok(Question::SingleChoice {
                    prompt,
                    options,
                    answer: index,
                    media,
                })
            }
            Shape::Multiple => {
                let items = match &answer {
                    Value::Array(items) => items.clone(),
                    single => vec![single.clone()],
                };
                let answers = items
                    .iter()
                    .map(|v| resolve_index(v, &options))
                    .collect::<Option<BTreeSet<usize>>>()
                    .filter(|set| !set.is_empty())
                    .ok_or(QuestionError::MissingAnswer)?;
                for &index in &answers {
                    check_range(index, &options)?;
                }
                Ok(Question::MultipleChoice {
                    prompt,
                    options,
                    answers,
                    media,
                })
            }
            Shape::Fill => {
                let accepted: Vec<String> = match &answer {
                    Value::Array(items) => items.iter().map(value_label).collect(),
                    single => vec![value_label(single)],
                };
                let accepted: Vec<String> = accepted
                    .into_iter()
                    .filter(|a| !a.trim().is_empty())
                    .collect();
                if accepted.is_empty() {
                    return Err(QuestionError::MissingAnswer);
                }
                Ok(Question::FillIn {
                    prompt,
                    accepted,
                    media,
                })
            }
        }
    }
}

fn check_range(index: usize, options: &[String]) -> Result<(), QuestionError> {
    if options.is_empty() {
        return Err(QuestionError::NoOptions);
    }
    if index >= options.len() {
        return Err(QuestionError::AnswerOutOfRange {
            index,
            options: options.len(),
        });
    }
    Ok(())
}

/// Display text of a JSON scalar
fn value_label(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// An answer given as an index, a numeric string, or the option text
fn resolve_index(v: &Value, options: &[String]) -> Option<usize> {
    match v {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => options
            .iter()
            .position(|o| o == s)
            .or_else(|| s.trim().parse().ok()),
        _ => None,
    }
}

/// Configuration exactly as the host sent it
///
/// Every field stays loosely typed so one bad value never rejects the rest.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawGameConfig {
    #[serde(alias = "enemyCount", alias = "enemy_count")]
    pub enemies: Option<Value>,
    pub hearts: Option<Value>,
    pub brains: Option<Value>,
    #[serde(alias = "initialAmmo")]
    pub initial_ammo: Option<Value>,
    #[serde(alias = "ammoPerCorrect", alias = "ammo_reward")]
    pub ammo_per_correct: Option<Value>,
    #[serde(alias = "mapData", alias = "template")]
    pub map: Option<Value>,
    pub seed: Option<Value>,
    pub questions: Option<Value>,
    pub knowledge: Option<Value>,
}

/// A non-negative integer given as a number or a numeric string
fn lenient_uint(value: Option<Value>, field: &str) -> Option<u64> {
    let parsed = match value? {
        Value::Null => return None,
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    if parsed.is_none() {
        log::warn!("Ignoring unusable {field} value");
    }
    parsed
}

fn quota(value: Option<Value>, field: &str, default: u32) -> u32 {
    lenient_uint(value, field)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(default)
}

/// Entries of a list field; anything other than an array counts as empty
fn entries(value: Option<Value>, field: &str) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(_) => {
            log::warn!("Ignoring {field}: not a list");
            Vec::new()
        }
    }
}

fn parse_question(value: Value) -> Result<Question, String> {
    let raw: RawQuestion = serde_json::from_value(value).map_err(|e| e.to_string())?;
    Question::try_from(raw).map_err(|e| e.to_string())
}

/// Session configuration with every default filled in
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub enemies: u32,
    /// Max lives
    pub hearts: u32,
    /// Max wrong answers
    pub brains: u32,
    pub initial_ammo: u32,
    pub ammo_per_correct: u32,
    /// Optional tile template (codes, row-major)
    pub map: Option<Vec<u8>>,
    pub seed: Option<u64>,
    pub questions: Vec<Question>,
    pub knowledge: Vec<KnowledgeEntry>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            enemies: DEFAULT_ENEMIES,
            hearts: DEFAULT_HEARTS,
            brains: DEFAULT_BRAINS,
            initial_ammo: DEFAULT_INITIAL_AMMO,
            ammo_per_correct: DEFAULT_AMMO_PER_CORRECT,
            map: None,
            seed: None,
            questions: Vec::new(),
            knowledge: Vec::new(),
        }
    }
}

impl GameConfig {
    /// Parse host JSON. Only malformed JSON is an error; bad questions and
    /// knowledge entries are dropped, unusable quotas defaulted.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let raw: RawGameConfig = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_raw(raw: RawGameConfig) -> Self {
        let questions = entries(raw.questions, "questions")
            .into_iter()
            .enumerate()
            .filter_map(|(i, q)| match parse_question(q) {
                Ok(q) => Some(q),
                Err(e) => {
                    log::warn!("Dropping question {i}: {e}");
                    None
                }
            })
            .collect();

        let knowledge = entries(raw.knowledge, "knowledge")
            .into_iter()
            .enumerate()
            .filter_map(|(i, k)| match serde_json::from_value(k) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("Dropping knowledge entry {i}: {e}");
                    None
                }
            })
            .collect();

        // Unusable codes become an unknown code so the template is rejected whole
        let map = match raw.map {
            None | Some(Value::Null) => None,
            Some(Value::Array(codes)) => Some(
                codes
                    .iter()
                    .map(|c| c.as_i64().and_then(|c| u8::try_from(c).ok()).unwrap_or(u8::MAX))
                    .collect(),
            ),
            Some(_) => {
                log::warn!("Ignoring map: not a list of tile codes");
                None
            }
        };

        Self {
            enemies: quota(raw.enemies, "enemies", DEFAULT_ENEMIES).max(1),
            hearts: quota(raw.hearts, "hearts", DEFAULT_HEARTS).max(1),
            brains: quota(raw.brains, "brains", DEFAULT_BRAINS).max(1),
            initial_ammo: quota(raw.initial_ammo, "initial_ammo", DEFAULT_INITIAL_AMMO),
            ammo_per_correct: quota(
                raw.ammo_per_correct,
                "ammo_per_correct",
                DEFAULT_AMMO_PER_CORRECT,
            ),
            map,
            seed: lenient_uint(raw.seed, "seed"),
            questions,
            knowledge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question(v: Value) -> Result<Question, QuestionError> {
        let raw: RawQuestion = serde_json::from_value(v).unwrap();
        Question::try_from(raw)
    }

    #[test]
    fn test_nulls_become_defaults() {
        let config = GameConfig::from_json(r#"{"enemies": null, "hearts": 5}"#).unwrap();
        assert_eq!(config.enemies, DEFAULT_ENEMIES);
        assert_eq!(config.hearts, 5);
        assert_eq!(config.brains, DEFAULT_BRAINS);
        assert!(config.questions.is_empty());
    }

    #[test]
    fn test_camel_case_aliases() {
        let config =
            GameConfig::from_json(r#"{"initialAmmo": 0, "ammoPerCorrect": 2, "enemyCount": 4}"#)
                .unwrap();
        assert_eq!(config.initial_ammo, 0);
        assert_eq!(config.ammo_per_correct, 2);
        assert_eq!(config.enemies, 4);
    }

    #[test]
    fn test_bad_map_codes_rejected_whole() {
        let config = GameConfig::from_json(r#"{"map": [0, 1, 900, -3]}"#).unwrap();
        assert_eq!(config.map, Some(vec![0, 1, 255, 255]));
    }

    #[test]
    fn test_single_choice_by_text() {
        let q = question(json!({
            "type": "single",
            "question": "2 + 2?",
            "options": ["3", "4", "5"],
            "correct_answer": "4"
        }))
        .unwrap();
        assert!(q.check(&Answer::Choice(1)));
        assert!(!q.check(&Answer::Choice(0)));
        assert!(!q.check(&Answer::Text("4".into())));
    }

    #[test]
    fn test_multiple_choice() {
        let q = question(json!({
            "type": "checkbox",
            "prompt": "Primes?",
            "options": [2, 4, 5],
            "answers": [0, 2]
        }))
        .unwrap();
        assert!(q.check(&Answer::Choices(BTreeSet::from([0, 2]))));
        assert!(!q.check(&Answer::Choices(BTreeSet::from([0]))));
        assert_eq!(q.options(), ["2", "4", "5"]);
    }

    #[test]
    fn test_fill_in_is_forgiving() {
        let q = question(json!({
            "type": "fill",
            "prompt": "Capital of France",
            "answer": ["Paris", "paris, france"],
            "image": "https://example.org/paris.png"
        }))
        .unwrap();
        assert!(q.check(&Answer::Text("  PARIS ".into())));
        assert!(!q.check(&Answer::Text("Lyon".into())));
        assert_eq!(q.media().len(), 1);
    }

    #[test]
    fn test_shape_inferred_without_type() {
        let q = question(json!({"prompt": "x", "answer": "y"})).unwrap();
        assert!(matches!(q, Question::FillIn { .. }));
        let q = question(json!({"prompt": "x", "options": ["a", "b", "c"], "answer": [0, 1]}))
            .unwrap();
        assert!(matches!(q, Question::MultipleChoice { .. }));
        let q = question(json!({"prompt": "x", "options": ["a", "b"], "answer": 1})).unwrap();
        assert!(matches!(q, Question::SingleChoice { answer: 1, .. }));
    }

    #[test]
    fn test_malformed_questions_dropped() {
        assert_eq!(
            question(json!({"type": "single", "prompt": "x", "options": ["a"], "answer": 3})),
            Err(QuestionError::AnswerOutOfRange { index: 3, options: 1 })
        );
        assert_eq!(
            question(json!({"type": "essay", "prompt": "x", "answer": 1})),
            Err(QuestionError::UnknownType("essay".into()))
        );
        assert_eq!(question(json!({"answer": 1})), Err(QuestionError::MissingPrompt));

        let config = GameConfig::from_json(
            r#"{"questions": [{"prompt": "ok", "answer": "yes"}, {"prompt": "bad"}]}"#,
        )
        .unwrap();
        assert_eq!(config.questions.len(), 1);
    }

    #[test]
    fn test_one_bad_question_keeps_the_rest() {
        let config = GameConfig::from_json(
            r#"{"questions": [
                {"prompt": "first", "answer": "yes"},
                {"prompt": 42, "answer": "no"},
                {"prompt": "pic", "answer": "cat", "media": [{"url": "cat.png"}]},
                "not a question",
                {"prompt": "last", "options": ["a", "b"], "answer": 1}
            ]}"#,
        )
        .unwrap();
        let prompts: Vec<&str> = config.questions.iter().map(Question::prompt).collect();
        assert_eq!(prompts, ["first", "last"]);
    }

    #[test]
    fn test_one_bad_knowledge_entry_keeps_the_rest() {
        let config = GameConfig::from_json(
            r#"{"knowledge": [
                {"title": "Tip", "text": "Steel stops bullets"},
                {"text": "Look", "media": [{"url": "no-kind.png"}]},
                {"content": "Water blocks tanks"}
            ]}"#,
        )
        .unwrap();
        let texts: Vec<&str> = config.knowledge.iter().map(|k| k.text.as_str()).collect();
        assert_eq!(texts, ["Steel stops bullets", "Water blocks tanks"]);
    }

    #[test]
    fn test_lenient_quotas() {
        let config = GameConfig::from_json(
            r#"{"hearts": "3", "brains": "lots", "enemies": -2, "initialAmmo": 1.5, "seed": "7",
                "questions": [{"prompt": "kept", "answer": "x"}]}"#,
        )
        .unwrap();
        assert_eq!(config.hearts, 3);
        assert_eq!(config.brains, DEFAULT_BRAINS);
        assert_eq!(config.enemies, DEFAULT_ENEMIES);
        assert_eq!(config.initial_ammo, DEFAULT_INITIAL_AMMO);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.questions.len(), 1);

        let config = GameConfig::from_json(r#"{"questions": "none", "map": "plain"}"#).unwrap();
        assert!(config.questions.is_empty());
        assert_eq!(config.map, None);
    }
}
