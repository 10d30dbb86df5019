use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::core::models::question::QuestionKind;
use crate::core::ports::document_store::{Document, Fields};
use crate::error::Error;

pub const RESPONSES: &str = "respuestas";
pub const LOCAL_ID_PREFIX: &str = "local_";
pub const ID_FIELD: &str = "id";
pub const DEVICE_FIELD: &str = "device";
pub const TIMESTAMP_FIELD: &str = "timestamp";
pub const LOCAL_TIMESTAMP_FIELD: &str = "local_timestamp";

/// Where a response lives. Every update or delete is routed by this tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResponseId {
    /// Stored only in the local response slot.
    Local(String),
    /// Assigned by the remote store.
    Remote(String),
}

impl ResponseId {
    pub fn is_local(&self) -> bool {
        matches!(self, ResponseId::Local(_))
    }
}

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseId::Local(key) => write!(f, "{}{}", LOCAL_ID_PREFIX, key),
            ResponseId::Remote(id) => f.write_str(id),
        }
    }
}

impl From<&str> for ResponseId {
    fn from(s: &str) -> Self {
        match s.strip_prefix(LOCAL_ID_PREFIX) {
            Some(key) => ResponseId::Local(key.to_owned()),
            None => ResponseId::Remote(s.to_owned()),
        }
    }
}

impl FromStr for ResponseId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl Serialize for ResponseId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResponseId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ResponseId::from(s.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Many(Vec<String>),
    One(String),
}

impl AnswerValue {
    pub fn is_empty(&self) -> bool {
        match self {
            AnswerValue::Many(values) => values.is_empty(),
            AnswerValue::One(value) => value.is_empty(),
        }
    }

    /// Display form: sets are joined with `", "`.
    pub fn joined(&self) -> String {
        match self {
            AnswerValue::Many(values) => values.iter().join(", "),
            AnswerValue::One(value) => value.clone(),
        }
    }

    /// Parses the text an admin typed into a response cell.
    pub fn from_edit_text(kind: QuestionKind, text: &str) -> Self {
        match kind {
            QuestionKind::MultipleChoice => AnswerValue::Many(text.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect()),
            _ => AnswerValue::One(text.to_owned()),
        }
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(AnswerValue::One(s.clone())),
            Value::Array(items) => Some(AnswerValue::Many(items.iter().filter_map(scalar_text).collect())),
            Value::Null | Value::Object(_) => None,
            other => scalar_text(other).map(AnswerValue::One),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            AnswerValue::Many(values) => Value::Array(values.iter().cloned().map(Value::String).collect()),
            AnswerValue::One(value) => Value::String(value.clone()),
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Question id to answer.
pub type Answers = BTreeMap<String, AnswerValue>;

/// Creation time of a response, whoever assigned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedAt {
    Server(DateTime<Utc>),
    Client(DateTime<Utc>),
    /// The store has not resolved its timestamp yet.
    Pending,
}

impl CreatedAt {
    pub fn to_date(&self) -> Option<DateTime<Utc>> {
        match self {
            CreatedAt::Server(at) | CreatedAt::Client(at) => Some(*at),
            CreatedAt::Pending => None,
        }
    }
}

impl Serialize for CreatedAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_date().serialize(serializer)
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: ResponseId,
    pub answers: Answers,
    pub device: Option<String>,
    pub created_at: CreatedAt,
}

fn is_metadata(key: &str) -> bool {
    matches!(key, ID_FIELD | DEVICE_FIELD | TIMESTAMP_FIELD | LOCAL_TIMESTAMP_FIELD)
}

fn answers_from_fields(fields: &Fields) -> Answers {
    fields
        .iter()
        .filter(|(key, _)| !is_metadata(key))
        .filter_map(|(key, value)| AnswerValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

/// Flat layout shared by remote documents and local records: one field per answered question.
pub fn answers_to_fields(answers: &Answers) -> Fields {
    answers.iter().map(|(qid, value)| (qid.clone(), value.to_json())).collect()
}

impl Response {
    pub fn from_document(doc: Document) -> Self {
        let created_at = parse_timestamp(doc.fields.get(TIMESTAMP_FIELD)).map(CreatedAt::Server).unwrap_or(CreatedAt::Pending);
        Response {
            id: ResponseId::Remote(doc.id),
            answers: answers_from_fields(&doc.fields),
            device: doc.fields.get(DEVICE_FIELD).and_then(Value::as_str).map(str::to_owned),
            created_at,
        }
    }

    /// Reads one record of the local slot.
    pub fn from_local_record(record: &Value) -> Result<Self, Error> {
        let fields = record.as_object().ok_or_else(|| Error::StorageCorrupt("response record is not an object".into()))?;
        let id = fields
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .map(ResponseId::from)
            .ok_or_else(|| Error::StorageCorrupt("response record without id".into()))?;
        let created_at = parse_timestamp(fields.get(LOCAL_TIMESTAMP_FIELD)).map(CreatedAt::Client).unwrap_or(CreatedAt::Pending);
        Ok(Response {
            id,
            answers: answers_from_fields(fields),
            device: fields.get(DEVICE_FIELD).and_then(Value::as_str).map(str::to_owned),
            created_at,
        })
    }

    pub fn to_local_record(&self) -> Value {
        let mut fields = answers_to_fields(&self.answers);
        if let Some(device) = &self.device {
            fields.insert(DEVICE_FIELD.into(), Value::String(device.clone()));
        }
        if let Some(at) = self.created_at.to_date() {
            fields.insert(LOCAL_TIMESTAMP_FIELD.into(), Value::String(format_timestamp(&at)));
        }
        fields.insert(ID_FIELD.into(), Value::String(self.id.to_string()));
        Value::Object(fields)
    }

    /// Fields of the remote document created on submission; the store stamps the timestamp.
    pub fn to_remote_fields(&self) -> Fields {
        let mut fields = answers_to_fields(&self.answers);
        if let Some(device) = &self.device {
            fields.insert(DEVICE_FIELD.into(), Value::String(device.clone()));
        }
        fields
    }

    pub fn answer(&self, question_id: &str) -> Option<&AnswerValue> {
        self.answers.get(question_id)
    }
}

/// Admin edit of a response: answers are merged field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Patch {
    #[serde(default)]
    pub answers: Answers,
    pub device: Option<String>,
}

impl Patch {
    pub fn to_fields(&self) -> Fields {
        let mut fields = answers_to_fields(&self.answers);
        if let Some(device) = &self.device {
            fields.insert(DEVICE_FIELD.into(), Value::String(device.clone()));
        }
        fields
    }

    pub fn apply(&self, response: &mut Response) {
        for (qid, value) in &self.answers {
            response.answers.insert(qid.clone(), value.clone());
        }
        if let Some(device) = &self.device {
            response.device = Some(device.clone());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_id_routing_tag() {
        assert_eq!("local_1700000000000".parse::<ResponseId>().unwrap(), ResponseId::Local("1700000000000".into()));
        assert_eq!("Xk29fa".parse::<ResponseId>().unwrap(), ResponseId::Remote("Xk29fa".into()));
        assert_eq!(ResponseId::Local("42".into()).to_string(), "local_42");
    }

    #[test]
    fn test_local_record() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 20, 30, 0).unwrap();
        let response = Response {
            id: ResponseId::Local("1".into()),
            answers: Answers::from([
                ("1".to_owned(), AnswerValue::One("Rock".into())),
                ("2".to_owned(), AnswerValue::Many(vec!["Cerveza".into(), "Vino".into()])),
            ]),
            device: Some("Mozilla/5.0".into()),
            created_at: CreatedAt::Client(at),
        };
        let record = response.to_local_record();
        assert_eq!(record["id"], json!("local_1"));
        assert_eq!(record["local_timestamp"], json!("2024-05-01T20:30:00.000Z"));
        assert_eq!(record["2"], json!(["Cerveza", "Vino"]));
        assert_eq!(Response::from_local_record(&record).unwrap(), response);
    }

    #[test]
    fn test_from_document() {
        let fields = json!({"1": "Jazz", "2": ["Cóctel"], "device": "curl/8.0", "timestamp": "2024-05-01T20:30:00.000Z"});
        let response = Response::from_document(Document::new("abc", fields.as_object().unwrap().clone()));
        assert_eq!(response.id, ResponseId::Remote("abc".into()));
        assert_eq!(response.answers.len(), 2);
        assert_eq!(response.device.as_deref(), Some("curl/8.0"));
        assert!(matches!(response.created_at, CreatedAt::Server(_)));
    }

    #[test]
    fn test_pending_timestamp() {
        let response = Response::from_document(Document::new("abc", Fields::new()));
        assert_eq!(response.created_at.to_date(), None);
    }

    #[test]
    fn test_edit_text() {
        assert_eq!(
            AnswerValue::from_edit_text(QuestionKind::MultipleChoice, "Rock, Jazz"),
            AnswerValue::Many(vec!["Rock".into(), "Jazz".into()])
        );
        assert_eq!(AnswerValue::from_edit_text(QuestionKind::ShortText, "a, b"), AnswerValue::One("a, b".into()));
        let blank = AnswerValue::from_edit_text(QuestionKind::MultipleChoice, "  ");
        assert_eq!(blank, AnswerValue::Many(Vec::new()));
        assert!(blank.is_empty());
        assert_eq!(AnswerValue::from_edit_text(QuestionKind::MultipleChoice, "Rock,,"), AnswerValue::Many(vec!["Rock".into()]));
    }
}
