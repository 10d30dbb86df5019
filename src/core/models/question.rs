use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ports::document_store::{Document, Fields};
use crate::error::Error;

pub const QUESTIONS: &str = "preguntas";
pub const ORDER_FIELD: &str = "order";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QuestionKind {
    #[default]
    #[serde(rename = "radio", alias = "single-choice")]
    SingleChoice,
    #[serde(rename = "checkbox", alias = "multiple-choice")]
    MultipleChoice,
    #[serde(rename = "text_short", alias = "short-text")]
    ShortText,
}

impl QuestionKind {
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::MultipleChoice)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "pregunta")]
    pub text: String,
    #[serde(rename = "tipo", default)]
    pub kind: QuestionKind,
    #[serde(rename = "opciones", default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(rename = "descripcion", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Question {
    pub fn from_document(doc: Document) -> Result<Self, Error> {
        let mut fields = doc.fields;
        fields.insert("id".into(), Value::String(doc.id));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    /// Full document content, as written when seeding.
    pub fn to_fields(&self) -> Fields {
        let mut fields = self.persisted_fields();
        if let Some(placeholder) = &self.placeholder {
            fields.insert("placeholder".into(), Value::String(placeholder.clone()));
        }
        if let Some(description) = &self.description {
            fields.insert("descripcion".into(), Value::String(description.clone()));
        }
        fields
    }

    /// The fields an admin save writes; display hints stored remotely are left alone.
    pub fn persisted_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert("pregunta".into(), Value::String(self.text.clone()));
        fields.insert("tipo".into(), serde_json::to_value(self.kind).unwrap_or(Value::Null));
        fields.insert("opciones".into(), Value::Array(self.options.iter().cloned().map(Value::String).collect()));
        fields.insert(ORDER_FIELD.into(), Value::from(self.order));
        fields
    }
}

/// Partial edit of a question; `None` keeps the current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Patch {
    #[serde(rename = "pregunta")]
    pub text: Option<String>,
    #[serde(rename = "tipo")]
    pub kind: Option<QuestionKind>,
    #[serde(rename = "opciones")]
    pub options: Option<Vec<String>>,
    pub order: Option<i64>,
    pub placeholder: Option<String>,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
}

impl Patch {
    pub fn options(options: Vec<String>) -> Self {
        Self {
            options: Some(options),
            ..Default::default()
        }
    }

    pub fn apply(self, question: &mut Question) {
        if let Some(text) = self.text {
            question.text = text;
        }
        if let Some(kind) = self.kind {
            question.kind = kind;
        }
        if let Some(options) = self.options {
            question.options = options;
        }
        if let Some(order) = self.order {
            question.order = order;
        }
        if let Some(placeholder) = self.placeholder {
            question.placeholder = Some(placeholder);
        }
        if let Some(description) = self.description {
            question.description = Some(description);
        }
    }
}
