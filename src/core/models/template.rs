use serde::{Deserialize, Deserializer};

use crate::core::models::question::{Question, QuestionKind};
use crate::error::Error;

#[derive(Debug, Deserialize)]
struct TemplateFile {
    #[serde(rename = "encuesta_bar")]
    survey: SurveyTemplate,
}

/// Read-only survey definition shipped with the service.
#[derive(Debug, Clone, Deserialize)]
pub struct SurveyTemplate {
    #[serde(rename = "configuracion_general")]
    pub settings: Settings,
    #[serde(rename = "preguntas", default)]
    pub questions: Vec<TemplateQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(rename = "nombre")]
    pub title: String,
    #[serde(rename = "descripcion", default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateQuestion {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "pregunta")]
    pub text: String,
    #[serde(rename = "tipo", default)]
    pub kind: QuestionKind,
    #[serde(rename = "opciones", default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

impl SurveyTemplate {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let file: TemplateFile = serde_json::from_str(json)?;
        Ok(file.survey)
    }

    pub fn title(&self) -> &str {
        &self.settings.title
    }

    pub fn description(&self) -> &str {
        &self.settings.description
    }

    /// The template questions, ordered by their position in the template.
    pub fn questions(&self) -> Vec<Question> {
        self.questions
            .iter()
            .enumerate()
            .map(|(idx, q)| Question {
                id: q.id.clone(),
                text: q.text.clone(),
                kind: q.kind,
                options: q.options.clone(),
                order: idx as i64,
                placeholder: q.placeholder.clone(),
                description: q.description.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_template() {
        let template = SurveyTemplate::from_json(
            r#"{"encuesta_bar": {
                "configuracion_general": {"nombre": "Encuesta", "descripcion": "Bar"},
                "preguntas": [
                    {"id": 1, "pregunta": "¿Edad?", "tipo": "radio", "opciones": ["18-25", "26-35"]},
                    {"id": "nombre", "pregunta": "¿Nombre?", "tipo": "text_short", "placeholder": "Tu nombre"}
                ]
            }}"#,
        )
        .unwrap();
        assert_eq!(template.title(), "Encuesta");
        let questions = template.questions();
        assert_eq!(questions[0].id, "1");
        assert_eq!(questions[1].id, "nombre");
        assert_eq!(questions[1].order, 1);
        assert!(questions[1].options.is_empty());
        assert_eq!(questions[1].placeholder.as_deref(), Some("Tu nombre"));
    }

    #[test]
    fn test_reject_garbage() {
        assert!(SurveyTemplate::from_json("{\"preguntas\": []}").is_err());
    }
}
