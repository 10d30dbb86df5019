use chrono::Local;
use log::info;

use crate::core::models::export::Row;
use crate::core::models::question::Question;
use crate::core::models::response::Response;
use crate::core::ports::exporter::{ExportFile, TableExporter};
use crate::error::Error;

pub const ID_COLUMN: &str = "ID";
pub const DATE_COLUMN: &str = "Fecha";
pub const DEVICE_COLUMN: &str = "Dispositivo";
pub const MISSING: &str = "N/A";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row per response: id, date, device, then one column per question titled by its text.
/// Unanswered questions are left blank.
pub fn build_rows(responses: &[Response], questions: &[Question]) -> Vec<Row> {
    responses
        .iter()
        .map(|r| {
            let mut row = Row::default();
            row.push(ID_COLUMN, r.id.to_string());
            row.push(
                DATE_COLUMN,
                r.created_at.to_date().map_or_else(|| MISSING.to_owned(), |at| at.with_timezone(&Local).format(DATE_FORMAT).to_string()),
            );
            row.push(DEVICE_COLUMN, r.device.clone().unwrap_or_else(|| MISSING.to_owned()));
            for q in questions {
                row.push(q.text.clone(), r.answer(&q.id).map(|a| a.joined()).unwrap_or_default());
            }
            row
        })
        .collect()
}

pub fn export<E>(exporter: &E, responses: &[Response], questions: &[Question]) -> Result<ExportFile, Error>
where
    E: TableExporter,
{
    let rows = build_rows(responses, questions);
    let file = exporter.export(&rows)?;
    info!("exported {} responses to {}", rows.len(), file.filename);
    Ok(file)
}

/// Short device label for listings: a phone or computer marker, then the first detail of the
/// user agent's parenthesised section, or its first 20 characters.
pub fn summarize_device(device: &str) -> String {
    let marker = if device.contains("Mobi") { "📱" } else { "💻" };
    let detail: String = match device.split_once('(') {
        Some((_, rest)) => rest.split(')').next().unwrap_or_default().split(';').next().unwrap_or_default().to_owned(),
        None => device.chars().take(20).collect(),
    };
    format!("{} {}", marker, detail)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::models::question::QuestionKind;
    use crate::core::models::response::{AnswerValue, Answers, CreatedAt, ResponseId};
    use crate::impls::exporters::xlsx::{XlsxExporter, FILENAME};

    fn question(id: &str, text: &str, kind: QuestionKind) -> Question {
        Question {
            id: id.into(),
            text: text.into(),
            kind,
            options: Vec::new(),
            order: 0,
            placeholder: None,
            description: None,
        }
    }

    fn responses() -> Vec<Response> {
        vec![
            Response {
                id: ResponseId::Remote("abc".into()),
                answers: Answers::from([
                    ("1".to_owned(), AnswerValue::One("25-34".into())),
                    ("2".to_owned(), AnswerValue::Many(vec!["Rock".into(), "Jazz".into()])),
                ]),
                device: Some("Mozilla/5.0 (Linux; Android 14) Mobile".into()),
                created_at: CreatedAt::Pending,
            },
            Response {
                id: ResponseId::Local("1700000000000".into()),
                answers: Answers::from([("9".to_owned(), AnswerValue::One("huérfana".into()))]),
                device: None,
                created_at: CreatedAt::Client(chrono::Utc::now()),
            },
        ]
    }

    #[test]
    fn test_rows_recover_answers() {
        let questions = vec![question("1", "¿Edad?", QuestionKind::SingleChoice), question("2", "¿Música?", QuestionKind::MultipleChoice)];
        let responses = responses();
        let rows = build_rows(&responses, &questions);
        for (row, response) in rows.iter().zip(&responses) {
            assert_eq!(row.get(ID_COLUMN), Some(response.id.to_string().as_str()));
            for q in &questions {
                let cell = row.get(&q.text).unwrap();
                let parsed = AnswerValue::from_edit_text(q.kind, cell);
                match response.answer(&q.id) {
                    Some(answer) => assert_eq!(&parsed, answer),
                    None => assert!(cell.is_empty()),
                }
            }
        }
        assert_eq!(rows[0].get(DATE_COLUMN), Some(MISSING));
        assert_ne!(rows[1].get(DATE_COLUMN), Some(MISSING));
        assert_eq!(rows[1].get(DEVICE_COLUMN), Some(MISSING));
        assert_eq!(rows[0].columns().collect::<Vec<_>>(), vec!["ID", "Fecha", "Dispositivo", "¿Edad?", "¿Música?"]);
    }

    #[test]
    fn test_export() {
        let file = export(&XlsxExporter::default(), &responses(), &[]).unwrap();
        assert_eq!(file.filename, FILENAME);
        assert!(!file.content.is_empty());
    }

    #[test]
    fn test_summarize_device() {
        assert_eq!(summarize_device("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148"), "📱 iPhone");
        assert_eq!(summarize_device("Mozilla/5.0 (Windows NT 10.0; Win64; x64)"), "💻 Windows NT 10.0");
        assert_eq!(summarize_device("curl/8.4.0 something long"), "💻 curl/8.4.0 something");
    }
}
