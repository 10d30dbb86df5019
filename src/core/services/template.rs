use std::fs::read_to_string;
use std::path::Path;

use log::info;

use crate::core::models::template::SurveyTemplate;
use crate::error::Error;

pub const DEFAULT_TEMPLATE: &str = include_str!("../../../assets/encuesta.json");

/// Loads the survey template from `path`, or the bundled one when no path is configured.
pub fn load_template(path: Option<&Path>) -> Result<SurveyTemplate, Error> {
    match path {
        Some(path) => {
            info!("loading survey template from {}", path.display());
            SurveyTemplate::from_json(&read_to_string(path)?)
        }
        None => SurveyTemplate::from_json(DEFAULT_TEMPLATE),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::models::question::QuestionKind;

    #[test]
    fn test_bundled_template() {
        let template = load_template(None).unwrap();
        assert_eq!(template.title(), "Encuesta Bar");
        let questions = template.questions();
        assert!(!questions.is_empty());
        assert!(questions.iter().filter(|q| q.kind.is_choice()).all(|q| !q.options.is_empty()));
        assert!(questions.iter().any(|q| q.kind == QuestionKind::MultipleChoice));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(load_template(Some(Path::new("/nonexistent/encuesta.json"))), Err(Error::IoError(_))));
    }
}
