use log::info;
use serde::Serialize;

use crate::core::models::question::{Question, QuestionKind};
use crate::core::models::response::{AnswerValue, Answers};
use crate::core::ports::document_store::DocumentStore;
use crate::core::ports::local_storage::KeyValueStorage;
use crate::core::services::response::{ResponseSynchronizer, SubmitOutcome};
use crate::error::Error;

pub const ADMIN_PATH: &str = "/adminzo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Survey,
    Admin,
}

impl Mode {
    pub fn from_path(path: &str) -> Self {
        if path == ADMIN_PATH {
            Mode::Admin
        } else {
            Mode::Survey
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", content = "index", rename_all = "snake_case")]
pub enum Step {
    Welcome,
    Question(usize),
    Success,
}

/// One respondent's walk through the survey. The question list is passed to every call so
/// admin edits show up in flows already under way.
#[derive(Debug, Clone, Serialize)]
pub struct SurveyFlow {
    step: Step,
    answers: Answers,
    outcome: Option<SubmitOutcome>,
}

impl Default for SurveyFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl SurveyFlow {
    pub fn new() -> Self {
        Self {
            step: Step::Welcome,
            answers: Answers::new(),
            outcome: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn answers(&self) -> &Answers {
        &self.answers
    }

    /// How the submission went, once the flow reached [`Step::Success`].
    pub fn outcome(&self) -> Option<&SubmitOutcome> {
        self.outcome.as_ref()
    }

    pub fn start(&mut self, questions: &[Question]) -> Result<Step, Error> {
        if self.step != Step::Welcome {
            return Err(Error::BusinessError("survey already started".into()));
        }
        if questions.is_empty() {
            return Err(Error::BusinessError("survey has no questions".into()));
        }
        self.step = Step::Question(0);
        Ok(self.step)
    }

    pub fn current_question<'q>(&self, questions: &'q [Question]) -> Option<&'q Question> {
        match self.step {
            Step::Question(idx) => questions.get(idx),
            _ => None,
        }
    }

    fn require_question<'q>(&self, questions: &'q [Question]) -> Result<&'q Question, Error> {
        self.current_question(questions).ok_or_else(|| Error::BusinessError("no question is being answered".into()))
    }

    /// Multiple-choice answers toggle `value` in the selected set; every other kind replaces
    /// the answer.
    pub fn select_answer(&mut self, questions: &[Question], value: &str) -> Result<&AnswerValue, Error> {
        let question = self.require_question(questions)?;
        let answer = match question.kind {
            QuestionKind::MultipleChoice => {
                let mut selected = match self.answers.remove(&question.id) {
                    Some(AnswerValue::Many(values)) => values,
                    Some(AnswerValue::One(value)) if !value.is_empty() => vec![value],
                    _ => Vec::new(),
                };
                match selected.iter().position(|v| v == value) {
                    Some(pos) => {
                        selected.remove(pos);
                    }
                    None => selected.push(value.to_owned()),
                }
                AnswerValue::Many(selected)
            }
            _ => AnswerValue::One(value.to_owned()),
        };
        self.answers.insert(question.id.clone(), answer);
        Ok(&self.answers[&question.id])
    }

    /// Forward is blocked while the current answer is empty.
    pub fn can_advance(&self, questions: &[Question]) -> bool {
        self.current_question(questions)
            .and_then(|q| self.answers.get(&q.id))
            .map_or(false, |answer| !answer.is_empty())
    }

    /// Moves to the next question. From the last one, submits the answers and moves to
    /// [`Step::Success`] whatever the remote store did.
    pub async fn advance<S, K>(&mut self, questions: &[Question], sync: &ResponseSynchronizer<S, K>, device: Option<String>) -> Result<Step, Error>
    where
        S: DocumentStore,
        K: KeyValueStorage + 'static,
    {
        let idx = match self.step {
            Step::Question(idx) => idx,
            _ => return Err(Error::BusinessError("no question is being answered".into())),
        };
        if !self.can_advance(questions) {
            return Err(Error::BusinessError("the current question needs an answer".into()));
        }
        if idx + 1 < questions.len() {
            self.step = Step::Question(idx + 1);
        } else {
            let outcome = sync.submit(self.answers.clone(), device).await;
            info!("survey completed, submission {:?}", outcome);
            self.outcome = Some(outcome);
            self.step = Step::Success;
        }
        Ok(self.step)
    }

    pub fn retreat(&mut self) -> Step {
        if let Step::Question(idx) = self.step {
            self.step = Step::Question(idx.saturating_sub(1));
        }
        self.step
    }

    /// `(index + 1) / total` while answering.
    pub fn progress(&self, total: usize) -> f64 {
        match self.step {
            Step::Welcome => 0.0,
            Step::Question(_) if total == 0 => 0.0,
            Step::Question(idx) => (idx + 1) as f64 / total as f64,
            Step::Success => 1.0,
        }
    }
}
