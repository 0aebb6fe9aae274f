use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::constants::OPTIONS_PER_QUESTION;
use crate::error::QuestionSourceError;
use crate::types::Question;

/// Read-only, non-empty question sequence for one round.
#[derive(Clone, Debug, PartialEq)]
pub struct QuestionBank {
    questions: Vec<Question>,
    fallback: bool,
}

impl QuestionBank {
    pub fn builtin() -> Self {
        Self {
            questions: builtin_questions(),
            fallback: true,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, QuestionSourceError> {
        let parsed: Vec<Question> = serde_json::from_str(raw)?;
        let total = parsed.len();
        let questions: Vec<Question> = parsed.into_iter().filter(is_well_formed).collect();
        if questions.len() < total {
            warn!(
                "dropped {} malformed question(s) from source",
                total - questions.len()
            );
        }
        if questions.is_empty() {
            return Err(QuestionSourceError::Empty);
        }
        Ok(Self {
            questions,
            fallback: false,
        })
    }

    pub fn load(path: &Path) -> Result<Self, QuestionSourceError> {
        let raw = fs::read_to_string(path).map_err(|source| QuestionSourceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Loads `path` if given, falling back to the built-in set on any error.
    pub fn resolve(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("no question source configured, using built-in questions");
            return Self::builtin();
        };
        match Self::load(path) {
            Ok(bank) => {
                info!("loaded {} question(s) from {}", bank.len(), path.display());
                bank
            }
            Err(err) => {
                warn!("{err}; using built-in questions");
                Self::builtin()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn into_questions(self) -> Vec<Question> {
        self.questions
    }
}

fn is_well_formed(question: &Question) -> bool {
    question.options.len() == OPTIONS_PER_QUESTION && question.correct_index < question.options.len()
}

fn builtin_questions() -> Vec<Question> {
    vec![
        Question {
            id: 1,
            text: "What is 2 + 2?".to_string(),
            options: ["3", "4", "5", "6"].map(String::from).to_vec(),
            correct_index: 1,
        },
        Question {
            id: 2,
            text: "What is the capital of France?".to_string(),
            options: ["London", "Berlin", "Paris", "Madrid"]
                .map(String::from)
                .to_vec(),
            correct_index: 2,
        },
    ]
}
