// The artifact quiz shown once every artifact has been found. Finishing the
// quiz, not passing it, unlocks the runestone fragment.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub id: &'static str,
    pub text: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: &'static str,
    /// Artifact the question is about, if it belongs to the catalog.
    pub artifact_id: Option<&'static str>,
    pub question: &'static str,
    pub answers: &'static [Answer],
    pub correct_answer_id: &'static str,
}

impl Question {
    pub fn has_answer(&self, answer_id: &str) -> bool {
        self.answers.iter().any(|a| a.id == answer_id)
    }
}

pub const RUNESTONE_NAME: &str = "Artefacts Runestone";

pub const QUIZ: &[Question] = &[
    Question {
        id: "q1",
        artifact_id: Some("artifact-1"),
        question: "Which material was commonly used to make Viking swords?",
        answers: &[
            Answer { id: "a1", text: "Bronze" },
            Answer { id: "a2", text: "Iron/Steel" },
            Answer { id: "a3", text: "Wood" },
        ],
        correct_answer_id: "a2",
    },
    Question {
        id: "q2",
        artifact_id: Some("artifact-3"),
        question: "Runestones were primarily used to:",
        answers: &[
            Answer { id: "a1", text: "Record important events or memorials" },
            Answer { id: "a2", text: "Store grain" },
            Answer { id: "a3", text: "Weave fabrics" },
        ],
        correct_answer_id: "a1",
    },
    Question {
        id: "q3",
        artifact_id: None,
        question: "Which of these items is commonly found as a grave good in Viking burials?",
        answers: &[
            Answer { id: "a1", text: "Smartphone" },
            Answer { id: "a2", text: "Brooch" },
            Answer { id: "a3", text: "Plastic bottle" },
            Answer { id: "a4", text: "Glass jar" },
        ],
        correct_answer_id: "a2",
    },
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuizError {
    #[error("quiz already finished")]
    Finished,
    #[error("question {question} has no answer {answer}")]
    UnknownAnswer { question: String, answer: String },
}

/// Progress through one sitting of the quiz.
#[derive(Debug, Clone)]
pub struct QuizRun<'a> {
    questions: &'a [Question],
    current: usize,
    correct: usize,
}

impl<'a> QuizRun<'a> {
    pub fn new(questions: &'a [Question]) -> Self {
        Self {
            questions,
            current: 0,
            correct: 0,
        }
    }

    pub fn current(&self) -> Option<&'a Question> {
        self.questions.get(self.current)
    }

    /// Answer the current question and move to the next one. Returns
    /// whether the answer was correct.
    pub fn answer(&mut self, answer_id: &str) -> Result<bool, QuizError> {
        let question = self.current().ok_or(QuizError::Finished)?;
        if !question.has_answer(answer_id) {
            return Err(QuizError::UnknownAnswer {
                question: question.id.to_string(),
                answer: answer_id.to_string(),
            });
        }

        let correct = question.correct_answer_id == answer_id;
        if correct {
            self.correct += 1;
        }
        self.current += 1;
        Ok(correct)
    }

    pub fn answered(&self) -> usize {
        self.current
    }

    pub fn correct(&self) -> usize {
        self.correct
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.questions.len()
    }
}
