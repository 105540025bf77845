//! Single-owner quiz session: question sequencing, answer checking, scoring
//! and the end-of-quiz review.

use crate::models::QuestionRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "index", rename_all = "camelCase")]
pub enum SessionPhase {
    Displaying(usize),
    Answered(usize),
    Completed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("could not load questions: the question list is empty")]
    NoQuestions,
    #[error("question {} has already been answered", .0 + 1)]
    AlreadyAnswered(usize),
    #[error("question {} has not been answered yet", .0 + 1)]
    NotAnswered(usize),
    #[error("the quiz is already completed")]
    QuizCompleted,
    #[error("the quiz is not completed yet")]
    NotCompleted,
}

/// Result of a submit attempt, for the view to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    NoSelection,
    Correct {
        explanation: Option<String>,
    },
    Incorrect {
        correct_answer: String,
        explanation: Option<String>,
    },
    /// The record cannot be checked; the session already moved past it.
    DataError {
        index: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum RecordedAnswer {
    Answered(String),
    NotAnswered,
}

impl RecordedAnswer {
    pub fn label(&self) -> &str {
        match self {
            RecordedAnswer::Answered(text) => text,
            RecordedAnswer::NotAnswered => "Not answered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    pub index: usize,
    pub prompt: String,
    pub answer: RecordedAnswer,
    pub correct_answer: String,
    pub is_correct: bool,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSummary {
    pub score: usize,
    pub total: usize,
    pub percentage: f64,
    pub review: Vec<ReviewItem>,
}

pub fn percentage(score: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (score as f64) * 100.0 / (total as f64)
    }
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuestionRecord>,
    current_index: usize,
    score: usize,
    answers: BTreeMap<usize, String>,
    phase: SessionPhase,
}

impl QuizSession {
    pub fn start(questions: Vec<QuestionRecord>) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }
        Ok(Self {
            questions,
            current_index: 0,
            score: 0,
            answers: BTreeMap::new(),
            phase: SessionPhase::Displaying(0),
        })
    }

    pub fn restart(&mut self) {
        self.current_index = 0;
        self.score = 0;
        self.answers.clear();
        self.phase = SessionPhase::Displaying(0);
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    pub fn is_completed(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    pub fn current_question(&self) -> Option<&QuestionRecord> {
        match self.phase {
            SessionPhase::Completed => None,
            _ => self.questions.get(self.current_index),
        }
    }

    pub fn answer_for(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn submit_answer(&mut self, selection: Option<&str>) -> Result<Feedback, SessionError> {
        let index = match self.phase {
            SessionPhase::Displaying(i) => i,
            SessionPhase::Answered(i) => return Err(SessionError::AlreadyAnswered(i)),
            SessionPhase::Completed => return Err(SessionError::QuizCompleted),
        };
        let selected = match selection.filter(|s| !s.trim().is_empty()) {
            Some(s) => s,
            None => return Ok(Feedback::NoSelection),
        };

        let question = &self.questions[index];
        if !question.is_well_formed() {
            tracing::warn!(index, "question record is malformed, skipping it");
            self.move_past(index);
            return Ok(Feedback::DataError { index });
        }

        let correct = question.is_correct(selected);
        let explanation = question
            .has_explanation()
            .then(|| question.explanation.clone());
        let feedback = if correct {
            Feedback::Correct { explanation }
        } else {
            Feedback::Incorrect {
                correct_answer: question.correct_answer.clone(),
                explanation,
            }
        };

        if correct {
            self.score += 1;
        }
        self.answers.insert(index, selected.to_string());
        self.phase = SessionPhase::Answered(index);
        Ok(feedback)
    }

    pub fn advance(&mut self) -> Result<SessionPhase, SessionError> {
        match self.phase {
            SessionPhase::Answered(i) => {
                self.move_past(i);
                Ok(self.phase)
            }
            SessionPhase::Displaying(i) if !self.questions[i].is_well_formed() => {
                self.move_past(i);
                Ok(self.phase)
            }
            SessionPhase::Displaying(i) => Err(SessionError::NotAnswered(i)),
            SessionPhase::Completed => Err(SessionError::QuizCompleted),
        }
    }

    fn move_past(&mut self, index: usize) {
        self.current_index = index + 1;
        self.phase = if self.current_index < self.questions.len() {
            SessionPhase::Displaying(self.current_index)
        } else {
            SessionPhase::Completed
        };
    }

    pub fn summary(&self) -> Result<QuizSummary, SessionError> {
        if !self.is_completed() {
            return Err(SessionError::NotCompleted);
        }
        let review = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, q)| {
                let answer = match self.answers.get(&index) {
                    Some(a) => RecordedAnswer::Answered(a.clone()),
                    None => RecordedAnswer::NotAnswered,
                };
                let is_correct = matches!(&answer, RecordedAnswer::Answered(a) if q.is_correct(a));
                ReviewItem {
                    index,
                    prompt: q.prompt.clone(),
                    answer,
                    correct_answer: q.correct_answer.clone(),
                    is_correct,
                    explanation: q.has_explanation().then(|| q.explanation.clone()),
                }
            })
            .collect();
        Ok(QuizSummary {
            score: self.score,
            total: self.total(),
            percentage: percentage(self.score, self.total()),
            review,
        })
    }
}
