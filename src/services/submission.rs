// src/services/submission.rs

use crate::{
    mail::template::{StudentNotice, WelcomeNotice},
    models::{
        answer::CanonicalAnswer,
        attempt::Attempt,
        quiz::Quiz,
        result::{NewResult, QuizResult, RawScore, ScoreSummary},
    },
    services::{
        attempts::{AttemptError, AttemptService, FinalizeInput},
        notifier::{Dispatch, Notifier},
        results::{ResultError, ResultService},
    },
    state::AppState,
    store::OpenQuiz,
};

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Attempt(#[from] AttemptError),

    #[error(transparent)]
    Result(#[from] ResultError),
}

/// A normalized finalize request.
#[derive(Debug, Clone)]
pub struct FinalizeCommand {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub answers: Vec<CanonicalAnswer>,
}

pub struct FinalizeOutcome {
    pub attempt: Attempt,
    pub result: QuizResult,
    pub summary: ScoreSummary,
    /// Background sends. Dropping the handles does not cancel them.
    pub dispatch: Dispatch,
}

/// Finalize pipeline for one quiz: score the attempt, store the result,
/// then hand notifications off to background tasks.
pub struct SubmissionService {
    quiz: Quiz,
    attempts: AttemptService,
    results: ResultService,
    notifier: Notifier,
}

impl SubmissionService {
    pub fn new(state: &AppState, open: OpenQuiz) -> Self {
        Self {
            quiz: open.quiz,
            attempts: AttemptService::new(open.stores.attempts),
            results: ResultService::new(open.stores.results, state.tokens.clone()),
            notifier: state.notifier.clone(),
        }
    }

    pub async fn finalize(&self, command: FinalizeCommand) -> Result<FinalizeOutcome, SubmissionError> {
        let framework = self.quiz.effective_framework();
        let quiz_id = &self.quiz.quiz_id;

        let finalized = self
            .attempts
            .finalize_attempt(
                FinalizeInput {
                    user_id: command.user_id,
                    email: command.email,
                    answers: command.answers.clone(),
                },
                &framework,
            )
            .await?;
        let attempt = finalized.attempt;
        let summary = finalized.summary;

        let result = self
            .results
            .create_result(NewResult {
                quiz_id: quiz_id.clone(),
                user_id: attempt.user_id.clone(),
                email: attempt.email.clone(),
                name: command.name.clone(),
                phone: command.phone.unwrap_or_else(|| attempt.phone.clone()),
                summary: summary.clone(),
                raw: RawScore {
                    answers: command.answers,
                    score: summary.total,
                },
                attempt_id: attempt.id,
            })
            .await?;

        let dispatch = self.notifier.dispatch(
            WelcomeNotice {
                to: result.email.clone(),
                name: command.name.clone(),
                quiz_id: quiz_id.clone(),
                summary: result.summary.clone(),
                result_token: result.result_token.clone(),
            },
            StudentNotice {
                email: result.email.clone(),
                name: command.name,
                quiz_id: quiz_id.clone(),
                score: result.summary.total,
                top_category: result.summary.top_category.clone(),
            },
        );

        Ok(FinalizeOutcome {
            attempt,
            result,
            summary,
            dispatch,
        })
    }
}
