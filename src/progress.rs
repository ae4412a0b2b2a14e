//! Progress ledger: one record per (user, course), mutated by section
//! completions and quiz submissions. The percentage and completion flag are
//! always derived from the accumulated activity, never set by callers.

use chrono::Utc;
use sqlx::{Pool, Sqlite};
use tracing::instrument;

use crate::badges;
use crate::db;
use crate::error::AppError;
use crate::models::{Badge, Course, ProgressRecord, QuizResult};

/// Fixed passing threshold. Not configurable per course.
pub const PASSING_SCORE: i64 = 70;

#[derive(Debug)]
pub struct SectionUpdate {
    pub progress: ProgressRecord,
    pub badge_earned: Option<Badge>,
}

#[derive(Debug)]
pub struct QuizOutcome {
    pub score: i64,
    pub passed: bool,
    pub badge_earned: Option<Badge>,
}

pub fn derive_percentage(completed_count: usize, total_sections: i64) -> i64 {
    if total_sections <= 0 {
        return 0;
    }

    // The clamp guards against section ids outside the canonical set, which
    // are accepted into the record without membership validation.
    let percentage = ((completed_count as f64 / total_sections as f64) * 100.0).round() as i64;
    percentage.clamp(0, 100)
}

pub fn all_sections_done(completed_count: usize, total_sections: i64) -> bool {
    total_sections > 0 && completed_count as i64 >= total_sections
}

pub fn all_quizzes_passed(quiz_ids: &[String], results: &[QuizResult]) -> bool {
    quiz_ids
        .iter()
        .all(|quiz_id| results.iter().any(|r| r.quiz_id == *quiz_id && r.passed))
}

async fn get_or_create(
    pool: &Pool<Sqlite>,
    user_id: i64,
    course_id: i64,
) -> Result<ProgressRecord, AppError> {
    match db::get_progress(pool, user_id, course_id).await? {
        Some(record) => Ok(record),
        None => db::insert_progress(pool, user_id, course_id).await,
    }
}

/// Idempotent start: returns the existing record when present.
#[instrument(skip(pool))]
pub async fn start_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    course_id: i64,
) -> Result<ProgressRecord, AppError> {
    db::get_course(pool, course_id).await?;

    get_or_create(pool, user_id, course_id).await
}

/// Recomputes derived state, persists the record, and evaluates badges on
/// the completion transition. Both mutation paths land here, so the section
/// gate is always recomputed from the live set size rather than read back
/// from the stored percentage.
async fn finalize(
    pool: &Pool<Sqlite>,
    course: &Course,
    mut record: ProgressRecord,
) -> Result<(ProgressRecord, Option<Badge>), AppError> {
    record.progress_percentage =
        derive_percentage(record.completed_sections.len(), course.total_sections);

    let sections_done = all_sections_done(record.completed_sections.len(), course.total_sections);
    let quizzes_done = all_quizzes_passed(&course.quiz_ids, &record.quiz_results);

    // Completed is terminal: the flag never reverts and completed_at is set
    // exactly once.
    let newly_completed = sections_done && quizzes_done && !record.is_completed;
    if newly_completed {
        record.is_completed = true;
        record.completed_at = Some(Utc::now());
    }

    db::update_progress(pool, &record).await?;

    // Badges are evaluated after the record is persisted so the platinum
    // aggregate counts the course that just completed.
    let badge_earned = if newly_completed {
        badges::evaluate_awards(pool, record.user_id, course).await?
    } else {
        None
    };

    Ok((record, badge_earned))
}

#[instrument(skip(pool))]
pub async fn mark_section_complete(
    pool: &Pool<Sqlite>,
    user_id: i64,
    course_id: i64,
    section_id: &str,
) -> Result<SectionUpdate, AppError> {
    let course = db::get_course(pool, course_id).await?;
    let mut record = get_or_create(pool, user_id, course_id).await?;

    // Set insert: re-marking a completed section is a no-op for the set,
    // though the recompute below still runs.
    if !record.completed_sections.iter().any(|s| s == section_id) {
        record.completed_sections.push(section_id.to_string());
    }

    let (progress, badge_earned) = finalize(pool, &course, record).await?;

    Ok(SectionUpdate {
        progress,
        badge_earned,
    })
}

#[instrument(skip(pool))]
pub async fn submit_quiz(
    pool: &Pool<Sqlite>,
    user_id: i64,
    course_id: i64,
    quiz_id: &str,
    score: i64,
) -> Result<QuizOutcome, AppError> {
    if !(0..=100).contains(&score) {
        return Err(AppError::Validation(format!(
            "Quiz score must be between 0 and 100, got {}",
            score
        )));
    }

    let course = db::get_course(pool, course_id).await?;
    let mut record = get_or_create(pool, user_id, course_id).await?;

    let passed = score >= PASSING_SCORE;

    // Last write wins: only the latest attempt for a quiz counts.
    record.quiz_results.retain(|r| r.quiz_id != quiz_id);
    record.quiz_results.push(QuizResult {
        quiz_id: quiz_id.to_string(),
        score,
        passed,
        attempted_at: Utc::now(),
    });

    let (_, badge_earned) = finalize(pool, &course, record).await?;

    Ok(QuizOutcome {
        score,
        passed,
        badge_earned,
    })
}
