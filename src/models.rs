use std::collections::HashSet;

use anyhow::Error;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeType {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl BadgeType {
    pub fn as_str(&self) -> &str {
        match self {
            BadgeType::Bronze => "bronze",
            BadgeType::Silver => "silver",
            BadgeType::Gold => "gold",
            BadgeType::Platinum => "platinum",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "bronze" => Ok(BadgeType::Bronze),
            "silver" => Ok(BadgeType::Silver),
            "gold" => Ok(BadgeType::Gold),
            "platinum" => Ok(BadgeType::Platinum),
            _ => Err(Error::msg(format!("Unknown badge type: {}", s))),
        }
    }
}

/// An achievement granted to a user. Course-scoped badges carry the course
/// id; the platinum badge uses the sentinel course id "all".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    pub badge_id: String,
    pub badge_name: String,
    pub badge_type: BadgeType,
    pub course_id: String,
    pub course_name: String,
    pub earned_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub difficulty: String,
    pub badge_type: BadgeType,
    pub total_sections: i64,
    pub total_quizzes: i64,
    pub section_ids: Vec<String>,
    pub quiz_ids: Vec<String>,
    pub is_published: bool,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbCourse {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub difficulty: Option<String>,
    pub badge_type: Option<String>,
    pub total_sections: Option<i64>,
    pub total_quizzes: Option<i64>,
    pub section_ids: Option<String>,
    pub quiz_ids: Option<String>,
    pub is_published: Option<bool>,
    pub created_by: Option<i64>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbCourse> for Course {
    fn from(course: DbCourse) -> Self {
        Self {
            id: course.id.unwrap_or_default(),
            title: course.title.unwrap_or_default(),
            description: course.description.unwrap_or_default(),
            thumbnail: course.thumbnail.unwrap_or_default(),
            difficulty: course.difficulty.unwrap_or_default(),
            badge_type: course
                .badge_type
                .as_deref()
                .and_then(|s| BadgeType::from_str(s).ok())
                .unwrap_or(BadgeType::Bronze),
            total_sections: course.total_sections.unwrap_or_default(),
            total_quizzes: course.total_quizzes.unwrap_or_default(),
            section_ids: parse_json_column(course.section_ids),
            quiz_ids: parse_json_column(course.quiz_ids),
            is_published: course.is_published.unwrap_or_default(),
            created_by: course.created_by.unwrap_or_default(),
            created_at: to_utc(course.created_at),
            updated_at: to_utc(course.updated_at),
        }
    }
}

/// Latest graded attempt for one quiz. A record's quiz_results holds at
/// most one of these per quiz_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub quiz_id: String,
    pub score: i64,
    pub passed: bool,
    pub attempted_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProgressRecord {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub completed_sections: Vec<String>,
    pub quiz_results: Vec<QuizResult>,
    pub progress_percentage: i64,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbProgressRecord {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub course_id: Option<i64>,
    pub completed_sections: Option<String>,
    pub quiz_results: Option<String>,
    pub progress_percentage: Option<i64>,
    pub is_completed: Option<bool>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<DbProgressRecord> for ProgressRecord {
    fn from(db: DbProgressRecord) -> Self {
        // completed_sections is semantically a set; drop any duplicates a
        // raw row might carry before they can skew the percentage.
        let mut completed_sections: Vec<String> = parse_json_column(db.completed_sections);
        let mut seen = HashSet::new();
        completed_sections.retain(|s| seen.insert(s.clone()));

        let quiz_results: Vec<QuizResult> = db
            .quiz_results
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();

        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            course_id: db.course_id.unwrap_or_default(),
            completed_sections,
            quiz_results,
            progress_percentage: db.progress_percentage.unwrap_or_default(),
            is_completed: db.is_completed.unwrap_or_default(),
            started_at: to_utc(db.started_at),
            completed_at: db
                .completed_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)),
        }
    }
}

/// Dashboard row: a progress record with course display fields
/// denormalized for convenience.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserCourseProgress {
    pub course_id: i64,
    pub course_title: String,
    pub thumbnail: String,
    pub difficulty: String,
    pub badge_type: BadgeType,
    pub progress_percentage: i64,
    pub is_completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserCourseProgress {
    pub course_id: Option<i64>,
    pub course_title: Option<String>,
    pub thumbnail: Option<String>,
    pub difficulty: Option<String>,
    pub badge_type: Option<String>,
    pub progress_percentage: Option<i64>,
    pub is_completed: Option<bool>,
    pub started_at: Option<NaiveDateTime>,
    pub completed_at: Option<NaiveDateTime>,
}

impl From<DbUserCourseProgress> for UserCourseProgress {
    fn from(db: DbUserCourseProgress) -> Self {
        Self {
            course_id: db.course_id.unwrap_or_default(),
            course_title: db.course_title.unwrap_or_default(),
            thumbnail: db.thumbnail.unwrap_or_default(),
            difficulty: db.difficulty.unwrap_or_default(),
            badge_type: db
                .badge_type
                .as_deref()
                .and_then(|s| BadgeType::from_str(s).ok())
                .unwrap_or(BadgeType::Bronze),
            progress_percentage: db.progress_percentage.unwrap_or_default(),
            is_completed: db.is_completed.unwrap_or_default(),
            started_at: to_utc(db.started_at),
            completed_at: db
                .completed_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub course_id: i64,
    pub user_id: i64,
    pub username: String, // Denormalized for display
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone, Default)]
pub struct DbComment {
    pub id: Option<i64>,
    pub course_id: Option<i64>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub comment: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl From<DbComment> for Comment {
    fn from(db: DbComment) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            course_id: db.course_id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            username: db.username.unwrap_or_default(),
            comment: db.comment.unwrap_or_default(),
            created_at: to_utc(db.created_at),
            updated_at: to_utc(db.updated_at),
        }
    }
}

fn parse_json_column(raw: Option<String>) -> Vec<String> {
    raw.as_deref()
        .and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

fn to_utc(dt: Option<NaiveDateTime>) -> DateTime<Utc> {
    dt.map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
        .unwrap_or_else(Utc::now)
}
