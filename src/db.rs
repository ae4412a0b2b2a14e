use crate::{
    auth::{DbUser, DbUserSession, User, UserSession},
    error::AppError,
    models::{
        Badge, Comment, Course, DbComment, DbCourse, DbProgressRecord, DbUserCourseProgress,
        ProgressRecord, UserCourseProgress,
    },
};
use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

/// Parameter object for course create/update; callers are expected to have
/// validated the section/quiz count invariants already.
pub struct CourseInput {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub difficulty: String,
    pub badge_type: String,
    pub total_sections: i64,
    pub total_quizzes: i64,
    pub section_ids: Vec<String>,
    pub quiz_ids: Vec<String>,
}

#[derive(sqlx::FromRow)]
struct DbCredentials {
    id: Option<i64>,
    password: Option<String>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, role, badges, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    info!("Finding user by username");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, role, badges, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument]
pub async fn find_user_by_email(pool: &Pool<Sqlite>, email: &str) -> Result<Option<User>, AppError> {
    info!("Finding user by email");
    let row = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, role, badges, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(User::from))
}

#[instrument]
pub async fn get_all_users(pool: &Pool<Sqlite>) -> Result<Vec<User>, AppError> {
    info!("Getting all users");
    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, username, email, role, badges, created_at FROM users ORDER BY username",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(User::from).collect())
}

#[instrument(skip_all, fields(username, role))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    if find_user_by_username(pool, username).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }

    if find_user_by_email(pool, email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "Email '{}' already registered",
            email
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query(
        "INSERT INTO users (username, email, password, role, badges) VALUES (?, ?, ?, ?, '[]')",
    )
    .bind(username)
    .bind(email)
    .bind(hashed_password)
    .bind(role)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let credentials =
        sqlx::query_as::<_, DbCredentials>("SELECT id, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    let Some(credentials) = credentials else {
        return Ok(None);
    };

    let stored_hash = credentials.password.unwrap_or_default();
    let valid = bcrypt::verify(password, &stored_hash).unwrap_or(false);

    if !valid {
        return Ok(None);
    }

    let user = get_user(pool, credentials.id.unwrap_or_default()).await?;
    Ok(Some(user))
}

#[instrument]
pub async fn update_username(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_username: &str,
) -> Result<(), AppError> {
    info!("Updating username");
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ? AND id != ?")
        .bind(new_username)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Username already exists".to_string()));
    }

    sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(new_username)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn update_user_email(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_email: &str,
) -> Result<(), AppError> {
    info!("Updating user email");
    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ? AND id != ?")
        .bind(new_email)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    sqlx::query("UPDATE users SET email = ? WHERE id = ?")
        .bind(new_email)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip_all, fields(user_id))]
pub async fn update_user_password(
    pool: &Pool<Sqlite>,
    user_id: i64,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Updating user password");
    let hashed_password = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(hashed_password)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument]
pub async fn delete_user(pool: &Pool<Sqlite>, user_id: i64) -> Result<(), AppError> {
    info!("Deleting user");
    let res = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            user_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn get_user_badges(pool: &Pool<Sqlite>, user_id: i64) -> Result<Vec<Badge>, AppError> {
    info!("Fetching user badges");
    let raw = sqlx::query_scalar::<_, String>("SELECT badges FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match raw {
        Some(raw) => Ok(serde_json::from_str(&raw).unwrap_or_default()),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            user_id
        ))),
    }
}

#[instrument(skip(pool, badges))]
pub async fn save_user_badges(
    pool: &Pool<Sqlite>,
    user_id: i64,
    badges: &[Badge],
) -> Result<(), AppError> {
    info!(count = badges.len(), "Persisting user badges");
    let raw = serde_json::to_string(badges)?;

    sqlx::query("UPDATE users SET badges = ? WHERE id = ?")
        .bind(raw)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    info!("Getting session by token");

    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Courses
// ---------------------------------------------------------------------------

#[instrument(skip(pool, course))]
pub async fn create_course(
    pool: &Pool<Sqlite>,
    course: &CourseInput,
    created_by: i64,
) -> Result<i64, AppError> {
    info!(title = %course.title, "Creating course");

    let res = sqlx::query(
        "INSERT INTO courses
         (title, description, thumbnail, difficulty, badge_type,
          total_sections, total_quizzes, section_ids, quiz_ids, is_published, created_by)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, FALSE, ?)",
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.thumbnail)
    .bind(&course.difficulty)
    .bind(&course.badge_type)
    .bind(course.total_sections)
    .bind(course.total_quizzes)
    .bind(serde_json::to_string(&course.section_ids)?)
    .bind(serde_json::to_string(&course.quiz_ids)?)
    .bind(created_by)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[instrument]
pub async fn get_course(pool: &Pool<Sqlite>, id: i64) -> Result<Course, AppError> {
    info!("Fetching course by ID");
    let row = sqlx::query_as::<_, DbCourse>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(course) => Ok(Course::from(course)),
        _ => Err(AppError::NotFound(format!(
            "Course with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn get_published_courses(pool: &Pool<Sqlite>) -> Result<Vec<Course>, AppError> {
    info!("Getting published courses");
    let rows = sqlx::query_as::<_, DbCourse>(
        "SELECT * FROM courses WHERE is_published IS TRUE ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Course::from).collect())
}

#[instrument]
pub async fn get_all_courses(pool: &Pool<Sqlite>) -> Result<Vec<Course>, AppError> {
    info!("Getting all courses");
    let rows =
        sqlx::query_as::<_, DbCourse>("SELECT * FROM courses ORDER BY created_at DESC")
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(Course::from).collect())
}

#[instrument(skip(pool, course))]
pub async fn update_course(
    pool: &Pool<Sqlite>,
    course_id: i64,
    course: &CourseInput,
) -> Result<(), AppError> {
    info!("Updating course");
    let now = Utc::now().naive_utc();

    let res = sqlx::query(
        "UPDATE courses
         SET title = ?, description = ?, thumbnail = ?, difficulty = ?, badge_type = ?,
             total_sections = ?, total_quizzes = ?, section_ids = ?, quiz_ids = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&course.title)
    .bind(&course.description)
    .bind(&course.thumbnail)
    .bind(&course.difficulty)
    .bind(&course.badge_type)
    .bind(course.total_sections)
    .bind(course.total_quizzes)
    .bind(serde_json::to_string(&course.section_ids)?)
    .bind(serde_json::to_string(&course.quiz_ids)?)
    .bind(now)
    .bind(course_id)
    .execute(pool)
    .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Course with id {} not found in database",
            course_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn set_course_published(
    pool: &Pool<Sqlite>,
    course_id: i64,
    published: bool,
) -> Result<(), AppError> {
    info!("Setting course publish state");
    let now = Utc::now().naive_utc();

    let res = sqlx::query("UPDATE courses SET is_published = ?, updated_at = ? WHERE id = ?")
        .bind(published)
        .bind(now)
        .bind(course_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Course with id {} not found in database",
            course_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn delete_course(pool: &Pool<Sqlite>, course_id: i64) -> Result<(), AppError> {
    info!("Deleting course");
    let res = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(course_id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Course with id {} not found in database",
            course_id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn count_published_courses(pool: &Pool<Sqlite>) -> Result<i64, AppError> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM courses WHERE is_published IS TRUE")
            .fetch_one(pool)
            .await?;

    Ok(count)
}

// ---------------------------------------------------------------------------
// Progress records
// ---------------------------------------------------------------------------

#[instrument]
pub async fn get_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    course_id: i64,
) -> Result<Option<ProgressRecord>, AppError> {
    info!("Fetching progress record");
    let row = sqlx::query_as::<_, DbProgressRecord>(
        "SELECT * FROM progress WHERE user_id = ? AND course_id = ?",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(ProgressRecord::from))
}

/// Inserts an empty progress record. A concurrent insert for the same
/// (user, course) pair loses the race on the unique index; that conflict is
/// resolved here by returning the surviving record.
#[instrument]
pub async fn insert_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
    course_id: i64,
) -> Result<ProgressRecord, AppError> {
    info!("Creating progress record");

    let res = sqlx::query("INSERT INTO progress (user_id, course_id) VALUES (?, ?)")
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await;

    match res {
        Ok(_) => {}
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            info!("Progress record already exists, returning existing");
        }
        Err(err) => return Err(err.into()),
    }

    get_progress(pool, user_id, course_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!(
                "Progress record for user {} course {} missing after insert",
                user_id, course_id
            ))
        })
}

#[instrument(skip(pool, record))]
pub async fn update_progress(
    pool: &Pool<Sqlite>,
    record: &ProgressRecord,
) -> Result<(), AppError> {
    info!(
        user_id = record.user_id,
        course_id = record.course_id,
        percentage = record.progress_percentage,
        "Persisting progress record"
    );

    sqlx::query(
        "UPDATE progress
         SET completed_sections = ?, quiz_results = ?, progress_percentage = ?,
             is_completed = ?, completed_at = ?
         WHERE id = ?",
    )
    .bind(serde_json::to_string(&record.completed_sections)?)
    .bind(serde_json::to_string(&record.quiz_results)?)
    .bind(record.progress_percentage)
    .bind(record.is_completed)
    .bind(record.completed_at.map(|dt| dt.naive_utc()))
    .bind(record.id)
    .execute(pool)
    .await?;

    Ok(())
}

#[instrument]
pub async fn get_user_progress(
    pool: &Pool<Sqlite>,
    user_id: i64,
) -> Result<Vec<UserCourseProgress>, AppError> {
    info!("Getting all progress for user");
    let rows = sqlx::query_as::<_, DbUserCourseProgress>(
        "SELECT p.course_id, c.title AS course_title, c.thumbnail, c.difficulty, c.badge_type,
                p.progress_percentage, p.is_completed, p.started_at, p.completed_at
         FROM progress p
         JOIN courses c ON c.id = p.course_id
         WHERE p.user_id = ?
         ORDER BY p.started_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(UserCourseProgress::from).collect())
}

#[instrument]
pub async fn count_completed_courses(pool: &Pool<Sqlite>, user_id: i64) -> Result<i64, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM progress WHERE user_id = ? AND is_completed IS TRUE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[instrument(skip(pool, comment))]
pub async fn create_comment(
    pool: &Pool<Sqlite>,
    course_id: i64,
    user_id: i64,
    username: &str,
    comment: &str,
) -> Result<Comment, AppError> {
    info!("Creating comment");

    let res = sqlx::query(
        "INSERT INTO comments (course_id, user_id, username, comment) VALUES (?, ?, ?, ?)",
    )
    .bind(course_id)
    .bind(user_id)
    .bind(username)
    .bind(comment)
    .execute(pool)
    .await?;

    get_comment(pool, res.last_insert_rowid()).await
}

#[instrument]
pub async fn get_comment(pool: &Pool<Sqlite>, id: i64) -> Result<Comment, AppError> {
    info!("Fetching comment");
    let row = sqlx::query_as::<_, DbComment>("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(comment) => Ok(Comment::from(comment)),
        _ => Err(AppError::NotFound(format!(
            "Comment with id {} not found in database",
            id
        ))),
    }
}

#[instrument]
pub async fn get_comments_for_course(
    pool: &Pool<Sqlite>,
    course_id: i64,
) -> Result<Vec<Comment>, AppError> {
    info!("Getting comments for course");
    let rows = sqlx::query_as::<_, DbComment>(
        "SELECT * FROM comments WHERE course_id = ? ORDER BY created_at DESC",
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Comment::from).collect())
}

#[instrument(skip(pool, comment))]
pub async fn update_comment(pool: &Pool<Sqlite>, id: i64, comment: &str) -> Result<(), AppError> {
    info!("Updating comment");
    let now = Utc::now().naive_utc();

    let res = sqlx::query("UPDATE comments SET comment = ?, updated_at = ? WHERE id = ?")
        .bind(comment)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Comment with id {} not found in database",
            id
        )));
    }

    Ok(())
}

#[instrument]
pub async fn delete_comment(pool: &Pool<Sqlite>, id: i64) -> Result<(), AppError> {
    info!("Deleting comment");
    let res = sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if res.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Comment with id {} not found in database",
            id
        )));
    }

    Ok(())
}
