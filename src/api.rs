use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::{Deserialize, Serialize, json::Json};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{Permission, User, UserSession};
use crate::db::{
    self, CourseInput, create_comment, create_user, create_user_session,
    delete_comment, delete_course, delete_user, get_all_courses, get_all_users, get_comment,
    get_comments_for_course, get_course, get_published_courses, get_user, invalidate_session,
    set_course_published, update_comment, update_user_email, update_user_password, update_username,
};
use crate::error::AppError;
use crate::models::{Badge, BadgeType, Comment, Course, ProgressRecord, UserCourseProgress};
use crate::progress;
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub badges: Vec<Badge>,
    pub created_at: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            badges: user.badges,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize, Validate, Clone)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 30, message = "Username must be 3-30 characters"))]
    username: String,
    #[validate(email(message = "Invalid email address"))]
    email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

fn set_session_cookies(cookies: &rocket::http::CookieJar<'_>, token: String, user: &User) {
    use rocket::http::{Cookie, SameSite};

    cookies.add_private(
        Cookie::build(("session_token", token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::days(7)),
    );

    cookies.add_private(
        Cookie::build(("user_id", user.id.to_string()))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(rocket::time::Duration::days(7)),
    );

    cookies.add_private(
        Cookie::build(("logged_in", user.username.clone()))
            .same_site(SameSite::Lax)
            .max_age(rocket::time::Duration::days(7)),
    );
}

async fn open_session(
    db: &State<Pool<Sqlite>>,
    cookies: &rocket::http::CookieJar<'_>,
    user: &User,
) -> Result<(), AppError> {
    use chrono::Utc;

    let token = UserSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::days(7);

    create_user_session(db, user.id, &token, expires_at.naive_utc()).await?;
    set_session_cookies(cookies, token, user);

    Ok(())
}

#[post("/register", data = "<registration>")]
pub async fn api_register(
    registration: Json<RegisterRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    // Self-registration always lands on the user role.
    let user_id = create_user(
        db,
        &validated.username,
        &validated.email,
        &validated.password,
        "user",
    )
    .await
    .validate_custom()?;

    let user = get_user(db, user_id).await.validate_custom()?;

    open_session(db, cookies, &user).await.validate_custom()?;

    Ok(Json(UserData::from(user)))
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = login.validate_custom()?;

    match db::authenticate_user(db, &validated.username, &validated.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            open_session(db, cookies, &user).await.validate_custom()?;

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Status {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(rocket::http::Cookie::build("session_token"));
    cookies.remove_private(rocket::http::Cookie::build("user_id"));
    cookies.remove_private(rocket::http::Cookie::build("logged_in"));

    Status::Ok
}

// ---------------------------------------------------------------------------
// Course catalog
// ---------------------------------------------------------------------------

#[derive(Deserialize, Clone)]
pub struct CourseMetadataRequest {
    total_sections: i64,
    total_quizzes: i64,
    section_ids: Vec<String>,
    quiz_ids: Vec<String>,
}

#[derive(Deserialize, Validate, Clone)]
pub struct CourseRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    description: String,
    thumbnail: Option<String>,
    difficulty: Option<String>,
    badge_type: String,
    metadata: CourseMetadataRequest,
}

const DIFFICULTIES: [&str; 3] = ["beginner", "intermediate", "advanced"];

impl CourseRequest {
    /// Cross-field checks the validator derive can't express: badge tier,
    /// difficulty, and the section/quiz id-count invariants.
    fn into_input(self) -> Result<CourseInput, AppError> {
        let badge_type = BadgeType::from_str(&self.badge_type)
            .map_err(|_| AppError::Validation(format!("Unknown badge type: {}", self.badge_type)))?;

        if badge_type == BadgeType::Platinum {
            return Err(AppError::Validation(
                "Courses award bronze, silver or gold badges only".to_string(),
            ));
        }

        let difficulty = self.difficulty.unwrap_or_else(|| "beginner".to_string());
        if !DIFFICULTIES.contains(&difficulty.as_str()) {
            return Err(AppError::Validation(format!(
                "Unknown difficulty: {}",
                difficulty
            )));
        }

        check_unique_ids("section_ids", &self.metadata.section_ids)?;
        check_unique_ids("quiz_ids", &self.metadata.quiz_ids)?;

        if self.metadata.section_ids.len() as i64 != self.metadata.total_sections {
            return Err(AppError::Validation(format!(
                "section_ids has {} entries but total_sections is {}",
                self.metadata.section_ids.len(),
                self.metadata.total_sections
            )));
        }

        if self.metadata.quiz_ids.len() as i64 != self.metadata.total_quizzes {
            return Err(AppError::Validation(format!(
                "quiz_ids has {} entries but total_quizzes is {}",
                self.metadata.quiz_ids.len(),
                self.metadata.total_quizzes
            )));
        }

        Ok(CourseInput {
            title: self.title,
            description: self.description,
            thumbnail: self.thumbnail.unwrap_or_default(),
            difficulty,
            badge_type: badge_type.as_str().to_string(),
            total_sections: self.metadata.total_sections,
            total_quizzes: self.metadata.total_quizzes,
            section_ids: self.metadata.section_ids,
            quiz_ids: self.metadata.quiz_ids,
        })
    }
}

fn check_unique_ids(field: &str, ids: &[String]) -> Result<(), AppError> {
    let unique: std::collections::HashSet<&String> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(AppError::Validation(format!(
            "{} contains duplicate entries",
            field
        )));
    }
    Ok(())
}

#[post("/", data = "<course>")]
pub async fn api_create_course(
    course: Json<CourseRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Course>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageCourses)
        .validate_custom()?;

    let validated = course.validate_custom()?;
    let input = validated.into_input().validate_custom()?;

    let course_id = db::create_course(db, &input, user.id)
        .await
        .validate_custom()?;

    let created = get_course(db, course_id).await.validate_custom()?;

    Ok(Json(created))
}

#[get("/")]
pub async fn api_get_published_courses(
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = get_published_courses(db).await?;
    Ok(Json(courses))
}

#[get("/all")]
pub async fn api_get_all_courses(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Course>>, AppError> {
    user.require_permission(Permission::ViewUnpublishedCourses)?;

    let courses = get_all_courses(db).await?;
    Ok(Json(courses))
}

#[get("/<id>")]
pub async fn api_get_course(id: i64, db: &State<Pool<Sqlite>>) -> Result<Json<Course>, AppError> {
    let course = get_course(db, id).await?;
    Ok(Json(course))
}

#[put("/<id>", data = "<course>")]
pub async fn api_update_course(
    id: i64,
    course: Json<CourseRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Course>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageCourses)
        .validate_custom()?;

    let validated = course.validate_custom()?;
    let input = validated.into_input().validate_custom()?;

    db::update_course(db, id, &input).await.validate_custom()?;

    let updated = get_course(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[put("/<id>/publish")]
pub async fn api_toggle_publish(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Course>, AppError> {
    user.require_permission(Permission::ManageCourses)?;

    let course = get_course(db, id).await?;
    set_course_published(db, id, !course.is_published).await?;

    let updated = get_course(db, id).await?;
    Ok(Json(updated))
}

#[delete("/<id>")]
pub async fn api_delete_course(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    user.require_permission(Permission::ManageCourses)?;

    delete_course(db, id).await?;

    Ok(Status::Ok)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct StartProgressRequest {
    course_id: i64,
}

#[derive(Deserialize)]
pub struct SectionCompleteRequest {
    course_id: i64,
    section_id: String,
}

#[derive(Deserialize)]
pub struct QuizSubmitRequest {
    course_id: i64,
    quiz_id: String,
    score: i64,
}

#[derive(Serialize, Deserialize)]
pub struct SectionCompleteResponse {
    pub progress: ProgressRecord,
    pub badge_earned: Option<Badge>,
}

#[derive(Serialize, Deserialize)]
pub struct QuizSubmitResponse {
    pub score: i64,
    pub passed: bool,
    pub badge_earned: Option<Badge>,
}

#[post("/start", data = "<request>")]
pub async fn api_start_progress(
    request: Json<StartProgressRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressRecord>, AppError> {
    user.require_permission(Permission::TrackProgress)?;

    let record = progress::start_progress(db, user.id, request.course_id).await?;

    Ok(Json(record))
}

#[get("/user")]
pub async fn api_get_user_progress(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserCourseProgress>>, AppError> {
    let records = db::get_user_progress(db, user.id).await?;
    Ok(Json(records))
}

#[get("/course/<course_id>")]
pub async fn api_get_course_progress(
    course_id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<ProgressRecord>, AppError> {
    match db::get_progress(db, user.id, course_id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(AppError::NotFound(format!(
            "No progress for course {} yet",
            course_id
        ))),
    }
}

#[put("/section", data = "<request>")]
pub async fn api_mark_section_complete(
    request: Json<SectionCompleteRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SectionCompleteResponse>, AppError> {
    user.require_permission(Permission::TrackProgress)?;

    if request.section_id.trim().is_empty() {
        return Err(AppError::Validation("section_id is required".to_string()));
    }

    let update =
        progress::mark_section_complete(db, user.id, request.course_id, &request.section_id)
            .await?;

    Ok(Json(SectionCompleteResponse {
        progress: update.progress,
        badge_earned: update.badge_earned,
    }))
}

#[post("/quiz", data = "<request>")]
pub async fn api_submit_quiz(
    request: Json<QuizSubmitRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<QuizSubmitResponse>, AppError> {
    user.require_permission(Permission::TrackProgress)?;

    if request.quiz_id.trim().is_empty() {
        return Err(AppError::Validation("quiz_id is required".to_string()));
    }

    let outcome = progress::submit_quiz(
        db,
        user.id,
        request.course_id,
        &request.quiz_id,
        request.score,
    )
    .await?;

    Ok(Json(QuizSubmitResponse {
        score: outcome.score,
        passed: outcome.passed,
        badge_earned: outcome.badge_earned,
    }))
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Deserialize, Validate, Clone)]
pub struct CommentRequest {
    course_id: i64,
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    comment: String,
}

#[derive(Deserialize, Validate, Clone)]
pub struct CommentUpdateRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    comment: String,
}

#[post("/", data = "<request>")]
pub async fn api_create_comment(
    request: Json<CommentRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Comment>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::PostComments)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    get_course(db, validated.course_id).await.validate_custom()?;

    let comment = create_comment(
        db,
        validated.course_id,
        user.id,
        &user.username,
        &validated.comment,
    )
    .await
    .validate_custom()?;

    Ok(Json(comment))
}

#[get("/<course_id>")]
pub async fn api_get_comments(
    course_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let comments = get_comments_for_course(db, course_id).await?;
    Ok(Json(comments))
}

#[put("/<id>", data = "<request>")]
pub async fn api_update_comment(
    id: i64,
    request: Json<CommentUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Comment>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let comment = get_comment(db, id).await.validate_custom()?;

    // Owner only; admins moderate by deleting, not editing.
    if comment.user_id != user.id {
        return Err(AppError::Authorization(
            "Only the comment author can edit it".to_string(),
        ))
        .validate_custom();
    }

    update_comment(db, id, &validated.comment)
        .await
        .validate_custom()?;

    let updated = get_comment(db, id).await.validate_custom()?;

    Ok(Json(updated))
}

#[delete("/<id>")]
pub async fn api_delete_comment(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    let comment = get_comment(db, id).await?;

    if comment.user_id != user.id && !user.has_permission(Permission::ModerateComments) {
        return Err(AppError::Authorization(
            "Only the comment author or a moderator can delete it".to_string(),
        ));
    }

    delete_comment(db, id).await?;

    Ok(Status::Ok)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UserUpdateRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[get("/")]
pub async fn api_get_users(
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<UserData>>, AppError> {
    user.require_permission(Permission::ManageUsers)?;

    let users = get_all_users(db).await?;

    Ok(Json(users.into_iter().map(UserData::from).collect()))
}

#[get("/<id>")]
pub async fn api_get_user(
    id: i64,
    _user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, AppError> {
    let requested = get_user(db, id).await?;
    Ok(Json(UserData::from(requested)))
}

#[put("/<id>", data = "<update>")]
pub async fn api_update_user(
    id: i64,
    update: Json<UserUpdateRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<UserData>, AppError> {
    if user.id == id {
        user.require_permission(Permission::EditOwnProfile)?;
    } else {
        user.require_permission(Permission::ManageUsers)?;
    }

    if let Some(username) = &update.username {
        update_username(db, id, username).await?;
    }

    if let Some(email) = &update.email {
        update_user_email(db, id, email).await?;
    }

    if let Some(password) = &update.password {
        update_user_password(db, id, password).await?;
    }

    let updated = get_user(db, id).await?;
    Ok(Json(UserData::from(updated)))
}

#[delete("/<id>")]
pub async fn api_delete_user(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    user.require_permission(Permission::ManageUsers)?;

    delete_user(db, id).await?;

    Ok(Status::Ok)
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
