#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod badges;
mod database;
mod db;
mod env;
mod error;
mod models;
mod progress;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use api::{
    api_create_comment, api_create_course, api_delete_comment, api_delete_course, api_delete_user,
    api_get_all_courses, api_get_comments, api_get_course, api_get_course_progress,
    api_get_published_courses, api_get_user, api_get_user_progress, api_get_users, api_login,
    api_logout, api_mark_section_complete, api_me, api_me_unauthorized, api_register,
    api_start_progress, api_submit_quiz, api_toggle_publish, api_update_comment,
    api_update_course, api_update_user, health,
};
use auth::{forbidden_api, unauthorized_api};
use db::clean_expired_sessions;
use rocket::{Build, Rocket, tokio};
use sqlx::SqlitePool;
use telemetry::{TelemetryFairing, init_telemetry};
use tracing::{error, info, warn};

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment files: {}", e);
    }

    init_telemetry();

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory database");
            "sqlite::memory:".to_string()
        }
    };

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Applying database schema...");
    database::init_schema(&pool)
        .await
        .expect("Database schema initialization failed");

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    init_rocket(pool).await
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting course tracker");

    rocket::build()
        .manage(pool)
        .mount(
            "/api/auth",
            routes![
                api_register,
                api_login,
                api_me,
                api_me_unauthorized,
                api_logout
            ],
        )
        .mount(
            "/api/courses",
            routes![
                api_create_course,
                api_get_published_courses,
                api_get_all_courses,
                api_get_course,
                api_update_course,
                api_toggle_publish,
                api_delete_course
            ],
        )
        .mount(
            "/api/progress",
            routes![
                api_start_progress,
                api_get_user_progress,
                api_get_course_progress,
                api_mark_section_complete,
                api_submit_quiz
            ],
        )
        .mount(
            "/api/comments",
            routes![
                api_create_comment,
                api_get_comments,
                api_update_comment,
                api_delete_comment
            ],
        )
        .mount(
            "/api/users",
            routes![api_get_users, api_get_user, api_update_user, api_delete_user],
        )
        .mount("/api", routes![health])
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .attach(TelemetryFairing)
}
