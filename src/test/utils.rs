#[cfg(test)]
pub mod test_utils {
    use crate::auth::Role;
    use crate::database::init_schema;
    use crate::db::{CourseInput, create_course, create_user, set_course_published};
    use crate::error::AppError;
    use crate::init_rocket;
    use rocket::http::ContentType;
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::{Pool, Sqlite, sqlite::SqlitePoolOptions};
    use std::collections::HashMap;

    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        courses: Vec<TestCourse>,
    }

    pub struct TestUser {
        pub username: String,
        pub role: Role,
        pub password: String,
    }

    pub struct TestCourse {
        pub title: String,
        pub badge_type: String,
        pub section_ids: Vec<String>,
        pub quiz_ids: Vec<String>,
        pub published: bool,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::User,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn admin(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                role: Role::Admin,
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn course(mut self, title: &str, section_ids: &[&str], quiz_ids: &[&str]) -> Self {
            self.courses.push(TestCourse {
                title: title.to_string(),
                badge_type: "bronze".to_string(),
                section_ids: section_ids.iter().map(|s| s.to_string()).collect(),
                quiz_ids: quiz_ids.iter().map(|s| s.to_string()).collect(),
                published: true,
            });
            self
        }

        pub fn course_with_badge(
            mut self,
            title: &str,
            badge_type: &str,
            section_ids: &[&str],
            quiz_ids: &[&str],
        ) -> Self {
            self.courses.push(TestCourse {
                title: title.to_string(),
                badge_type: badge_type.to_string(),
                section_ids: section_ids.iter().map(|s| s.to_string()).collect(),
                quiz_ids: quiz_ids.iter().map(|s| s.to_string()).collect(),
                published: true,
            });
            self
        }

        pub fn unpublished_course(
            mut self,
            title: &str,
            section_ids: &[&str],
            quiz_ids: &[&str],
        ) -> Self {
            self.courses.push(TestCourse {
                title: title.to_string(),
                badge_type: "bronze".to_string(),
                section_ids: section_ids.iter().map(|s| s.to_string()).collect(),
                quiz_ids: quiz_ids.iter().map(|s| s.to_string()).collect(),
                published: false,
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            // A single connection keeps every query on the same in-memory
            // database.
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect("sqlite::memory:")
                .await?;

            init_schema(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut course_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let email = format!("{}@example.com", user.username);
                let user_id = create_user(
                    &pool,
                    &user.username,
                    &email,
                    &user.password,
                    user.role.as_str(),
                )
                .await?;

                user_id_map.insert(user.username.clone(), user_id);
            }

            for course in &self.courses {
                let input = CourseInput {
                    title: course.title.clone(),
                    description: format!("{} description", course.title),
                    thumbnail: String::new(),
                    difficulty: "beginner".to_string(),
                    badge_type: course.badge_type.clone(),
                    total_sections: course.section_ids.len() as i64,
                    total_quizzes: course.quiz_ids.len() as i64,
                    section_ids: course.section_ids.clone(),
                    quiz_ids: course.quiz_ids.clone(),
                };

                let created_by = user_id_map.values().next().copied().unwrap_or(1);
                let course_id = create_course(&pool, &input, created_by).await?;

                if course.published {
                    set_course_published(&pool, course_id, true).await?;
                }

                course_id_map.insert(course.title.clone(), course_id);
            }

            Ok(TestDb {
                pool,
                user_id_map,
                course_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub course_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn course_id(&self, title: &str) -> Option<i64> {
            self.course_id_map.get(title).copied()
        }
    }

    pub async fn create_standard_test_db() -> TestDb {
        TestDbBuilder::new()
            .user("student_user")
            .admin("admin_user")
            .course("HTML Basics", &["s1", "s2"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database")
    }

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let rocket = init_rocket(test_db.pool.clone()).await;
        let client = Client::tracked(rocket)
            .await
            .expect("Failed to build test client");

        (client, test_db)
    }

    /// Logs in through the API; the tracked client carries the session
    /// cookies on subsequent requests.
    pub async fn login_test_user(client: &Client, username: &str, password: &str) {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(
            response.status(),
            rocket::http::Status::Ok,
            "Login request failed for {}",
            username
        );
    }
}
