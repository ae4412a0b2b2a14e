#[cfg(test)]
mod tests {
    use crate::auth::Role;
    use crate::db::{
        authenticate_user, count_published_courses, create_user, find_user_by_username,
        get_user_badges, save_user_badges, update_user_email, update_username,
    };
    use crate::error::AppError;
    use crate::models::{Badge, BadgeType};
    use crate::test::utils::test_utils::{STANDARD_PASSWORD, TestDbBuilder};
    use chrono::Utc;
    use rocket::tokio;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        create_user(
            &test_db.pool,
            "fresh_user",
            "fresh_user@example.com",
            "password123",
            "user",
        )
        .await
        .expect("Failed to create user");

        let user = find_user_by_username(&test_db.pool, "fresh_user")
            .await
            .expect("Failed to look up user");

        match user {
            Some(user) => {
                assert_eq!(user.username, "fresh_user");
                assert_eq!(user.role, Role::User);
                assert!(user.badges.is_empty());
            }
            _ => panic!("User wasn't defined somehow"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let test_db = TestDbBuilder::new()
            .user("taken")
            .build()
            .await
            .expect("Failed to build test database");

        let result = create_user(
            &test_db.pool,
            "taken",
            "someone_else@example.com",
            "password123",
            "user",
        )
        .await;

        match result {
            Err(AppError::Conflict(_)) => {}
            other => panic!("Expected Conflict, got {:?}", other),
        }

        let result = create_user(
            &test_db.pool,
            "someone_else",
            "taken@example.com",
            "password123",
            "user",
        )
        .await;

        match result {
            Err(AppError::Conflict(_)) => {}
            other => panic!("Expected Conflict for duplicate email, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_authenticate_user() {
        let test_db = TestDbBuilder::new()
            .user("auth_user")
            .build()
            .await
            .expect("Failed to build test database");

        let user = authenticate_user(&test_db.pool, "auth_user", STANDARD_PASSWORD)
            .await
            .expect("Authentication query failed");
        assert!(user.is_some(), "Correct password should authenticate");

        let user = authenticate_user(&test_db.pool, "auth_user", "wrong_password")
            .await
            .expect("Authentication query failed");
        assert!(user.is_none(), "Wrong password must not authenticate");

        let user = authenticate_user(&test_db.pool, "nobody", STANDARD_PASSWORD)
            .await
            .expect("Authentication query failed");
        assert!(user.is_none(), "Unknown user must not authenticate");
    }

    #[tokio::test]
    async fn test_update_user_fields_check_uniqueness() {
        let test_db = TestDbBuilder::new()
            .user("first")
            .user("second")
            .build()
            .await
            .expect("Failed to build test database");

        let second_id = test_db.user_id("second").unwrap();

        match update_username(&test_db.pool, second_id, "first").await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("Expected Conflict, got {:?}", other),
        }

        match update_user_email(&test_db.pool, second_id, "first@example.com").await {
            Err(AppError::Conflict(_)) => {}
            other => panic!("Expected Conflict, got {:?}", other),
        }

        update_username(&test_db.pool, second_id, "renamed")
            .await
            .expect("Unique rename should succeed");
    }

    #[tokio::test]
    async fn test_badges_roundtrip() {
        let test_db = TestDbBuilder::new()
            .user("collector")
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("collector").unwrap();

        let badges = get_user_badges(&test_db.pool, user_id)
            .await
            .expect("Failed to fetch badges");
        assert!(badges.is_empty());

        let badge = Badge {
            badge_id: "badge_test".to_string(),
            badge_name: "HTML Basics Master".to_string(),
            badge_type: BadgeType::Bronze,
            course_id: "1".to_string(),
            course_name: "HTML Basics".to_string(),
            earned_at: Utc::now(),
        };

        save_user_badges(&test_db.pool, user_id, &[badge])
            .await
            .expect("Failed to save badges");

        let badges = get_user_badges(&test_db.pool, user_id)
            .await
            .expect("Failed to fetch badges");
        assert_eq!(badges.len(), 1);
        assert_eq!(badges[0].badge_id, "badge_test");
        assert_eq!(badges[0].badge_type, BadgeType::Bronze);
    }

    #[tokio::test]
    async fn test_count_published_courses() {
        let test_db = TestDbBuilder::new()
            .user("anyone")
            .course("Live A", &["s1"], &[])
            .course("Live B", &["s1"], &[])
            .unpublished_course("Draft", &["s1"], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let count = count_published_courses(&test_db.pool)
            .await
            .expect("Failed to count courses");

        assert_eq!(count, 2);
    }
}
