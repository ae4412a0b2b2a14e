#[cfg(test)]
mod tests {
    use crate::db::{
        create_comment, delete_comment, get_comment, get_comments_for_course, update_comment,
    };
    use crate::error::AppError;
    use crate::test::utils::test_utils::TestDbBuilder;
    use rocket::tokio;

    #[tokio::test]
    async fn test_create_and_get_comment() {
        let test_db = TestDbBuilder::new()
            .user("commenter")
            .course("HTML Basics", &["s1"], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("commenter").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        let comment = create_comment(&test_db.pool, course_id, user_id, "commenter", "Nice intro!")
            .await
            .expect("Failed to create comment");

        assert_eq!(comment.course_id, course_id);
        assert_eq!(comment.username, "commenter");
        assert_eq!(comment.comment, "Nice intro!");

        let fetched = get_comment(&test_db.pool, comment.id)
            .await
            .expect("Failed to fetch comment");
        assert_eq!(fetched.comment, "Nice intro!");
    }

    #[tokio::test]
    async fn test_comments_listed_per_course() {
        let test_db = TestDbBuilder::new()
            .user("commenter")
            .course("Course A", &["s1"], &[])
            .course("Course B", &["s1"], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("commenter").unwrap();
        let course_a = test_db.course_id("Course A").unwrap();
        let course_b = test_db.course_id("Course B").unwrap();

        create_comment(&test_db.pool, course_a, user_id, "commenter", "first")
            .await
            .unwrap();
        create_comment(&test_db.pool, course_a, user_id, "commenter", "second")
            .await
            .unwrap();
        create_comment(&test_db.pool, course_b, user_id, "commenter", "elsewhere")
            .await
            .unwrap();

        let comments = get_comments_for_course(&test_db.pool, course_a)
            .await
            .expect("Failed to list comments");

        assert_eq!(comments.len(), 2);
        assert!(comments.iter().all(|c| c.course_id == course_a));
    }

    #[tokio::test]
    async fn test_update_comment() {
        let test_db = TestDbBuilder::new()
            .user("commenter")
            .course("HTML Basics", &["s1"], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("commenter").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        let comment = create_comment(&test_db.pool, course_id, user_id, "commenter", "typo herre")
            .await
            .unwrap();

        update_comment(&test_db.pool, comment.id, "typo here")
            .await
            .expect("Failed to update comment");

        let updated = get_comment(&test_db.pool, comment.id).await.unwrap();
        assert_eq!(updated.comment, "typo here");
    }

    #[tokio::test]
    async fn test_delete_comment() {
        let test_db = TestDbBuilder::new()
            .user("commenter")
            .course("HTML Basics", &["s1"], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("commenter").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        let comment = create_comment(&test_db.pool, course_id, user_id, "commenter", "bye")
            .await
            .unwrap();

        delete_comment(&test_db.pool, comment.id)
            .await
            .expect("Failed to delete comment");

        match get_comment(&test_db.pool, comment.id).await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound after delete, got {:?}", other.map(|c| c.id)),
        }
    }

    #[tokio::test]
    async fn test_missing_comment_operations_not_found() {
        let test_db = TestDbBuilder::new()
            .user("commenter")
            .build()
            .await
            .expect("Failed to build test database");

        for result in [
            update_comment(&test_db.pool, 9999, "nope").await.err(),
            delete_comment(&test_db.pool, 9999).await.err(),
        ] {
            match result {
                Some(AppError::NotFound(_)) => {}
                other => panic!("Expected NotFound, got {:?}", other),
            }
        }
    }
}
