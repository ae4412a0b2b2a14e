#[cfg(test)]
mod tests {
    use crate::error::AppError;
    use crate::models::QuizResult;
    use crate::progress::{
        all_quizzes_passed, all_sections_done, derive_percentage, mark_section_complete,
        start_progress, submit_quiz,
    };
    use crate::test::utils::test_utils::TestDbBuilder;
    use chrono::Utc;
    use rocket::tokio;

    fn quiz_result(quiz_id: &str, score: i64) -> QuizResult {
        QuizResult {
            quiz_id: quiz_id.to_string(),
            score,
            passed: score >= 70,
            attempted_at: Utc::now(),
        }
    }

    #[test]
    fn test_derive_percentage() {
        assert_eq!(derive_percentage(0, 2), 0);
        assert_eq!(derive_percentage(1, 2), 50);
        assert_eq!(derive_percentage(2, 2), 100);
        assert_eq!(derive_percentage(1, 3), 33);
        assert_eq!(derive_percentage(2, 3), 67);

        // Zero-section courses stay at zero regardless of activity.
        assert_eq!(derive_percentage(0, 0), 0);
        assert_eq!(derive_percentage(5, 0), 0);

        // Counts beyond the canonical total are capped.
        assert_eq!(derive_percentage(3, 2), 100);
        assert_eq!(derive_percentage(100, 2), 100);
    }

    #[test]
    fn test_all_sections_done() {
        assert!(all_sections_done(2, 2));
        assert!(all_sections_done(3, 2));
        assert!(!all_sections_done(1, 2));

        // A course with no sections can never satisfy the gate.
        assert!(!all_sections_done(0, 0));
        assert!(!all_sections_done(5, 0));
    }

    #[test]
    fn test_all_quizzes_passed() {
        let quiz_ids = vec!["q1".to_string(), "q2".to_string()];

        assert!(!all_quizzes_passed(&quiz_ids, &[]));
        assert!(!all_quizzes_passed(&quiz_ids, &[quiz_result("q1", 90)]));
        assert!(!all_quizzes_passed(
            &quiz_ids,
            &[quiz_result("q1", 90), quiz_result("q2", 50)]
        ));
        assert!(all_quizzes_passed(
            &quiz_ids,
            &[quiz_result("q1", 90), quiz_result("q2", 70)]
        ));

        // Results for unknown quizzes are ignored by the gate.
        assert!(!all_quizzes_passed(&quiz_ids, &[quiz_result("other", 100)]));

        // No quizzes means the gate is trivially open.
        assert!(all_quizzes_passed(&[], &[]));
    }

    #[tokio::test]
    async fn test_progression_to_completion() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1", "s2"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        let update = mark_section_complete(&test_db.pool, user_id, course_id, "s1")
            .await
            .expect("Failed to mark section");
        assert_eq!(update.progress.progress_percentage, 50);
        assert!(!update.progress.is_completed);
        assert!(update.badge_earned.is_none());

        let update = mark_section_complete(&test_db.pool, user_id, course_id, "s2")
            .await
            .expect("Failed to mark section");
        assert_eq!(update.progress.progress_percentage, 100);
        assert!(
            !update.progress.is_completed,
            "Course must not complete before the quiz is passed"
        );

        let outcome = submit_quiz(&test_db.pool, user_id, course_id, "q1", 80)
            .await
            .expect("Failed to submit quiz");
        assert_eq!(outcome.score, 80);
        assert!(outcome.passed);

        let badge = outcome.badge_earned.expect("Completion should award a badge");
        assert_eq!(badge.course_name, "HTML Basics");

        let record = crate::db::get_progress(&test_db.pool, user_id, course_id)
            .await
            .unwrap()
            .expect("Record should exist");
        assert!(record.is_completed);
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_quiz_does_not_complete() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        mark_section_complete(&test_db.pool, user_id, course_id, "s1")
            .await
            .expect("Failed to mark section");

        let outcome = submit_quiz(&test_db.pool, user_id, course_id, "q1", 50)
            .await
            .expect("Failed to submit quiz");

        assert!(!outcome.passed);
        assert!(outcome.badge_earned.is_none());

        let record = crate::db::get_progress(&test_db.pool, user_id, course_id)
            .await
            .unwrap()
            .unwrap();
        assert!(!record.is_completed);
        assert!(record.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_section_marking_is_idempotent() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1", "s2"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        let first = mark_section_complete(&test_db.pool, user_id, course_id, "s1")
            .await
            .expect("Failed to mark section");
        let second = mark_section_complete(&test_db.pool, user_id, course_id, "s1")
            .await
            .expect("Failed to re-mark section");

        assert_eq!(first.progress.completed_sections.len(), 1);
        assert_eq!(second.progress.completed_sections.len(), 1);
        assert_eq!(
            first.progress.progress_percentage,
            second.progress.progress_percentage
        );
    }

    #[tokio::test]
    async fn test_percentage_clamped_for_unknown_sections() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1", "s2"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        // Section ids are not validated against the canonical set; the
        // percentage still has to stay within 0-100.
        for section in ["s1", "bogus-1", "bogus-2"] {
            mark_section_complete(&test_db.pool, user_id, course_id, section)
                .await
                .expect("Failed to mark section");
        }

        let record = crate::db::get_progress(&test_db.pool, user_id, course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.progress_percentage, 100);
        assert!(
            !record.is_completed,
            "Quiz gate must still hold even with a saturated section count"
        );
    }

    #[tokio::test]
    async fn test_completion_happens_exactly_once() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        mark_section_complete(&test_db.pool, user_id, course_id, "s1")
            .await
            .expect("Failed to mark section");
        let outcome = submit_quiz(&test_db.pool, user_id, course_id, "q1", 90)
            .await
            .expect("Failed to submit quiz");
        assert!(outcome.badge_earned.is_some());

        let completed_at = crate::db::get_progress(&test_db.pool, user_id, course_id)
            .await
            .unwrap()
            .unwrap()
            .completed_at
            .expect("completed_at should be set");

        // A later qualifying action must not re-complete or re-award.
        let outcome = submit_quiz(&test_db.pool, user_id, course_id, "q1", 95)
            .await
            .expect("Failed to re-submit quiz");
        assert!(outcome.badge_earned.is_none());

        let record = crate::db::get_progress(&test_db.pool, user_id, course_id)
            .await
            .unwrap()
            .unwrap();
        assert!(record.is_completed);
        assert_eq!(record.completed_at, Some(completed_at));
    }

    #[tokio::test]
    async fn test_quiz_resubmission_replaces_result() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1", "s2"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        submit_quiz(&test_db.pool, user_id, course_id, "q1", 50)
            .await
            .expect("Failed to submit quiz");
        submit_quiz(&test_db.pool, user_id, course_id, "q1", 80)
            .await
            .expect("Failed to submit quiz");
        submit_quiz(&test_db.pool, user_id, course_id, "q1", 60)
            .await
            .expect("Failed to submit quiz");

        let record = crate::db::get_progress(&test_db.pool, user_id, course_id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            record.quiz_results.len(),
            1,
            "Only the latest attempt per quiz may be stored"
        );
        assert_eq!(record.quiz_results[0].score, 60);
        assert!(!record.quiz_results[0].passed);
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1"], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        let first = start_progress(&test_db.pool, user_id, course_id)
            .await
            .expect("Failed to start progress");
        let second = start_progress(&test_db.pool, user_id, course_id)
            .await
            .expect("Failed to re-start progress");

        assert_eq!(first.id, second.id);
        assert_eq!(second.completed_sections.len(), 0);
        assert_eq!(second.progress_percentage, 0);
    }

    #[tokio::test]
    async fn test_lazy_record_creation() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1", "s2"], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        // No explicit start; the first section mark creates the record.
        let update = mark_section_complete(&test_db.pool, user_id, course_id, "s1")
            .await
            .expect("Failed to mark section");

        assert_eq!(update.progress.progress_percentage, 50);
        assert_eq!(update.progress.user_id, user_id);
    }

    #[tokio::test]
    async fn test_unknown_course_is_not_found() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();

        for result in [
            start_progress(&test_db.pool, user_id, 9999).await.err(),
            mark_section_complete(&test_db.pool, user_id, 9999, "s1")
                .await
                .err(),
            submit_quiz(&test_db.pool, user_id, 9999, "q1", 80).await.err(),
        ] {
            match result {
                Some(AppError::NotFound(_)) => {}
                other => panic!("Expected NotFound, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_quiz_score_out_of_range_rejected() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("HTML Basics", &["s1"], &["q1"])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("HTML Basics").unwrap();

        for score in [-1, 101, 500] {
            let result = submit_quiz(&test_db.pool, user_id, course_id, "q1", score).await;
            match result {
                Err(AppError::Validation(_)) => {}
                other => panic!("Expected Validation error for score {}, got {:?}", score, other),
            }
        }
    }

    #[tokio::test]
    async fn test_zero_section_course_never_completes() {
        let test_db = TestDbBuilder::new()
            .user("learner")
            .course("Empty Course", &[], &[])
            .build()
            .await
            .expect("Failed to build test database");

        let user_id = test_db.user_id("learner").unwrap();
        let course_id = test_db.course_id("Empty Course").unwrap();

        let update = mark_section_complete(&test_db.pool, user_id, course_id, "stray")
            .await
            .expect("Failed to mark section");

        assert_eq!(update.progress.progress_percentage, 0);
        assert!(!update.progress.is_completed);
        assert!(update.badge_earned.is_none());
    }
}
