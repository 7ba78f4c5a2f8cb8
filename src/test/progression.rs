#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use crate::{
        auth::Identity,
        db::{SqliteStore, get_identity},
        error::{AppError, GENERIC_FAILURE_MESSAGE},
        progression::{
            ContentKind, ProgressionEngine, ProgressionSnapshot, QualifyingAction,
            StaticBadgeCatalog,
        },
        test::test_db::{
            BrokenProgression, FlakyProgression, TestDb, TestDbBuilder, day,
        },
    };

    const STUDENT: &str = "john.doe@student.greenwood.edu";

    async fn student_identity() -> (TestDb, Identity) {
        let test_db = TestDbBuilder::new()
            .student(STUDENT)
            .build()
            .await
            .expect("Failed to build test database");
        let id = test_db.identity_id(STUDENT).expect("Student not found");
        let identity = get_identity(&test_db.pool, id)
            .await
            .expect("Failed to load identity")
            .expect("Identity should exist");
        (test_db, identity)
    }

    #[tokio::test]
    async fn test_consecutive_days_build_a_streak_and_a_gap_resets_it() {
        let (test_db, student) = student_identity().await;
        let engine = &test_db.platform.progression;

        let mut snapshot = None;
        for (i, d) in [10, 11, 12].into_iter().enumerate() {
            let action = QualifyingAction::lunch_completed(format!("lunch-{}", i), day(9, d));
            snapshot = Some(
                engine
                    .apply_qualifying_action(&student, &action)
                    .await
                    .expect("Failed to apply action"),
            );
        }
        let snapshot = snapshot.expect("Snapshot after three lunches");
        assert_eq!(snapshot.current_streak, 3);
        assert_eq!(snapshot.longest_streak, 3);
        assert_eq!(snapshot.points, 30);

        let after_gap = engine
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_completed("lunch-3", day(9, 15)),
            )
            .await
            .expect("Failed to apply action");
        assert_eq!(after_gap.current_streak, 1);
        assert_eq!(after_gap.longest_streak, 3);
        assert_eq!(after_gap.points, 40);
        assert_eq!(after_gap.last_qualifying_date, Some(day(9, 15)));
    }

    #[tokio::test]
    async fn test_replayed_action_is_applied_once() {
        let (test_db, student) = student_identity().await;
        let engine = &test_db.platform.progression;
        let action = QualifyingAction::lunch_completed("lunch-2025-09-10", day(9, 10));

        let first = engine
            .apply_qualifying_action(&student, &action)
            .await
            .expect("Failed to apply action");
        let replay = engine
            .apply_qualifying_action(&student, &action)
            .await
            .expect("Replay should succeed");

        assert_eq!(first, replay);
        assert_eq!(replay.points, 10);
        assert_eq!(replay.current_streak, 1);
    }

    #[tokio::test]
    async fn test_same_day_actions_add_points_without_extending_streak() {
        let (test_db, student) = student_identity().await;
        let engine = &test_db.platform.progression;

        engine
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_partial("partial", day(9, 10)),
            )
            .await
            .expect("Failed to apply action");
        let snapshot = engine
            .apply_qualifying_action(
                &student,
                &QualifyingAction::content_completed("quiz-1", day(9, 10), ContentKind::Quiz, 15),
            )
            .await
            .expect("Failed to apply action");

        assert_eq!(snapshot.points, 20);
        assert_eq!(snapshot.current_streak, 1);
    }

    #[tokio::test]
    async fn test_concurrent_actions_are_all_counted() {
        let (test_db, student) = student_identity().await;
        let engine = test_db.platform.progression.clone();

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = engine.clone();
            let student = student.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .apply_qualifying_action(
                        &student,
                        &QualifyingAction::content_completed(
                            format!("article-{}", i),
                            day(9, 10),
                            ContentKind::Article,
                            5,
                        ),
                    )
                    .await
            }));
        }

        for handle in handles {
            handle
                .await
                .expect("Task panicked")
                .expect("Failed to apply action");
        }

        let snapshot = engine
            .snapshot(student.id)
            .await
            .expect("Failed to load progression");
        assert_eq!(snapshot.points, 40);
        assert_eq!(snapshot.current_streak, 1);
    }

    #[tokio::test]
    async fn test_streak_badges_are_granted_once_at_threshold() {
        let (test_db, student) = student_identity().await;
        let engine = &test_db.platform.progression;

        let mut snapshot = None;
        for d in 1..=6 {
            snapshot = Some(
                engine
                    .apply_qualifying_action(
                        &student,
                        &QualifyingAction::lunch_completed(format!("lunch-{}", d), day(9, d)),
                    )
                    .await
                    .expect("Failed to apply action"),
            );
        }
        let six_days = snapshot.expect("Snapshot after six days");
        assert!(six_days.has_badge("lunch-streak-5"));
        assert!(!six_days.has_badge("lunch-streak-7"));
        assert_eq!(six_days.next_streak_milestone(), 7);

        let seven_days = engine
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_completed("lunch-7", day(9, 7)),
            )
            .await
            .expect("Failed to apply action");
        assert!(seven_days.has_badge("lunch-streak-7"));
        assert_eq!(seven_days.next_streak_milestone(), 14);

        let eight_days = engine
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_completed("lunch-8", day(9, 8)),
            )
            .await
            .expect("Failed to apply action");
        assert_eq!(eight_days.badges_earned, seven_days.badges_earned);
        assert_eq!(
            eight_days
                .next_badge(engine.catalog())
                .map(|badge| badge.id),
            Some("lunch-streak-10")
        );
    }

    #[tokio::test]
    async fn test_record_action_requires_a_session() {
        let (test_db, _) = student_identity().await;

        let result = test_db
            .platform
            .record_action(&QualifyingAction::lunch_completed("lunch", day(9, 10)))
            .await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));

        test_db.login(STUDENT).await.expect("Failed to log in");
        let snapshot = test_db
            .platform
            .record_action(&QualifyingAction::vegetarian_lunch_completed(
                "lunch",
                day(9, 10),
            ))
            .await
            .expect("Failed to record action");
        assert_eq!(snapshot.points, 10);
    }

    #[tokio::test]
    async fn test_conflicting_saves_are_retried() {
        let (test_db, student) = student_identity().await;
        let flaky = Arc::new(FlakyProgression::new(
            SqliteStore::new(test_db.pool.clone()),
            2,
        ));
        let engine = ProgressionEngine::new(flaky.clone(), Arc::new(StaticBadgeCatalog));

        let snapshot = engine
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_completed("lunch", day(9, 10)),
            )
            .await
            .expect("Retries should absorb the conflicts");

        assert_eq!(snapshot.points, 10);
        assert_eq!(flaky.attempts(), 3);
    }

    #[tokio::test]
    async fn test_endless_conflicts_surface_as_persistence_failure() {
        let (test_db, student) = student_identity().await;
        let flaky = Arc::new(FlakyProgression::new(
            SqliteStore::new(test_db.pool.clone()),
            usize::MAX,
        ));
        let engine = ProgressionEngine::new(flaky.clone(), Arc::new(StaticBadgeCatalog));

        let err = engine
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_completed("lunch", day(9, 10)),
            )
            .await
            .expect_err("Conflicts never clear");

        assert!(matches!(err, AppError::PersistenceFailure(_)));
        assert_eq!(err.user_message(), GENERIC_FAILURE_MESSAGE);
        assert_eq!(flaky.attempts(), 5);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_progression_unchanged() {
        let (test_db, student) = student_identity().await;
        let healthy = &test_db.platform.progression;

        healthy
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_completed("lunch-1", day(9, 10)),
            )
            .await
            .expect("Failed to apply action");
        let before = healthy
            .snapshot(student.id)
            .await
            .expect("Failed to load progression");

        let broken = ProgressionEngine::new(
            Arc::new(BrokenProgression {
                inner: SqliteStore::new(test_db.pool.clone()),
            }),
            Arc::new(StaticBadgeCatalog),
        );
        let result = broken
            .apply_qualifying_action(
                &student,
                &QualifyingAction::lunch_completed("lunch-2", day(9, 11)),
            )
            .await;
        assert!(matches!(result, Err(AppError::PersistenceFailure(_))));

        let after = healthy
            .snapshot(student.id)
            .await
            .expect("Failed to load progression");
        assert_eq!(before, after);
    }

    /// Applies `threshold` actions built by `make` on a single day, so no
    /// streak badge interferes, and checks `badge` appears exactly on the last.
    async fn assert_granted_at_threshold<F>(badge: &str, threshold: u32, make: F)
    where
        F: Fn(String) -> QualifyingAction,
    {
        let (test_db, student) = student_identity().await;
        let engine = &test_db.platform.progression;

        let mut before = ProgressionSnapshot::default();
        for i in 1..threshold {
            before = engine
                .apply_qualifying_action(&student, &make(format!("{}-{}", badge, i)))
                .await
                .expect("Failed to apply action");
        }
        assert!(
            !before.has_badge(badge),
            "{} granted after {} actions",
            badge,
            threshold - 1
        );

        let last = make(format!("{}-{}", badge, threshold));
        let after = engine
            .apply_qualifying_action(&student, &last)
            .await
            .expect("Failed to apply action");
        let unlocked: BTreeSet<String> = after
            .badges_earned
            .difference(&before.badges_earned)
            .cloned()
            .collect();
        assert_eq!(unlocked, BTreeSet::from([badge.to_string()]));

        let replay = engine
            .apply_qualifying_action(&student, &last)
            .await
            .expect("Replay should succeed");
        assert_eq!(replay, after);
    }

    #[tokio::test]
    async fn test_healthy_eater_is_granted_on_the_fiftieth_lunch() {
        assert_granted_at_threshold("healthy-eater", 50, |id| {
            QualifyingAction::lunch_completed(id, day(10, 1))
        })
        .await;
    }

    #[tokio::test]
    async fn test_quiz_master_is_granted_on_the_tenth_quiz() {
        assert_granted_at_threshold("quiz-master", 10, |id| {
            QualifyingAction::content_completed(id, day(10, 1), ContentKind::Quiz, 15)
        })
        .await;
    }

    #[tokio::test]
    async fn test_veggie_lover_is_granted_on_the_twentieth_vegetarian_lunch() {
        assert_granted_at_threshold("veggie-lover", 20, |id| {
            QualifyingAction::vegetarian_lunch_completed(id, day(10, 1))
        })
        .await;
    }

    #[tokio::test]
    async fn test_content_explorer_is_granted_on_the_fifteenth_article() {
        assert_granted_at_threshold("content-explorer", 15, |id| {
            QualifyingAction::content_completed(id, day(10, 1), ContentKind::Article, 5)
        })
        .await;
    }
}
