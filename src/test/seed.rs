#[cfg(test)]
mod tests {
    use crate::{
        auth::{AccessDecision, AppRoute, Role},
        progression::{FIRST_PROFILE_BADGE, ONBOARDING_BONUS_POINTS},
        seed::provision_demo_directory,
        test::test_db::TestDbBuilder,
    };

    #[tokio::test]
    async fn test_demo_directory_is_provisioned_once() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");

        let first = provision_demo_directory(&test_db.platform)
            .await
            .expect("Failed to seed");
        assert_eq!(first.len(), 7);

        let second = provision_demo_directory(&test_db.platform)
            .await
            .expect("Reseeding should succeed");
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_demo_cast_lands_where_expected() {
        let test_db = TestDbBuilder::new()
            .build()
            .await
            .expect("Failed to build test database");
        provision_demo_directory(&test_db.platform)
            .await
            .expect("Failed to seed");

        let sessions = &test_db.platform.sessions;

        let john = sessions
            .authenticate("john.doe@student.greenwood.edu", "student123")
            .await
            .expect("Failed to authenticate");
        assert!(john.identity.onboarding_complete);
        assert_eq!(
            test_db.platform.decide("/student/achievements").await,
            AccessDecision::Allow
        );
        let snapshot = test_db
            .platform
            .progression
            .snapshot(john.identity.id)
            .await
            .expect("Failed to load progression");
        assert_eq!(snapshot.points, ONBOARDING_BONUS_POINTS);
        assert!(snapshot.has_badge(FIRST_PROFILE_BADGE));

        sessions
            .authenticate("emma.wilson@student.greenwood.edu", "student456")
            .await
            .expect("Failed to authenticate");
        assert_eq!(
            test_db.platform.decide("/student/dashboard").await,
            AccessDecision::RedirectToOnboarding
        );

        let teacher = sessions
            .authenticate("sarah.johnson@greenwood.edu", "teacher123")
            .await
            .expect("Failed to authenticate");
        assert_eq!(teacher.identity.role, Role::Teacher);
        assert_eq!(teacher.identity.class_id.as_deref(), Some("class-5a"));
        assert_eq!(
            test_db.platform.decide("/admin/dashboard").await,
            AccessDecision::RedirectToDefault(AppRoute::TeacherDashboard)
        );
    }
}
