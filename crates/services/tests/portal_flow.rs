use std::sync::Arc;

use ead_core::model::{CourseId, Feature, GroupDraft, LessonId, NotificationKind, UserId};
use ead_core::playback::PlayerState;
use ead_core::time::fixed_now;
use services::catalog::demo_catalog;
use services::playback::{ChannelNavigator, NavigationRequest, VideoPlayer};
use services::{CertificateOutcome, Clock, PortalConfig, PortalServices};

/// Player parked at the start of the media; only state changes matter here.
struct ParkedPlayer;

impl VideoPlayer for ParkedPlayer {
    fn is_ready(&self) -> bool {
        true
    }

    fn current_time(&self) -> Option<f64> {
        Some(0.0)
    }

    fn duration(&self) -> Option<f64> {
        Some(900.0)
    }

    fn seek_to(&self, _seconds: f64) {}
}

async fn watch_to_end(portal: &PortalServices, user: &UserId, course: &str, lesson: &str) {
    let (navigator, _requests) = ChannelNavigator::new();
    let session = portal
        .open_lesson(
            user.clone(),
            &CourseId::new(course),
            &LessonId::new(lesson),
            Arc::new(ParkedPlayer),
            Arc::new(navigator),
        )
        .await
        .unwrap();
    session.player_state_changed(PlayerState::Playing).unwrap();
    session.player_state_changed(PlayerState::Ended).unwrap();
    let progress = session.close().await.unwrap();
    assert!(progress.is_completed());
}

#[tokio::test]
async fn watching_a_course_earns_a_certificate() {
    let portal = PortalServices::in_memory(demo_catalog().unwrap(), Clock::fixed(fixed_now()));
    let user = UserId::new("ana");
    let course = CourseId::new("2");

    watch_to_end(&portal, &user, "2", "2-1-1").await;

    let completion = portal
        .progress()
        .course_completion(&user, &course)
        .await
        .unwrap();
    assert_eq!(completion.percent(), 100);

    let outcome = portal
        .certificates()
        .issue_if_eligible(&user, "Ana Lima", &course)
        .await
        .unwrap();
    assert!(matches!(outcome, CertificateOutcome::Issued(_)));

    let mut inbox = portal.notifications(user.clone()).await.unwrap();
    assert_eq!(inbox.unread_count(), 1);
    assert_eq!(
        inbox.inbox().items()[0].kind(),
        NotificationKind::CourseCompleted
    );
    assert_eq!(inbox.mark_all_read().await.unwrap(), 1);
    assert_eq!(
        portal.notifications(user).await.unwrap().unread_count(),
        0
    );
}

#[tokio::test]
async fn exam_request_follows_the_module_lessons() {
    let portal = PortalServices::in_memory(demo_catalog().unwrap(), Clock::fixed(fixed_now()));
    let user = UserId::new("ana");
    let (course, module) = (CourseId::new("1"), ead_core::model::ModuleId::new("1-1"));
    let (navigator, mut requests) = ChannelNavigator::new();

    watch_to_end(&portal, &user, "1", "1-1-1").await;
    assert!(
        portal
            .exams()
            .request_exam(&user, &course, &module, &navigator)
            .await
            .is_err()
    );

    watch_to_end(&portal, &user, "1", "1-1-2").await;
    portal
        .exams()
        .request_exam(&user, &course, &module, &navigator)
        .await
        .unwrap();
    assert_eq!(
        requests.try_recv().unwrap(),
        NavigationRequest::Exam {
            course_id: course,
            module_id: module,
        }
    );
}

#[tokio::test]
async fn sqlite_portal_keeps_groups_and_progress() {
    let config = PortalConfig {
        db_url: "sqlite:file:portal_flow?mode=memory&cache=shared".to_owned(),
        ..PortalConfig::default()
    };
    let portal = PortalServices::new_sqlite(&config, Clock::fixed(fixed_now()))
        .await
        .unwrap();
    let user = UserId::new("ana");

    let mut draft = GroupDraft::new("Equipe de Campo");
    draft.features.insert(Feature::Ranking);
    let catalog = portal.catalog();
    let first_course = &catalog.courses()[0];
    draft.access.set_course(first_course, true);
    let group = portal.groups().create(draft).await.unwrap();

    let stored = portal.groups().get(group.id()).await.unwrap();
    assert!(stored.has_feature(Feature::Ranking));
    assert!(stored.access().grants_lesson(&LessonId::new("1-2-1")));

    watch_to_end(&portal, &user, "2", "2-1-1").await;
    assert!(
        portal
            .progress()
            .is_lesson_completed(&user, &CourseId::new("2"), &LessonId::new("2-1-1"))
            .await
            .unwrap()
    );
}
