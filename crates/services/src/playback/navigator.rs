use ead_core::model::{CourseId, LessonLocation, ModuleId};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Route change requested by the portal core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationRequest {
    Lesson(LessonLocation),
    Exam {
        course_id: CourseId,
        module_id: ModuleId,
    },
}

/// Consumer of navigation requests, usually the router.
pub trait Navigator: Send + Sync {
    fn navigate(&self, request: NavigationRequest);
}

/// Forwards requests into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<NavigationRequest>,
}

impl ChannelNavigator {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<NavigationRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate(&self, request: NavigationRequest) {
        if let Err(err) = self.tx.send(request) {
            debug!(request = ?err.0, "navigation dropped, receiver is gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ead_core::model::LessonId;

    #[test]
    fn requests_arrive_in_order() {
        let (navigator, mut rx) = ChannelNavigator::new();
        let lesson = LessonLocation::new(
            CourseId::new("1"),
            ModuleId::new("1-1"),
            LessonId::new("1-1-2"),
        );
        navigator.navigate(NavigationRequest::Lesson(lesson.clone()));
        navigator.navigate(NavigationRequest::Exam {
            course_id: CourseId::new("1"),
            module_id: ModuleId::new("1-1"),
        });

        assert_eq!(rx.try_recv().unwrap(), NavigationRequest::Lesson(lesson));
        assert!(matches!(
            rx.try_recv().unwrap(),
            NavigationRequest::Exam { .. }
        ));
    }

    #[test]
    fn requests_serialize_with_a_kind_tag() {
        let exam = NavigationRequest::Exam {
            course_id: CourseId::new("1"),
            module_id: ModuleId::new("1-1"),
        };
        assert_eq!(
            serde_json::to_value(&exam).unwrap(),
            serde_json::json!({ "kind": "exam", "course_id": "1", "module_id": "1-1" })
        );

        let lesson = NavigationRequest::Lesson(LessonLocation::new(
            CourseId::new("1"),
            ModuleId::new("1-2"),
            LessonId::new("1-2-1"),
        ));
        assert_eq!(
            serde_json::to_value(&lesson).unwrap()["lesson_id"],
            "1-2-1"
        );
    }

    #[test]
    fn closed_receiver_is_tolerated() {
        let (navigator, rx) = ChannelNavigator::new();
        drop(rx);
        navigator.navigate(NavigationRequest::Exam {
            course_id: CourseId::new("1"),
            module_id: ModuleId::new("1-1"),
        });
    }
}
