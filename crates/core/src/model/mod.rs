mod attempt;
pub mod catalog;
mod certificate;
mod exam;
mod group;
pub mod ids;
mod notification;
mod progress;

pub use ids::{
    CertificateId, CourseId, ExamId, GroupId, LessonId, ModuleId, NotificationId, ParseIdError,
    QuestionId, UserId,
};

pub use attempt::{AnswerFeedback, AttemptError, AttemptState, ExamAttempt, ExamResult};
pub use catalog::{
    Attachment, AttachmentKind, Catalog, CatalogError, Course, CourseLevel, Instructor, Lesson,
    LessonLocation, LessonNavigation, Module,
};
pub use certificate::{Certificate, CertificateError};
pub use exam::{Exam, ExamDraft, ExamError, MAX_SCORE, Question, score_answers};
pub use group::{Feature, Group, GroupDraft, GroupError};
pub use notification::{
    Notification, NotificationDraft, NotificationError, NotificationInbox, NotificationKind,
};
pub use progress::{LessonProgress, ProgressError};
