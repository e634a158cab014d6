use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::NotificationId;
use crate::validation::{FieldRule, ValidationErrors, validate_fields};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotificationError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("unknown notification kind: {0}")]
    UnknownKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CourseCompleted,
    NewCourse,
    Achievement,
    News,
}

impl NotificationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CourseCompleted => "course_completed",
            Self::NewCourse => "new_course",
            Self::Achievement => "achievement",
            Self::News => "news",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationKind {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course_completed" => Ok(Self::CourseCompleted),
            "new_course" => Ok(Self::NewCourse),
            "achievement" => Ok(Self::Achievement),
            "news" => Ok(Self::News),
            other => Err(NotificationError::UnknownKind(other.to_owned())),
        }
    }
}

const NOTIFICATION_RULES: &[FieldRule] = &[
    FieldRule::required("title").max_len(120),
    FieldRule::required("message").max_len(1000),
    // in-app route, e.g. `/courses/1`
    FieldRule::optional("link").pattern(r"^/[A-Za-z0-9_\-/]*$"),
];

/// Unvalidated notification content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDraft {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl NotificationDraft {
    #[must_use]
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            link: None,
            metadata: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// # Errors
    ///
    /// Returns every field that breaks the notification rules.
    pub fn validate(&self) -> Result<(), NotificationError> {
        validate_fields(
            NOTIFICATION_RULES,
            &[
                ("title", Some(self.title.as_str())),
                ("message", Some(self.message.as_str())),
                ("link", self.link.as_deref()),
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    id: NotificationId,
    kind: NotificationKind,
    title: String,
    message: String,
    link: Option<String>,
    read: bool,
    created_at: DateTime<Utc>,
    metadata: BTreeMap<String, String>,
}

impl Notification {
    /// Creates an unread notification.
    ///
    /// # Errors
    ///
    /// Returns `NotificationError::Validation` if the draft breaks the rules.
    pub fn new(
        id: NotificationId,
        draft: NotificationDraft,
        created_at: DateTime<Utc>,
    ) -> Result<Self, NotificationError> {
        draft.validate()?;
        Ok(Self {
            id,
            kind: draft.kind,
            title: draft.title.trim().to_owned(),
            message: draft.message.trim().to_owned(),
            link: draft
                .link
                .map(|l| l.trim().to_owned())
                .filter(|l| !l.is_empty()),
            read: false,
            created_at,
            metadata: draft.metadata,
        })
    }

    /// Rehydrate a stored notification without re-validating its text.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: NotificationId,
        kind: NotificationKind,
        title: String,
        message: String,
        link: Option<String>,
        read: bool,
        created_at: DateTime<Utc>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            kind,
            title,
            message,
            link,
            read,
            created_at,
            metadata,
        }
    }

    #[must_use]
    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    #[must_use]
    pub fn is_read(&self) -> bool {
        self.read
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

//
// ─── INBOX ─────────────────────────────────────────────────────────────────────
//

/// A learner's notifications, newest first.
///
/// The unread count is always derived from the items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationInbox {
    items: Vec<Notification>,
}

impl NotificationInbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored items in any order.
    #[must_use]
    pub fn from_items(mut items: Vec<Notification>) -> Self {
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { items }
    }

    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: &NotificationId) -> Option<&Notification> {
        self.items.iter().find(|n| &n.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        self.items.iter().filter(|n| !n.read).count()
    }

    /// Put `notification` on top. An item with the same id is replaced.
    pub fn add(&mut self, notification: Notification) {
        self.items.retain(|n| n.id != notification.id);
        self.items.insert(0, notification);
    }

    /// Returns `true` if the item existed and was unread.
    pub fn mark_read(&mut self, id: &NotificationId) -> bool {
        match self.items.iter_mut().find(|n| &n.id == id) {
            Some(n) if !n.read => {
                n.read = true;
                true
            }
            _ => false,
        }
    }

    /// Returns how many items changed.
    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.items.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        changed
    }

    pub fn remove(&mut self, id: &NotificationId) -> Option<Notification> {
        let index = self.items.iter().position(|n| &n.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use crate::validation::FieldViolation;

    fn notification(id: &str, minutes: i64) -> Notification {
        Notification::new(
            NotificationId::new(id),
            NotificationDraft::new(NotificationKind::News, format!("Aviso {id}"), "Conteúdo"),
            fixed_now() + chrono::Duration::minutes(minutes),
        )
        .unwrap()
    }

    #[test]
    fn draft_link_must_be_an_app_route() {
        let draft = NotificationDraft::new(NotificationKind::NewCourse, "Novo curso", "Confira")
            .with_link("https://evil.example");
        let Err(NotificationError::Validation(errors)) = draft.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.violation_for("link"),
            Some(&FieldViolation::PatternMismatch)
        );

        NotificationDraft::new(NotificationKind::NewCourse, "Novo curso", "Confira")
            .with_link("/courses/2")
            .validate()
            .unwrap();
    }

    #[test]
    fn blank_title_and_message_are_reported_together() {
        let draft = NotificationDraft::new(NotificationKind::News, " ", "");
        let Err(NotificationError::Validation(errors)) = draft.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.errors().len(), 2);
    }

    #[test]
    fn unread_count_tracks_items() {
        let mut inbox = NotificationInbox::new();
        inbox.add(notification("a", 0));
        inbox.add(notification("b", 1));
        assert_eq!(inbox.items()[0].id(), &NotificationId::new("b"));
        assert_eq!(inbox.unread_count(), 2);

        assert!(inbox.mark_read(&NotificationId::new("a")));
        assert!(!inbox.mark_read(&NotificationId::new("a")));
        assert!(!inbox.mark_read(&NotificationId::new("missing")));
        assert_eq!(inbox.unread_count(), 1);

        // removing a read item must not disturb the count
        inbox.remove(&NotificationId::new("a")).unwrap();
        assert_eq!(inbox.unread_count(), 1);

        assert_eq!(inbox.mark_all_read(), 1);
        assert_eq!(inbox.unread_count(), 0);

        inbox.clear();
        assert!(inbox.is_empty());
    }

    #[test]
    fn from_items_orders_newest_first() {
        let inbox = NotificationInbox::from_items(vec![
            notification("old", 0),
            notification("new", 5),
            notification("mid", 2),
        ]);
        let ids: Vec<_> = inbox.items().iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, ["new", "mid", "old"]);
    }

    #[test]
    fn re_adding_replaces_existing_item() {
        let mut inbox = NotificationInbox::new();
        inbox.add(notification("a", 0));
        inbox.add(notification("a", 1));
        assert_eq!(inbox.len(), 1);
    }
}
