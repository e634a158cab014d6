//! Group access selection over the course → module → lesson tree.
//!
//! Course toggles overwrite every descendant. Module and lesson toggles only
//! flip their own entry, so a module can be selected while its course is not.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Course;
use crate::model::ids::{CourseId, LessonId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PermissionError {
    #[error("unknown access kind: {0}")]
    UnknownAccessKind(String),
}

/// Level of the catalog tree an access entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessKind {
    Course,
    Module,
    Lesson,
}

impl AccessKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Course => "course",
            Self::Module => "module",
            Self::Lesson => "lesson",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessKind {
    type Err = PermissionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "course" => Ok(Self::Course),
            "module" => Ok(Self::Module),
            "lesson" => Ok(Self::Lesson),
            other => Err(PermissionError::UnknownAccessKind(other.to_owned())),
        }
    }
}

/// Flat row used to persist a selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    pub kind: AccessKind,
    pub id: String,
    pub selected: bool,
}

/// Which courses, modules and lessons a group may access.
///
/// Entries that were never toggled read as unselected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSelection {
    #[serde(default)]
    courses: BTreeMap<CourseId, bool>,
    #[serde(default)]
    modules: BTreeMap<ModuleId, bool>,
    #[serde(default)]
    lessons: BTreeMap<LessonId, bool>,
}

impl PermissionSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip the course flag and force all of its modules and lessons to the
    /// new value. Returns the new value.
    pub fn toggle_course(&mut self, course: &Course) -> bool {
        let selected = !self.is_course_selected(&course.id);
        self.set_course(course, selected);
        selected
    }

    /// Set the course flag and overwrite every descendant with it.
    pub fn set_course(&mut self, course: &Course, selected: bool) {
        self.courses.insert(course.id.clone(), selected);
        for module in &course.modules {
            self.modules.insert(module.id.clone(), selected);
            for lesson in &module.lessons {
                self.lessons.insert(lesson.id.clone(), selected);
            }
        }
    }

    /// Flip a single module. Lessons and the parent course are left alone.
    pub fn toggle_module(&mut self, id: &ModuleId) -> bool {
        let selected = !self.is_module_selected(id);
        self.modules.insert(id.clone(), selected);
        selected
    }

    /// Flip a single lesson.
    pub fn toggle_lesson(&mut self, id: &LessonId) -> bool {
        let selected = !self.is_lesson_selected(id);
        self.lessons.insert(id.clone(), selected);
        selected
    }

    #[must_use]
    pub fn is_course_selected(&self, id: &CourseId) -> bool {
        self.courses.get(id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn is_module_selected(&self, id: &ModuleId) -> bool {
        self.modules.get(id).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn is_lesson_selected(&self, id: &LessonId) -> bool {
        self.lessons.get(id).copied().unwrap_or(false)
    }

    pub fn selected_courses(&self) -> impl Iterator<Item = &CourseId> {
        self.courses.iter().filter(|(_, on)| **on).map(|(id, _)| id)
    }

    /// Access is decided per lesson flag only.
    #[must_use]
    pub fn grants_lesson(&self, id: &LessonId) -> bool {
        self.is_lesson_selected(id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.courses.is_empty() && self.modules.is_empty() && self.lessons.is_empty()
    }

    /// Flatten into rows, courses first, each level in id order.
    #[must_use]
    pub fn entries(&self) -> Vec<AccessEntry> {
        let courses = self.courses.iter().map(|(id, on)| AccessEntry {
            kind: AccessKind::Course,
            id: id.as_str().to_owned(),
            selected: *on,
        });
        let modules = self.modules.iter().map(|(id, on)| AccessEntry {
            kind: AccessKind::Module,
            id: id.as_str().to_owned(),
            selected: *on,
        });
        let lessons = self.lessons.iter().map(|(id, on)| AccessEntry {
            kind: AccessKind::Lesson,
            id: id.as_str().to_owned(),
            selected: *on,
        });
        courses.chain(modules).chain(lessons).collect()
    }

    /// Rebuild from persisted rows. Later rows win on duplicates.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = AccessEntry>) -> Self {
        let mut selection = Self::default();
        for entry in entries {
            match entry.kind {
                AccessKind::Course => {
                    selection
                        .courses
                        .insert(CourseId::new(entry.id), entry.selected);
                }
                AccessKind::Module => {
                    selection
                        .modules
                        .insert(ModuleId::new(entry.id), entry.selected);
                }
                AccessKind::Lesson => {
                    selection
                        .lessons
                        .insert(LessonId::new(entry.id), entry.selected);
                }
            }
        }
        selection
    }
}

//
// ─── EXPANSION ─────────────────────────────────────────────────────────────────
//

/// Tree node whose expand/collapse state can be toggled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutlineNode {
    Course(CourseId),
    Module(ModuleId),
}

/// Expand/collapse state of the permission tree. View-only, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: BTreeSet<OutlineNode>,
}

impl ExpansionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new expanded state.
    pub fn toggle(&mut self, node: OutlineNode) -> bool {
        if self.expanded.remove(&node) {
            false
        } else {
            self.expanded.insert(node);
            true
        }
    }

    #[must_use]
    pub fn is_expanded(&self, node: &OutlineNode) -> bool {
        self.expanded.contains(node)
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::catalog::tests::two_by_two_course;

    fn all_descendants(course: &Course) -> (Vec<ModuleId>, Vec<LessonId>) {
        let modules = course.modules.iter().map(|m| m.id.clone()).collect();
        let lessons = course.lessons().map(|(_, l)| l.id.clone()).collect();
        (modules, lessons)
    }

    #[test]
    fn course_toggle_selects_then_clears_every_descendant() {
        let course = two_by_two_course();
        let (modules, lessons) = all_descendants(&course);
        let mut selection = PermissionSelection::new();

        assert!(selection.toggle_course(&course));
        assert!(selection.is_course_selected(&course.id));
        assert_eq!(modules.len(), 2);
        assert_eq!(lessons.len(), 4);
        assert!(modules.iter().all(|m| selection.is_module_selected(m)));
        assert!(lessons.iter().all(|l| selection.is_lesson_selected(l)));

        assert!(!selection.toggle_course(&course));
        assert!(!selection.is_course_selected(&course.id));
        assert!(modules.iter().all(|m| !selection.is_module_selected(m)));
        assert!(lessons.iter().all(|l| !selection.is_lesson_selected(l)));
    }

    #[test]
    fn course_toggle_overwrites_manual_lesson_edits() {
        let course = two_by_two_course();
        let mut selection = PermissionSelection::new();
        selection.toggle_course(&course);
        selection.toggle_lesson(&LessonId::new("1-2-2"));
        assert!(!selection.is_lesson_selected(&LessonId::new("1-2-2")));

        selection.set_course(&course, true);
        assert!(selection.is_lesson_selected(&LessonId::new("1-2-2")));
    }

    #[test]
    fn module_toggle_does_not_touch_course_or_lessons() {
        let course = two_by_two_course();
        let mut selection = PermissionSelection::new();

        assert!(selection.toggle_module(&ModuleId::new("1-1")));

        assert!(!selection.is_course_selected(&course.id));
        assert!(!selection.is_lesson_selected(&LessonId::new("1-1-1")));
        assert!(!selection.is_module_selected(&ModuleId::new("1-2")));
    }

    #[test]
    fn lesson_toggle_is_isolated() {
        let mut selection = PermissionSelection::new();
        selection.toggle_lesson(&LessonId::new("1-1-1"));
        assert!(selection.grants_lesson(&LessonId::new("1-1-1")));
        assert!(!selection.grants_lesson(&LessonId::new("1-1-2")));
        assert!(!selection.is_module_selected(&ModuleId::new("1-1")));
    }

    #[test]
    fn entries_rebuild_the_same_selection() {
        let course = two_by_two_course();
        let mut selection = PermissionSelection::new();
        selection.toggle_course(&course);
        selection.toggle_lesson(&LessonId::new("1-1-2"));

        let entries = selection.entries();
        assert_eq!(entries.len(), 7);
        assert_eq!(entries[0].kind, AccessKind::Course);

        assert_eq!(PermissionSelection::from_entries(entries), selection);
    }

    #[test]
    fn access_kind_parses_known_names_only() {
        assert_eq!("module".parse::<AccessKind>().unwrap(), AccessKind::Module);
        assert_eq!(
            "chapter".parse::<AccessKind>().unwrap_err(),
            PermissionError::UnknownAccessKind("chapter".into())
        );
    }

    #[test]
    fn expansion_is_independent_of_selection() {
        let mut expansion = ExpansionState::new();
        let node = OutlineNode::Course(CourseId::new("1"));
        assert!(expansion.toggle(node.clone()));
        assert!(expansion.is_expanded(&node));
        assert!(!expansion.is_expanded(&OutlineNode::Module(ModuleId::new("1-1"))));
        assert!(!expansion.toggle(node.clone()));
        assert!(!expansion.is_expanded(&node));
    }
}
