use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::exam::Exam;
use crate::model::ids::{CourseId, LessonId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("duplicate course id: {0}")]
    DuplicateCourse(CourseId),

    #[error("duplicate module id: {0}")]
    DuplicateModule(ModuleId),

    #[error("duplicate lesson id: {0}")]
    DuplicateLesson(LessonId),

    #[error("course title cannot be empty: {0}")]
    EmptyCourseTitle(CourseId),
}

//
// ─── CATALOG ENTRIES ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Pdf,
    Doc,
    Other,
}

/// Downloadable support material for a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub title: String,
    pub url: Url,
    pub kind: AttachmentKind,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

fn required_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video_url: Url,
    pub duration_seconds: u32,
    pub order: u32,
    #[serde(default = "required_by_default")]
    pub required_for_completion: bool,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub order: u32,
    #[serde(default = "required_by_default")]
    pub required_for_completion: bool,
    pub lessons: Vec<Lesson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam: Option<Exam>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub level: CourseLevel,
    pub duration_minutes: u32,
    pub instructor: Instructor,
    pub modules: Vec<Module>,
}

impl Course {
    #[must_use]
    pub fn module(&self, id: &ModuleId) -> Option<&Module> {
        self.modules.iter().find(|m| &m.id == id)
    }

    /// Lessons in playback order, paired with their module.
    pub fn lessons(&self) -> impl Iterator<Item = (&Module, &Lesson)> {
        self.modules
            .iter()
            .flat_map(|m| m.lessons.iter().map(move |l| (m, l)))
    }

    /// Lessons that count towards course completion.
    pub fn required_lessons(&self) -> impl Iterator<Item = (&Module, &Lesson)> {
        self.lessons()
            .filter(|(m, l)| m.required_for_completion && l.required_for_completion)
    }

    /// Module exams that must be passed to complete the course.
    pub fn required_exams(&self) -> impl Iterator<Item = (&Module, &Exam)> {
        self.modules
            .iter()
            .filter(|m| m.required_for_completion)
            .filter_map(|m| m.exam.as_ref().map(|e| (m, e)))
    }
}

//
// ─── LOCATIONS ─────────────────────────────────────────────────────────────────
//

/// Fully qualified address of a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LessonLocation {
    pub course_id: CourseId,
    pub module_id: ModuleId,
    pub lesson_id: LessonId,
}

impl LessonLocation {
    #[must_use]
    pub fn new(course_id: CourseId, module_id: ModuleId, lesson_id: LessonId) -> Self {
        Self {
            course_id,
            module_id,
            lesson_id,
        }
    }
}

/// Neighbours of a lesson in course order, crossing module boundaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonNavigation {
    pub previous: Option<LessonLocation>,
    pub next: Option<LessonLocation>,
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Validated, ordered set of courses.
///
/// Modules and lessons are sorted by their `order` field; ids are unique
/// across the whole catalog so permission maps can be keyed by id alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Course>", into = "Vec<Course>")]
pub struct Catalog {
    courses: Vec<Course>,
}

impl Catalog {
    /// Build a catalog from raw courses.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for duplicate ids or blank course titles.
    pub fn new(mut courses: Vec<Course>) -> Result<Self, CatalogError> {
        let mut course_ids = HashSet::new();
        let mut module_ids = HashSet::new();
        let mut lesson_ids = HashSet::new();

        for course in &mut courses {
            if course.title.trim().is_empty() {
                return Err(CatalogError::EmptyCourseTitle(course.id.clone()));
            }
            if !course_ids.insert(course.id.clone()) {
                return Err(CatalogError::DuplicateCourse(course.id.clone()));
            }
            course.modules.sort_by_key(|m| m.order);
            for module in &mut course.modules {
                if !module_ids.insert(module.id.clone()) {
                    return Err(CatalogError::DuplicateModule(module.id.clone()));
                }
                module.lessons.sort_by_key(|l| l.order);
                for lesson in &module.lessons {
                    if !lesson_ids.insert(lesson.id.clone()) {
                        return Err(CatalogError::DuplicateLesson(lesson.id.clone()));
                    }
                }
            }
        }

        Ok(Self { courses })
    }

    #[must_use]
    pub fn courses(&self) -> &[Course] {
        &self.courses
    }

    #[must_use]
    pub fn course(&self, id: &CourseId) -> Option<&Course> {
        self.courses.iter().find(|c| &c.id == id)
    }

    #[must_use]
    pub fn module(&self, course_id: &CourseId, module_id: &ModuleId) -> Option<&Module> {
        self.course(course_id)?.module(module_id)
    }

    #[must_use]
    pub fn lesson(&self, course_id: &CourseId, lesson_id: &LessonId) -> Option<&Lesson> {
        self.course(course_id)?
            .lessons()
            .find(|(_, l)| &l.id == lesson_id)
            .map(|(_, l)| l)
    }

    #[must_use]
    pub fn exam(&self, course_id: &CourseId, module_id: &ModuleId) -> Option<&Exam> {
        self.module(course_id, module_id)?.exam.as_ref()
    }

    #[must_use]
    pub fn lesson_location(
        &self,
        course_id: &CourseId,
        lesson_id: &LessonId,
    ) -> Option<LessonLocation> {
        self.course(course_id)?
            .lessons()
            .find(|(_, l)| &l.id == lesson_id)
            .map(|(m, l)| LessonLocation::new(course_id.clone(), m.id.clone(), l.id.clone()))
    }

    /// Previous and next lessons of `lesson_id` within its course.
    ///
    /// Returns `None` if the course or lesson is unknown.
    #[must_use]
    pub fn lesson_navigation(
        &self,
        course_id: &CourseId,
        lesson_id: &LessonId,
    ) -> Option<LessonNavigation> {
        let course = self.course(course_id)?;
        let ordered: Vec<LessonLocation> = course
            .lessons()
            .map(|(m, l)| LessonLocation::new(course.id.clone(), m.id.clone(), l.id.clone()))
            .collect();
        let index = ordered.iter().position(|loc| &loc.lesson_id == lesson_id)?;

        Some(LessonNavigation {
            previous: index.checked_sub(1).map(|i| ordered[i].clone()),
            next: ordered.get(index + 1).cloned(),
        })
    }
}

impl TryFrom<Vec<Course>> for Catalog {
    type Error = CatalogError;

    fn try_from(courses: Vec<Course>) -> Result<Self, Self::Error> {
        Self::new(courses)
    }
}

impl From<Catalog> for Vec<Course> {
    fn from(catalog: Catalog) -> Self {
        catalog.courses
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
