use std::sync::Arc;

use ead_core::model::{
    Catalog, CourseId, Feature, Group, GroupDraft, GroupId, LessonId, ModuleId,
};
use ead_core::permissions::{ExpansionState, OutlineNode, PermissionSelection};
use storage::repository::{GroupRepository, StorageError};
use tracing::info;

use crate::Clock;
use crate::error::GroupServiceError;

/// Learner groups and the content they can access.
#[derive(Clone)]
pub struct GroupService {
    clock: Clock,
    catalog: Arc<Catalog>,
    groups: Arc<dyn GroupRepository>,
}

impl GroupService {
    #[must_use]
    pub fn new(clock: Clock, catalog: Arc<Catalog>, groups: Arc<dyn GroupRepository>) -> Self {
        Self {
            clock,
            catalog,
            groups,
        }
    }

    fn check_access(&self, access: &PermissionSelection) -> Result<(), GroupServiceError> {
        match access
            .selected_courses()
            .find(|id| self.catalog.course(id).is_none())
        {
            Some(unknown) => Err(GroupServiceError::UnknownCourse(unknown.clone())),
            None => Ok(()),
        }
    }

    /// # Errors
    ///
    /// Returns `GroupServiceError::Group` for invalid drafts,
    /// `UnknownCourse` for access to courses outside the catalog, or `Storage`.
    pub async fn create(&self, draft: GroupDraft) -> Result<Group, GroupServiceError> {
        self.check_access(&draft.access)?;
        let group = Group::create(GroupId::generate(), draft, self.clock.now())?;
        self.groups.upsert_group(&group).await?;
        info!(group = %group.id(), name = group.name(), "group created");
        Ok(group)
    }

    /// # Errors
    ///
    /// Returns `GroupServiceError::NotFound` for unknown ids, plus the
    /// errors of [`GroupService::create`].
    pub async fn update(&self, id: &GroupId, draft: GroupDraft) -> Result<Group, GroupServiceError> {
        self.check_access(&draft.access)?;
        let mut group = self.get(id).await?;
        group.update(draft, self.clock.now())?;
        self.groups.upsert_group(&group).await?;
        info!(group = %group.id(), "group updated");
        Ok(group)
    }

    /// # Errors
    ///
    /// Returns `GroupServiceError::NotFound` for unknown ids.
    pub async fn delete(&self, id: &GroupId) -> Result<(), GroupServiceError> {
        match self.groups.delete_group(id).await {
            Ok(()) => {
                info!(group = %id, "group deleted");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(GroupServiceError::NotFound(id.clone())),
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `GroupServiceError::NotFound` for unknown ids.
    pub async fn get(&self, id: &GroupId) -> Result<Group, GroupServiceError> {
        self.groups
            .get_group(id)
            .await?
            .ok_or_else(|| GroupServiceError::NotFound(id.clone()))
    }

    /// All groups ordered by name.
    ///
    /// # Errors
    ///
    /// Returns `GroupServiceError::Storage` if the lookup fails.
    pub async fn list(&self) -> Result<Vec<Group>, GroupServiceError> {
        Ok(self.groups.list_groups().await?)
    }

    #[must_use]
    pub fn new_editor(&self) -> GroupEditor {
        GroupEditor::new(None, GroupDraft::default(), Arc::clone(&self.catalog))
    }

    /// Open an editor prefilled with a stored group.
    ///
    /// # Errors
    ///
    /// Returns `GroupServiceError::NotFound` for unknown ids.
    pub async fn edit(&self, id: &GroupId) -> Result<GroupEditor, GroupServiceError> {
        let group = self.get(id).await?;
        Ok(GroupEditor::new(
            Some(id.clone()),
            group.to_draft(),
            Arc::clone(&self.catalog),
        ))
    }

    /// Create or update from an editing session.
    ///
    /// # Errors
    ///
    /// Same as [`GroupService::create`] and [`GroupService::update`].
    pub async fn save(&self, editor: &GroupEditor) -> Result<Group, GroupServiceError> {
        match &editor.group_id {
            Some(id) => self.update(id, editor.draft.clone()).await,
            None => self.create(editor.draft.clone()).await,
        }
    }
}

//
// ─── EDITOR ────────────────────────────────────────────────────────────────────
//

/// One group form: the draft with its permission tree and the tree's
/// expand/collapse state.
#[derive(Debug, Clone)]
pub struct GroupEditor {
    group_id: Option<GroupId>,
    draft: GroupDraft,
    expansion: ExpansionState,
    catalog: Arc<Catalog>,
}

impl GroupEditor {
    fn new(group_id: Option<GroupId>, draft: GroupDraft, catalog: Arc<Catalog>) -> Self {
        Self {
            group_id,
            draft,
            expansion: ExpansionState::new(),
            catalog,
        }
    }

    #[must_use]
    pub fn group_id(&self) -> Option<&GroupId> {
        self.group_id.as_ref()
    }

    #[must_use]
    pub fn draft(&self) -> &GroupDraft {
        &self.draft
    }

    #[must_use]
    pub fn access(&self) -> &PermissionSelection {
        &self.draft.access
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    /// Returns whether the feature is now enabled.
    pub fn toggle_feature(&mut self, feature: Feature) -> bool {
        if self.draft.features.remove(&feature) {
            false
        } else {
            self.draft.features.insert(feature);
            true
        }
    }

    /// Flip a course and overwrite all of its modules and lessons.
    ///
    /// # Errors
    ///
    /// Returns `GroupServiceError::UnknownCourse` if the catalog lacks `id`.
    pub fn toggle_course(&mut self, id: &CourseId) -> Result<bool, GroupServiceError> {
        let course = self
            .catalog
            .course(id)
            .ok_or_else(|| GroupServiceError::UnknownCourse(id.clone()))?;
        Ok(self.draft.access.toggle_course(course))
    }

    pub fn toggle_module(&mut self, id: &ModuleId) -> bool {
        self.draft.access.toggle_module(id)
    }

    pub fn toggle_lesson(&mut self, id: &LessonId) -> bool {
        self.draft.access.toggle_lesson(id)
    }

    pub fn toggle_expanded(&mut self, node: OutlineNode) -> bool {
        self.expansion.toggle(node)
    }

    #[must_use]
    pub fn is_expanded(&self, node: &OutlineNode) -> bool {
        self.expansion.is_expanded(node)
    }
}
