use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::GroupId;
use crate::permissions::PermissionSelection;
use crate::validation::{FieldRule, ValidationErrors, validate_fields};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GroupError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("unknown feature: {0}")]
    UnknownFeature(String),

    #[error("updated_at precedes created_at")]
    InvalidTimestamps,
}

//
// ─── FEATURES ──────────────────────────────────────────────────────────────────
//

/// Optional portal areas a group can be allowed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Certificates,
    Ranking,
    News,
}

impl Feature {
    pub const ALL: [Feature; 3] = [Feature::Certificates, Feature::Ranking, Feature::News];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Certificates => "certificates",
            Self::Ranking => "ranking",
            Self::News => "news",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| GroupError::UnknownFeature(s.to_owned()))
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

const GROUP_RULES: &[FieldRule] = &[
    FieldRule::required("name").min_len(3).max_len(100),
    FieldRule::optional("description").max_len(500),
];

/// Form input for creating or editing a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub features: BTreeSet<Feature>,
    #[serde(default)]
    pub access: PermissionSelection,
}

impl GroupDraft {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// # Errors
    ///
    /// Returns every field that breaks the group rules.
    pub fn validate(&self) -> Result<(), GroupError> {
        validate_fields(
            GROUP_RULES,
            &[
                ("name", Some(self.name.as_str())),
                ("description", Some(self.description.as_str())),
            ],
        )?;
        Ok(())
    }
}

//
// ─── GROUP ─────────────────────────────────────────────────────────────────────
//

/// Learner group with its feature flags and content access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    name: String,
    description: String,
    features: BTreeSet<Feature>,
    access: PermissionSelection,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Group {
    /// Creates a group from a validated draft.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::Validation` if the draft breaks the field rules.
    pub fn create(id: GroupId, draft: GroupDraft, now: DateTime<Utc>) -> Result<Self, GroupError> {
        draft.validate()?;
        Ok(Self {
            id,
            name: draft.name.trim().to_owned(),
            description: draft.description.trim().to_owned(),
            features: draft.features,
            access: draft.access,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rehydrate a group from storage.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::InvalidTimestamps` if `updated_at < created_at`.
    pub fn from_persisted(
        id: GroupId,
        name: String,
        description: String,
        features: BTreeSet<Feature>,
        access: PermissionSelection,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, GroupError> {
        if updated_at < created_at {
            return Err(GroupError::InvalidTimestamps);
        }
        Ok(Self {
            id,
            name,
            description,
            features,
            access,
            created_at,
            updated_at,
        })
    }

    /// Replace every editable field. The group is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns `GroupError::Validation` if the draft breaks the field rules.
    pub fn update(&mut self, draft: GroupDraft, now: DateTime<Utc>) -> Result<(), GroupError> {
        draft.validate()?;
        self.name = draft.name.trim().to_owned();
        self.description = draft.description.trim().to_owned();
        self.features = draft.features;
        self.access = draft.access;
        self.updated_at = now.max(self.created_at);
        Ok(())
    }

    /// Draft prefilled with the current values, for an edit form.
    #[must_use]
    pub fn to_draft(&self) -> GroupDraft {
        GroupDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            features: self.features.clone(),
            access: self.access.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &GroupId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn features(&self) -> &BTreeSet<Feature> {
        &self.features
    }

    #[must_use]
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    #[must_use]
    pub fn access(&self) -> &PermissionSelection {
        &self.access
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
