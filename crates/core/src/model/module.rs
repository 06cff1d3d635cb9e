use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{ModuleId, SectionId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module title cannot be empty")]
    EmptyTitle,

    #[error("module order must be >= 0")]
    NegativeOrder,

    #[error("estimated duration must be >= 0 minutes")]
    NegativeDuration,
}

/// A sequence of pages an employee works through.
///
/// `section_id` is `None` while the module is unassigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingModule {
    pub id: ModuleId,
    pub section_id: Option<SectionId>,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub estimated_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModuleDraft {
    pub section_id: Option<SectionId>,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub estimated_minutes: Option<i32>,
}

impl ModuleDraft {
    /// Trim and check the draft.
    ///
    /// Section existence is a storage concern and is not checked here.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError` on blank title, negative order or duration.
    pub fn validate(self) -> Result<Self, ModuleError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(ModuleError::EmptyTitle);
        }
        if self.order < 0 {
            return Err(ModuleError::NegativeOrder);
        }
        if self.estimated_minutes.is_some_and(|m| m < 0) {
            return Err(ModuleError::NegativeDuration);
        }
        Ok(Self {
            section_id: self.section_id,
            title,
            description: crate::model::trim_optional(self.description),
            order: self.order,
            estimated_minutes: self.estimated_minutes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModulePatch {
    pub section_id: Option<Option<SectionId>>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub order: Option<i32>,
    pub estimated_minutes: Option<Option<i32>>,
}

impl TrainingModule {
    /// Apply a patch, re-validating the merged result.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError` if the merged module is invalid.
    pub fn apply(&self, patch: ModulePatch, now: DateTime<Utc>) -> Result<Self, ModuleError> {
        let merged = ModuleDraft {
            section_id: patch.section_id.unwrap_or(self.section_id),
            title: patch.title.unwrap_or_else(|| self.title.clone()),
            description: patch.description.unwrap_or_else(|| self.description.clone()),
            order: patch.order.unwrap_or(self.order),
            estimated_minutes: patch.estimated_minutes.unwrap_or(self.estimated_minutes),
        }
        .validate()?;

        Ok(Self {
            id: self.id,
            section_id: merged.section_id,
            title: merged.title,
            description: merged.description,
            order: merged.order,
            estimated_minutes: merged.estimated_minutes,
            created_at: self.created_at,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn draft_rejects_negative_duration() {
        let err = ModuleDraft {
            title: "Intro".into(),
            estimated_minutes: Some(-1),
            ..ModuleDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, ModuleError::NegativeDuration);
    }

    #[test]
    fn patch_can_unassign_section() {
        let module = TrainingModule {
            id: ModuleId::new(3),
            section_id: Some(SectionId::new(1)),
            title: "Intro".into(),
            description: None,
            order: 1,
            estimated_minutes: Some(10),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        };
        let patched = module
            .apply(
                ModulePatch {
                    section_id: Some(None),
                    ..ModulePatch::default()
                },
                fixed_now(),
            )
            .unwrap();
        assert_eq!(patched.section_id, None);
        assert_eq!(patched.estimated_minutes, Some(10));
    }
}
