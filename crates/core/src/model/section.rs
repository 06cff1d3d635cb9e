use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::SectionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SectionError {
    #[error("section title cannot be empty")]
    EmptyTitle,

    #[error("section order must be >= 0")]
    NegativeOrder,
}

/// Ordered grouping of training modules with its own assessment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSection {
    pub id: SectionId,
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionDraft {
    pub title: String,
    pub description: Option<String>,
    pub order: i32,
}

impl SectionDraft {
    /// Trim and check the draft.
    ///
    /// # Errors
    ///
    /// Returns `SectionError` if the title is blank or the order negative.
    pub fn validate(self) -> Result<Self, SectionError> {
        let title = self.title.trim().to_owned();
        if title.is_empty() {
            return Err(SectionError::EmptyTitle);
        }
        if self.order < 0 {
            return Err(SectionError::NegativeOrder);
        }
        Ok(Self {
            title,
            description: crate::model::trim_optional(self.description),
            order: self.order,
        })
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SectionPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub order: Option<i32>,
}

impl TrainingSection {
    /// Apply a patch, re-validating the merged result.
    ///
    /// # Errors
    ///
    /// Returns `SectionError` if the merged section is invalid.
    pub fn apply(&self, patch: SectionPatch, now: DateTime<Utc>) -> Result<Self, SectionError> {
        let merged = SectionDraft {
            title: patch.title.unwrap_or_else(|| self.title.clone()),
            description: patch.description.unwrap_or_else(|| self.description.clone()),
            order: patch.order.unwrap_or(self.order),
        }
        .validate()?;

        Ok(Self {
            id: self.id,
            title: merged.title,
            description: merged.description,
            order: merged.order,
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
    fn draft_trims_and_rejects_blank_title() {
        let draft = SectionDraft {
            title: "  Phishing  ".into(),
            description: Some("   ".into()),
            order: 1,
        }
        .validate()
        .unwrap();
        assert_eq!(draft.title, "Phishing");
        assert_eq!(draft.description, None);

        let err = SectionDraft {
            title: " ".into(),
            ..SectionDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SectionError::EmptyTitle);
    }

    #[test]
    fn patch_keeps_unspecified_fields() {
        let section = TrainingSection {
            id: SectionId::new(1),
            title: "Passwords".into(),
            description: Some("Basics".into()),
            order: 2,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        };
        let later = fixed_now() + chrono::Duration::minutes(5);
        let patched = section
            .apply(
                SectionPatch {
                    order: Some(5),
                    ..SectionPatch::default()
                },
                later,
            )
            .unwrap();
        assert_eq!(patched.title, "Passwords");
        assert_eq!(patched.description.as_deref(), Some("Basics"));
        assert_eq!(patched.order, 5);
        assert_eq!(patched.updated_at, later);
        assert_eq!(patched.created_at, section.created_at);
    }
}
