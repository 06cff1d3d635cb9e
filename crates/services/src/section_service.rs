use std::sync::Arc;

use storage::repository::{SectionRepository, StorageError};
use training_core::model::{SectionDraft, SectionId, SectionPatch, TrainingSection};

use crate::Clock;
use crate::error::SectionServiceError;

/// Orchestrates section authoring.
#[derive(Clone)]
pub struct SectionService {
    clock: Clock,
    sections: Arc<dyn SectionRepository>,
}

impl SectionService {
    #[must_use]
    pub fn new(clock: Clock, sections: Arc<dyn SectionRepository>) -> Self {
        Self { clock, sections }
    }

    /// Sections in display order.
    ///
    /// # Errors
    ///
    /// Returns `SectionServiceError::Storage` if repository access fails.
    pub async fn list_sections(&self) -> Result<Vec<TrainingSection>, SectionServiceError> {
        Ok(self.sections.list_sections().await?)
    }

    /// # Errors
    ///
    /// Returns `SectionServiceError::NotFound` for an unknown id.
    pub async fn get_section(&self, id: SectionId) -> Result<TrainingSection, SectionServiceError> {
        self.sections
            .get_section(id)
            .await?
            .ok_or(SectionServiceError::NotFound)
    }

    /// Validate and persist a new section.
    ///
    /// # Errors
    ///
    /// Returns `SectionServiceError::Section` for validation failures.
    /// Returns `SectionServiceError::Storage` if persistence fails.
    pub async fn create_section(
        &self,
        draft: SectionDraft,
    ) -> Result<TrainingSection, SectionServiceError> {
        let draft = draft.validate()?;
        let section = self.sections.insert_section(&draft, self.clock.now()).await?;
        tracing::info!(section_id = %section.id, "section created");
        Ok(section)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `SectionServiceError::NotFound` for an unknown id and
    /// `SectionServiceError::Section` when the merged section is invalid.
    pub async fn update_section(
        &self,
        id: SectionId,
        patch: SectionPatch,
    ) -> Result<TrainingSection, SectionServiceError> {
        let current = self.get_section(id).await?;
        let updated = current.apply(patch, self.clock.now())?;
        self.sections
            .update_section(&updated)
            .await
            .map_err(not_found)?;
        Ok(updated)
    }

    /// Delete a section and everything scoped to it.
    ///
    /// # Errors
    ///
    /// Returns `SectionServiceError::NotFound` for an unknown id.
    pub async fn delete_section(&self, id: SectionId) -> Result<(), SectionServiceError> {
        self.sections.delete_section(id).await.map_err(not_found)?;
        tracing::info!(section_id = %id, "section deleted");
        Ok(())
    }
}

fn not_found(e: StorageError) -> SectionServiceError {
    match e {
        StorageError::NotFound => SectionServiceError::NotFound,
        other => SectionServiceError::Storage(other),
    }
}
