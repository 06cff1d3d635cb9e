use std::sync::Arc;

use storage::repository::{ModuleRepository, PageRepository, SectionRepository, StorageError};
use training_core::model::{
    ModuleDraft, ModuleId, ModulePage, ModulePatch, PageDraft, PageId, PageKind, PagePatch,
    SectionId, TrainingModule,
};

use crate::Clock;
use crate::error::ModuleServiceError;

/// Page input without the owning module, which comes from the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub page_order: i32,
    pub kind: PageKind,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// Orchestrates modules and their pages.
#[derive(Clone)]
pub struct ModuleService {
    clock: Clock,
    sections: Arc<dyn SectionRepository>,
    modules: Arc<dyn ModuleRepository>,
    pages: Arc<dyn PageRepository>,
}

impl ModuleService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sections: Arc<dyn SectionRepository>,
        modules: Arc<dyn ModuleRepository>,
        pages: Arc<dyn PageRepository>,
    ) -> Self {
        Self {
            clock,
            sections,
            modules,
            pages,
        }
    }

    /// # Errors
    ///
    /// Returns `ModuleServiceError::Storage` if repository access fails.
    pub async fn list_modules(&self) -> Result<Vec<TrainingModule>, ModuleServiceError> {
        Ok(self.modules.list_modules().await?)
    }

    /// Modules assigned to a section, in display order.
    ///
    /// # Errors
    ///
    /// Returns `ModuleServiceError::UnknownSection` if the section does not exist.
    pub async fn list_modules_by_section(
        &self,
        section_id: SectionId,
    ) -> Result<Vec<TrainingModule>, ModuleServiceError> {
        self.ensure_section(Some(section_id)).await?;
        Ok(self.modules.list_modules_by_section(section_id).await?)
    }

    /// # Errors
    ///
    /// Returns `ModuleServiceError::ModuleNotFound` for an unknown id.
    pub async fn get_module(&self, id: ModuleId) -> Result<TrainingModule, ModuleServiceError> {
        self.modules
            .get_module(id)
            .await?
            .ok_or(ModuleServiceError::ModuleNotFound)
    }

    /// Validate and persist a module.
    ///
    /// # Errors
    ///
    /// Returns `ModuleServiceError::Module` for validation failures and
    /// `ModuleServiceError::UnknownSection` for a dangling section reference.
    pub async fn create_module(
        &self,
        draft: ModuleDraft,
    ) -> Result<TrainingModule, ModuleServiceError> {
        let draft = draft.validate()?;
        self.ensure_section(draft.section_id).await?;
        let module = self
            .modules
            .insert_module(&draft, self.clock.now())
            .await
            .map_err(|e| section_conflict(e, draft.section_id))?;
        tracing::info!(module_id = %module.id, "module created");
        Ok(module)
    }

    /// # Errors
    ///
    /// Returns `ModuleServiceError` when the module is missing, the merged
    /// module is invalid, or the section reference dangles.
    pub async fn update_module(
        &self,
        id: ModuleId,
        patch: ModulePatch,
    ) -> Result<TrainingModule, ModuleServiceError> {
        let current = self.get_module(id).await?;
        let updated = current.apply(patch, self.clock.now())?;
        self.ensure_section(updated.section_id).await?;
        self.modules
            .update_module(&updated)
            .await
            .map_err(|e| section_conflict(e, updated.section_id))?;
        Ok(updated)
    }

    /// Move a module to another section, or unassign it.
    ///
    /// # Errors
    ///
    /// Returns `ModuleServiceError::ModuleNotFound` or
    /// `ModuleServiceError::UnknownSection`.
    pub async fn assign_section(
        &self,
        id: ModuleId,
        section_id: Option<SectionId>,
    ) -> Result<TrainingModule, ModuleServiceError> {
        self.ensure_section(section_id).await?;
        self.modules
            .assign_section(id, section_id, self.clock.now())
            .await
            .map_err(|e| match e {
                StorageError::NotFound => ModuleServiceError::ModuleNotFound,
                other => section_conflict(other, section_id),
            })
    }

    /// Delete a module with its pages and progress.
    ///
    /// # Errors
    ///
    /// Returns `ModuleServiceError::ModuleNotFound` for an unknown id.
    pub async fn delete_module(&self, id: ModuleId) -> Result<(), ModuleServiceError> {
        self.modules.delete_module(id).await.map_err(|e| match e {
            StorageError::NotFound => ModuleServiceError::ModuleNotFound,
            other => ModuleServiceError::Storage(other),
        })?;
        tracing::info!(module_id = %id, "module deleted");
        Ok(())
    }

    /// Pages of a module, in reading order.
    ///
    /// # Errors
    ///
    /// Returns `ModuleServiceError::ModuleNotFound` for an unknown module.
    pub async fn list_pages(
        &self,
        module_id: ModuleId,
    ) -> Result<Vec<ModulePage>, ModuleServiceError> {
        self.get_module(module_id).await?;
        Ok(self.pages.list_pages(module_id).await?)
    }

    /// # Errors
    ///
    /// Returns `ModuleServiceError::ModuleNotFound` for an unknown module and
    /// `ModuleServiceError::Page` for an invalid page.
    pub async fn create_page(
        &self,
        module_id: ModuleId,
        page: NewPage,
    ) -> Result<ModulePage, ModuleServiceError> {
        self.get_module(module_id).await?;
        let draft = PageDraft {
            module_id,
            page_order: page.page_order,
            kind: page.kind,
            title: page.title,
            content: page.content,
        }
        .validate()?;
        Ok(self.pages.insert_page(&draft, self.clock.now()).await?)
    }

    /// # Errors
    ///
    /// Returns `ModuleServiceError::PageNotFound` or `ModuleServiceError::Page`.
    pub async fn update_page(
        &self,
        id: PageId,
        patch: PagePatch,
    ) -> Result<ModulePage, ModuleServiceError> {
        let current = self
            .pages
            .get_page(id)
            .await?
            .ok_or(ModuleServiceError::PageNotFound)?;
        let updated = current.apply(patch, self.clock.now())?;
        self.pages.update_page(&updated).await.map_err(page_missing)?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `ModuleServiceError::PageNotFound` for an unknown id.
    pub async fn delete_page(&self, id: PageId) -> Result<(), ModuleServiceError> {
        self.pages.delete_page(id).await.map_err(page_missing)
    }

    async fn ensure_section(&self, section_id: Option<SectionId>) -> Result<(), ModuleServiceError> {
        let Some(section_id) = section_id else {
            return Ok(());
        };
        match self.sections.get_section(section_id).await? {
            Some(_) => Ok(()),
            None => Err(ModuleServiceError::UnknownSection(section_id)),
        }
    }
}

/// A foreign-key conflict on a module write means the section vanished
/// between the check and the write.
fn section_conflict(e: StorageError, section_id: Option<SectionId>) -> ModuleServiceError {
    match (e, section_id) {
        (StorageError::Conflict, Some(section_id)) => ModuleServiceError::UnknownSection(section_id),
        (StorageError::NotFound, _) => ModuleServiceError::ModuleNotFound,
        (other, _) => ModuleServiceError::Storage(other),
    }
}

fn page_missing(e: StorageError) -> ModuleServiceError {
    match e {
        StorageError::NotFound => ModuleServiceError::PageNotFound,
        other => ModuleServiceError::Storage(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::Storage;
    use training_core::model::{PageError, SectionDraft};
    use training_core::time::{fixed_clock, fixed_now};

    async fn setup(name: &str) -> (Storage, ModuleService) {
        let storage = Storage::sqlite(&format!("sqlite:file:memdb_{name}?mode=memory&cache=shared"))
            .await
            .unwrap();
        let service = ModuleService::new(
            fixed_clock(),
            Arc::clone(&storage.sections),
            Arc::clone(&storage.modules),
            Arc::clone(&storage.pages),
        );
        (storage, service)
    }

    fn draft(section_id: Option<SectionId>) -> ModuleDraft {
        ModuleDraft {
            section_id,
            title: "Password hygiene".into(),
            description: Some("Managers and passphrases".into()),
            order: 0,
            estimated_minutes: Some(15),
        }
    }

    #[tokio::test]
    async fn unknown_section_reference_is_rejected() {
        let (_storage, service) = setup("module_unknown_section").await;
        let err = service
            .create_module(draft(Some(SectionId::new(77))))
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleServiceError::UnknownSection(id) if id == SectionId::new(77)));

        let module = service.create_module(draft(None)).await.unwrap();
        let err = service
            .assign_section(module.id, Some(SectionId::new(77)))
            .await
            .unwrap_err();
        assert!(matches!(err, ModuleServiceError::UnknownSection(_)));
    }

    #[tokio::test]
    async fn modules_move_between_sections() {
        let (storage, service) = setup("module_assign").await;
        let section = storage
            .sections
            .insert_section(
                &SectionDraft {
                    title: "Passwords".into(),
                    description: None,
                    order: 0,
                },
                fixed_now(),
            )
            .await
            .unwrap();
        let module = service.create_module(draft(None)).await.unwrap();
        assert!(service.list_modules_by_section(section.id).await.unwrap().is_empty());

        service.assign_section(module.id, Some(section.id)).await.unwrap();
        let listed = service.list_modules_by_section(section.id).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, module.id);
    }

    #[tokio::test]
    async fn pages_are_validated_and_ordered() {
        let (_storage, service) = setup("module_pages").await;
        let module = service.create_module(draft(None)).await.unwrap();

        let err = service
            .create_page(
                module.id,
                NewPage {
                    page_order: 0,
                    kind: PageKind::Video,
                    title: None,
                    content: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModuleServiceError::Page(PageError::MissingContent { .. })
        ));

        for (order, body) in [(1, "second"), (0, "first")] {
            service
                .create_page(
                    module.id,
                    NewPage {
                        page_order: order,
                        kind: PageKind::Text,
                        title: None,
                        content: Some(body.into()),
                    },
                )
                .await
                .unwrap();
        }
        let pages = service.list_pages(module.id).await.unwrap();
        let bodies: Vec<_> = pages.iter().filter_map(|p| p.content.as_deref()).collect();
        assert_eq!(bodies, ["first", "second"]);

        let updated = service
            .update_page(
                pages[0].id,
                PagePatch {
                    title: Some(Some("Welcome".into())),
                    ..PagePatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title.as_deref(), Some("Welcome"));

        service.delete_page(pages[0].id).await.unwrap();
        assert!(matches!(
            service.delete_page(pages[0].id).await,
            Err(ModuleServiceError::PageNotFound)
        ));
    }

    #[tokio::test]
    async fn pages_of_missing_module_are_not_found() {
        let (_storage, service) = setup("module_missing").await;
        assert!(matches!(
            service.list_pages(ModuleId::new(5)).await,
            Err(ModuleServiceError::ModuleNotFound)
        ));
        assert!(matches!(
            service.delete_module(ModuleId::new(5)).await,
            Err(ModuleServiceError::ModuleNotFound)
        ));
    }
}
