use std::collections::HashSet;
use std::sync::Arc;

use storage::repository::{
    ModuleRepository, PageRepository, ProgressReportRow, ProgressRepository, ResultRepository,
    SectionRepository,
};
use training_core::model::{
    EmployeeProgress, ModuleId, PageId, ProgressStatus, ProgressUpdate, SectionId,
    SectionProgress, UserId, summarize_sections,
};

use crate::Clock;
use crate::error::ProgressServiceError;

/// Section completion for one user, plus whether its assessment is passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSummary {
    pub section_id: SectionId,
    pub title: String,
    pub progress: SectionProgress,
    pub assessment_passed: bool,
}

/// Tracks per-user module progress.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    sections: Arc<dyn SectionRepository>,
    modules: Arc<dyn ModuleRepository>,
    pages: Arc<dyn PageRepository>,
    progress: Arc<dyn ProgressRepository>,
    results: Arc<dyn ResultRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sections: Arc<dyn SectionRepository>,
        modules: Arc<dyn ModuleRepository>,
        pages: Arc<dyn PageRepository>,
        progress: Arc<dyn ProgressRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Self {
        Self {
            clock,
            sections,
            modules,
            pages,
            progress,
            results,
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn list_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<EmployeeProgress>, ProgressServiceError> {
        Ok(self.progress.list_progress_for_user(user_id).await?)
    }

    /// `None` means the module has not been started.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn get_progress(
        &self,
        user_id: &UserId,
        module_id: ModuleId,
    ) -> Result<Option<EmployeeProgress>, ProgressServiceError> {
        Ok(self.progress.get_progress(user_id, module_id).await?)
    }

    /// Record that the user opened a page of a module.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError` when the module or page is unknown or
    /// the page belongs to another module.
    pub async fn record_page_view(
        &self,
        user_id: &UserId,
        module_id: ModuleId,
        page_id: PageId,
    ) -> Result<EmployeeProgress, ProgressServiceError> {
        self.ensure_module(module_id).await?;
        self.ensure_page_in_module(module_id, page_id).await?;

        let existing = self.progress.get_progress(user_id, module_id).await?;
        let update = ProgressUpdate::page_view(
            existing.as_ref(),
            user_id.clone(),
            module_id,
            page_id,
            self.clock.now(),
        );
        Ok(self.progress.upsert_progress(&update).await?)
    }

    /// Mark a module completed. Completing twice keeps the first timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::EmptyModule` for a module without pages,
    /// plus the errors of `record_page_view` for the optional final page.
    pub async fn complete_module(
        &self,
        user_id: &UserId,
        module_id: ModuleId,
        last_page_id: Option<PageId>,
    ) -> Result<EmployeeProgress, ProgressServiceError> {
        self.ensure_module(module_id).await?;
        let pages = self.pages.list_pages(module_id).await?;
        if pages.is_empty() {
            return Err(ProgressServiceError::EmptyModule);
        }
        if let Some(page_id) = last_page_id {
            if !pages.iter().any(|p| p.id == page_id) {
                return Err(ProgressServiceError::PageNotInModule);
            }
        }

        let existing = self.progress.get_progress(user_id, module_id).await?;
        let Some(update) = ProgressUpdate::completion(
            existing.as_ref(),
            user_id.clone(),
            module_id,
            last_page_id,
            self.clock.now(),
        ) else {
            tracing::debug!(user_id = %user_id, module_id = %module_id, "module already completed");
            return existing.ok_or(ProgressServiceError::ModuleNotFound);
        };

        let stored = self.progress.upsert_progress(&update).await?;
        tracing::info!(user_id = %user_id, module_id = %module_id, "module completed");
        Ok(stored)
    }

    /// Apply a client-reported status change.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::UnsupportedStatus` for `not_started`
    /// and `ProgressServiceError::MissingPage` for a page view without page.
    pub async fn update_status(
        &self,
        user_id: &UserId,
        module_id: ModuleId,
        status: ProgressStatus,
        last_viewed_page_id: Option<PageId>,
    ) -> Result<EmployeeProgress, ProgressServiceError> {
        match status {
            ProgressStatus::InProgress => {
                let page_id = last_viewed_page_id.ok_or(ProgressServiceError::MissingPage)?;
                self.record_page_view(user_id, module_id, page_id).await
            }
            ProgressStatus::Completed => {
                self.complete_module(user_id, module_id, last_viewed_page_id)
                    .await
            }
            ProgressStatus::NotStarted => Err(ProgressServiceError::UnsupportedStatus(
                ProgressStatus::NotStarted.as_str(),
            )),
        }
    }

    /// Derived completion per section, in section order.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn section_summaries(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SectionSummary>, ProgressServiceError> {
        let sections = self.sections.list_sections().await?;
        let modules = self.modules.list_modules().await?;
        let progress = self.progress.list_progress_for_user(user_id).await?;
        let passed: HashSet<SectionId> = self
            .results
            .list_results_for_user(user_id)
            .await?
            .into_iter()
            .filter(|r| r.passed)
            .map(|r| r.section_id)
            .collect();

        let summaries = summarize_sections(&sections, &modules, &progress);
        Ok(sections
            .into_iter()
            .zip(summaries)
            .map(|(section, progress)| SectionSummary {
                section_id: section.id,
                assessment_passed: passed.contains(&section.id),
                title: section.title,
                progress,
            })
            .collect())
    }

    /// Every progress row with its user and module, for compliance reports.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn admin_report(&self) -> Result<Vec<ProgressReportRow>, ProgressServiceError> {
        Ok(self.progress.list_all_progress().await?)
    }

    async fn ensure_module(&self, module_id: ModuleId) -> Result<(), ProgressServiceError> {
        self.modules
            .get_module(module_id)
            .await?
            .map(|_| ())
            .ok_or(ProgressServiceError::ModuleNotFound)
    }

    async fn ensure_page_in_module(
        &self,
        module_id: ModuleId,
        page_id: PageId,
    ) -> Result<(), ProgressServiceError> {
        let page = self
            .pages
            .get_page(page_id)
            .await?
            .ok_or(ProgressServiceError::PageNotFound)?;
        if page.module_id != module_id {
            return Err(ProgressServiceError::PageNotInModule);
        }
        Ok(())
    }
}
