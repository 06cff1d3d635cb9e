use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{ModuleId, PageId, SectionId, UserId};
use crate::model::module::TrainingModule;
use crate::model::section::TrainingSection;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("unknown progress status: {0}")]
    UnknownStatus(String),
}

/// Per-user, per-module completion state.
///
/// `NotStarted` is never persisted by the services: it is what a missing row
/// means. It still parses so that arbitrary stored values round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::NotStarted => "not_started",
            ProgressStatus::InProgress => "in_progress",
            ProgressStatus::Completed => "completed",
        }
    }

    /// # Errors
    ///
    /// Returns `ProgressError::UnknownStatus` for unrecognized codes.
    pub fn parse(raw: &str) -> Result<Self, ProgressError> {
        match raw {
            "not_started" => Ok(ProgressStatus::NotStarted),
            "in_progress" => Ok(ProgressStatus::InProgress),
            "completed" => Ok(ProgressStatus::Completed),
            other => Err(ProgressError::UnknownStatus(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeProgress {
    pub user_id: UserId,
    pub module_id: ModuleId,
    pub status: ProgressStatus,
    pub last_viewed_page_id: Option<PageId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmployeeProgress {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == ProgressStatus::Completed
    }
}

/// Row written by a progress upsert keyed on `(user_id, module_id)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub user_id: UserId,
    pub module_id: ModuleId,
    pub status: ProgressStatus,
    pub last_viewed_page_id: Option<PageId>,
    pub completed_at: Option<DateTime<Utc>>,
    pub at: DateTime<Utc>,
}

impl ProgressUpdate {
    /// Update produced when the user opens a page.
    ///
    /// A completed module stays completed; only the bookmark moves.
    #[must_use]
    pub fn page_view(
        existing: Option<&EmployeeProgress>,
        user_id: UserId,
        module_id: ModuleId,
        page_id: PageId,
        now: DateTime<Utc>,
    ) -> Self {
        match existing.filter(|p| p.is_completed()) {
            Some(done) => Self {
                user_id,
                module_id,
                status: ProgressStatus::Completed,
                last_viewed_page_id: Some(page_id),
                completed_at: done.completed_at,
                at: now,
            },
            None => Self {
                user_id,
                module_id,
                status: ProgressStatus::InProgress,
                last_viewed_page_id: Some(page_id),
                completed_at: None,
                at: now,
            },
        }
    }

    /// Update produced when the user confirms the final page.
    ///
    /// Returns `None` when the module is already completed.
    #[must_use]
    pub fn completion(
        existing: Option<&EmployeeProgress>,
        user_id: UserId,
        module_id: ModuleId,
        last_page_id: Option<PageId>,
        now: DateTime<Utc>,
    ) -> Option<Self> {
        if existing.is_some_and(EmployeeProgress::is_completed) {
            return None;
        }
        let last_viewed_page_id =
            last_page_id.or_else(|| existing.and_then(|p| p.last_viewed_page_id));
        Some(Self {
            user_id,
            module_id,
            status: ProgressStatus::Completed,
            last_viewed_page_id,
            completed_at: Some(now),
            at: now,
        })
    }
}

/// Completion of one section for one user, derived on read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionProgress {
    pub section_id: SectionId,
    pub total_modules: u32,
    pub completed_modules: u32,
    pub in_progress_modules: u32,
    pub percentage: u8,
}

/// Aggregate a user's progress rows into per-section completion.
///
/// Sections keep their input order. Unassigned modules are ignored, as are
/// progress rows for modules that no longer exist.
#[must_use]
pub fn summarize_sections(
    sections: &[TrainingSection],
    modules: &[TrainingModule],
    progress: &[EmployeeProgress],
) -> Vec<SectionProgress> {
    let status_by_module: HashMap<ModuleId, ProgressStatus> =
        progress.iter().map(|p| (p.module_id, p.status)).collect();

    sections
        .iter()
        .map(|section| {
            let mut total = 0_u32;
            let mut completed = 0_u32;
            let mut in_progress = 0_u32;
            for module in modules.iter().filter(|m| m.section_id == Some(section.id)) {
                total += 1;
                match status_by_module.get(&module.id) {
                    Some(ProgressStatus::Completed) => completed += 1,
                    Some(ProgressStatus::InProgress) => in_progress += 1,
                    _ => {}
                }
            }
            SectionProgress {
                section_id: section.id,
                total_modules: total,
                completed_modules: completed,
                in_progress_modules: in_progress,
                percentage: percentage(completed, total),
            }
        })
        .collect()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percentage(part: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(part) / f64::from(total) * 100.0).round();
    // part <= total keeps this within 0..=100
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn section(id: u64) -> TrainingSection {
        TrainingSection {
            id: SectionId::new(id),
            title: format!("Section {id}"),
            description: None,
            order: i32::try_from(id).unwrap(),
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    fn module(id: u64, section: Option<u64>) -> TrainingModule {
        TrainingModule {
            id: ModuleId::new(id),
            section_id: section.map(SectionId::new),
            title: format!("Module {id}"),
            description: None,
            order: 0,
            estimated_minutes: None,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    fn row(module: u64, status: ProgressStatus) -> EmployeeProgress {
        EmployeeProgress {
            user_id: UserId::new("u"),
            module_id: ModuleId::new(module),
            status,
            last_viewed_page_id: None,
            completed_at: None,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn page_view_does_not_regress_completed_module() {
        let mut done = row(1, ProgressStatus::Completed);
        done.completed_at = Some(fixed_now());
        let later = fixed_now() + chrono::Duration::hours(1);
        let update = ProgressUpdate::page_view(
            Some(&done),
            UserId::new("u"),
            ModuleId::new(1),
            PageId::new(9),
            later,
        );
        assert_eq!(update.status, ProgressStatus::Completed);
        assert_eq!(update.completed_at, Some(fixed_now()));
        assert_eq!(update.last_viewed_page_id, Some(PageId::new(9)));
    }

    #[test]
    fn completion_is_noop_when_already_completed() {
        let done = row(1, ProgressStatus::Completed);
        assert!(
            ProgressUpdate::completion(
                Some(&done),
                UserId::new("u"),
                ModuleId::new(1),
                None,
                fixed_now()
            )
            .is_none()
        );

        let mut started = row(1, ProgressStatus::InProgress);
        started.last_viewed_page_id = Some(PageId::new(4));
        let update = ProgressUpdate::completion(
            Some(&started),
            UserId::new("u"),
            ModuleId::new(1),
            None,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(update.status, ProgressStatus::Completed);
        assert_eq!(update.last_viewed_page_id, Some(PageId::new(4)));
        assert_eq!(update.completed_at, Some(fixed_now()));
    }

    #[test]
    fn section_summary_counts_only_assigned_modules() {
        let sections = vec![section(1), section(2)];
        let modules = vec![
            module(1, Some(1)),
            module(2, Some(1)),
            module(3, Some(1)),
            module(4, None),
        ];
        let progress = vec![
            row(1, ProgressStatus::Completed),
            row(2, ProgressStatus::InProgress),
            row(4, ProgressStatus::Completed),
            row(99, ProgressStatus::Completed),
        ];

        let summary = summarize_sections(&sections, &modules, &progress);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].total_modules, 3);
        assert_eq!(summary[0].completed_modules, 1);
        assert_eq!(summary[0].in_progress_modules, 1);
        assert_eq!(summary[0].percentage, 33);
        assert_eq!(summary[1].total_modules, 0);
        assert_eq!(summary[1].percentage, 0);
    }

    #[test]
    fn status_codes_parse() {
        assert_eq!(ProgressStatus::parse("in_progress").unwrap(), ProgressStatus::InProgress);
        assert_eq!(ProgressStatus::Completed.as_str(), "completed");
        assert!(ProgressStatus::parse("failed").is_err());
    }
}
