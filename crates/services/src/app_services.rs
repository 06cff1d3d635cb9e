use std::sync::Arc;

use chrono::Duration;
use storage::repository::Storage;
use training_core::model::AttemptWindow;

use crate::Clock;
use crate::assessment_service::AssessmentService;
use crate::auth_service::{AuthService, DEFAULT_SESSION_TTL_HOURS};
use crate::certificate_service::CertificateService;
use crate::error::AppServicesError;
use crate::module_service::ModuleService;
use crate::oauth::{GoogleOAuthClient, GoogleOAuthConfig};
use crate::progress_service::ProgressService;
use crate::section_service::SectionService;

/// Runtime knobs for the service layer.
#[derive(Clone, Debug)]
pub struct ServicesConfig {
    pub session_ttl: Duration,
    pub allowed_email_domain: Option<String>,
    pub attempt_window: AttemptWindow,
    pub oauth: Option<GoogleOAuthConfig>,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            allowed_email_domain: None,
            attempt_window: AttemptWindow::default(),
            oauth: None,
        }
    }
}

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    sections: Arc<SectionService>,
    modules: Arc<ModuleService>,
    progress: Arc<ProgressService>,
    assessments: Arc<AssessmentService>,
    certificates: Arc<CertificateService>,
    auth: Arc<AuthService>,
    oauth: Arc<GoogleOAuthClient>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization or migrations fail.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        config: ServicesConfig,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(&storage, clock, config)
    }

    /// Wire services over already-opened storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Template` if the certificate template is invalid.
    pub fn from_storage(
        storage: &Storage,
        clock: Clock,
        config: ServicesConfig,
    ) -> Result<Self, AppServicesError> {
        let sections = Arc::new(SectionService::new(clock, Arc::clone(&storage.sections)));
        let modules = Arc::new(ModuleService::new(
            clock,
            Arc::clone(&storage.sections),
            Arc::clone(&storage.modules),
            Arc::clone(&storage.pages),
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.sections),
            Arc::clone(&storage.modules),
            Arc::clone(&storage.pages),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.results),
        ));
        let assessments = Arc::new(AssessmentService::new(
            clock,
            config.attempt_window,
            Arc::clone(&storage.sections),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.results),
        ));
        let certificates = Arc::new(CertificateService::new(
            Arc::clone(&storage.users),
            Arc::clone(&storage.sections),
            Arc::clone(&storage.results),
        )?);
        let auth = Arc::new(AuthService::new(
            clock,
            config.session_ttl,
            config.allowed_email_domain,
            Arc::clone(&storage.users),
            Arc::clone(&storage.sessions),
        ));
        let oauth = Arc::new(GoogleOAuthClient::new(config.oauth));

        Ok(Self {
            sections,
            modules,
            progress,
            assessments,
            certificates,
            auth,
            oauth,
        })
    }

    #[must_use]
    pub fn sections(&self) -> Arc<SectionService> {
        Arc::clone(&self.sections)
    }

    #[must_use]
    pub fn modules(&self) -> Arc<ModuleService> {
        Arc::clone(&self.modules)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn assessments(&self) -> Arc<AssessmentService> {
        Arc::clone(&self.assessments)
    }

    #[must_use]
    pub fn certificates(&self) -> Arc<CertificateService> {
        Arc::clone(&self.certificates)
    }

    #[must_use]
    pub fn auth(&self) -> Arc<AuthService> {
        Arc::clone(&self.auth)
    }

    #[must_use]
    pub fn oauth(&self) -> Arc<GoogleOAuthClient> {
        Arc::clone(&self.oauth)
    }
}
