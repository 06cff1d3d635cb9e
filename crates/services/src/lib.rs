#![forbid(unsafe_code)]

pub mod app_services;
pub mod assessment_service;
pub mod auth_service;
pub mod certificate_service;
pub mod error;
pub mod module_service;
pub mod oauth;
pub mod progress_service;
pub mod section_service;
pub mod seed;

pub use training_core::Clock;

pub use app_services::{AppServices, ServicesConfig};
pub use assessment_service::{AssessmentService, AttemptTicket};
pub use auth_service::{AuthService, DEFAULT_SESSION_TTL_HOURS, LoginSession, random_token};
pub use certificate_service::{Certificate, CertificateService};
pub use error::{
    AppServicesError, AssessmentServiceError, AuthError, CertificateError, ModuleServiceError,
    ProgressServiceError, SectionServiceError, SeedError,
};
pub use module_service::{ModuleService, NewPage};
pub use oauth::{CALLBACK_PATH, GoogleOAuthClient, GoogleOAuthConfig};
pub use progress_service::{ProgressService, SectionSummary};
pub use section_service::SectionService;
pub use seed::{SeedOutcome, seed_sample_content};
