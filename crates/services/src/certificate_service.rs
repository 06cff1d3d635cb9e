//! Certificates of completion for passed assessments.
//!
//! Rendered as a standalone HTML document with autoescaping, so names and
//! section titles entered by admins or users cannot inject markup.

use std::sync::Arc;

use storage::repository::{ResultRepository, SectionRepository, StorageError, UserRepository};
use tera::{Context, Tera};
use training_core::model::{ResultId, UserId};

use crate::error::CertificateError;

const TEMPLATE_NAME: &str = "certificate.html";
const TEMPLATE: &str = include_str!("../templates/certificate.html");

const PROGRAM_NAME: &str = "Information Security Training";
const ISSUER: &str = "SecureLearn Information Security Training Portal";

/// A rendered certificate ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub certificate_id: String,
    pub file_name: String,
    pub html: String,
}

#[derive(Clone)]
pub struct CertificateService {
    tera: Arc<Tera>,
    users: Arc<dyn UserRepository>,
    sections: Arc<dyn SectionRepository>,
    results: Arc<dyn ResultRepository>,
}

impl CertificateService {
    /// # Errors
    ///
    /// Returns `tera::Error` if the bundled template does not parse.
    pub fn new(
        users: Arc<dyn UserRepository>,
        sections: Arc<dyn SectionRepository>,
        results: Arc<dyn ResultRepository>,
    ) -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, TEMPLATE)?;
        Ok(Self {
            tera: Arc::new(tera),
            users,
            sections,
            results,
        })
    }

    /// Render the certificate for one of the caller's passed results and
    /// flag the result as issued. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `CertificateError::ResultNotFound` when the result does not
    /// exist or belongs to someone else, `CertificateError::NotPassed` for a
    /// failed attempt, and `CertificateError::Template` if rendering fails.
    pub async fn issue(
        &self,
        user_id: &UserId,
        result_id: ResultId,
    ) -> Result<Certificate, CertificateError> {
        let result = self
            .results
            .get_result(result_id)
            .await?
            .filter(|r| &r.user_id == user_id)
            .ok_or(CertificateError::ResultNotFound)?;
        if !result.passed {
            return Err(CertificateError::NotPassed);
        }

        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(CertificateError::ResultNotFound)?;
        let section = self
            .sections
            .get_section(result.section_id)
            .await?
            .ok_or(CertificateError::ResultNotFound)?;

        let certificate_id = format!("{}-{}", result.id, result.section_id);
        let mut context = Context::new();
        context.insert("program_name", PROGRAM_NAME);
        context.insert("issuer", ISSUER);
        context.insert("recipient", &user.display_name());
        context.insert("section_title", &section.title);
        context.insert("score", &result.score);
        context.insert("correct_answers", &result.correct_answers);
        context.insert("total_questions", &result.total_questions);
        context.insert(
            "completed_on",
            &result.date_taken.date_naive().format("%Y-%m-%d").to_string(),
        );
        context.insert("certificate_id", &certificate_id);
        let html = self.tera.render(TEMPLATE_NAME, &context)?;

        match self.results.mark_certificate_issued(result.id).await {
            Ok(()) => {}
            Err(StorageError::NotFound) => return Err(CertificateError::ResultNotFound),
            Err(e) => return Err(e.into()),
        }
        tracing::info!(result_id = %result.id, user_id = %user_id, "certificate issued");

        Ok(Certificate {
            file_name: format!("certificate-{}.html", file_slug(&section.title)),
            certificate_id,
            html,
        })
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `-`.
fn file_slug(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}
