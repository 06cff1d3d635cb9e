use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::UserId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum UserError {
    #[error("user id cannot be empty")]
    EmptyId,

    #[error("email address is invalid: {0}")]
    InvalidEmail(String),

    #[error("email domain is not allowed: {0}")]
    DomainNotAllowed(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Access level of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Employee,
    Admin,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Employee => "employee",
            Role::Admin => "admin",
        }
    }

    /// Parse the persisted role code.
    ///
    /// # Errors
    ///
    /// Returns `UserError::UnknownRole` for anything other than `employee`/`admin`.
    pub fn parse(raw: &str) -> Result<Self, UserError> {
        match raw {
            "employee" => Ok(Role::Employee),
            "admin" => Ok(Role::Admin),
            other => Err(UserError::UnknownRole(other.to_owned())),
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Profile data received from the identity provider on login.
///
/// Applied as an upsert: new users start as employees, existing users get
/// their profile refreshed while their role is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
}

impl UserProfile {
    /// Check the profile and enforce the organization email domain.
    ///
    /// The domain comparison is case-insensitive. `allowed_domain` is given
    /// without the `@`.
    ///
    /// # Errors
    ///
    /// Returns `UserError` when the id is blank, the email is malformed or
    /// the domain does not match.
    pub fn validate(mut self, allowed_domain: Option<&str>) -> Result<Self, UserError> {
        if self.id.as_str().trim().is_empty() {
            return Err(UserError::EmptyId);
        }
        let email = self.email.trim().to_owned();
        let Some((local, domain)) = email.rsplit_once('@') else {
            return Err(UserError::InvalidEmail(email));
        };
        if local.is_empty() || domain.is_empty() {
            return Err(UserError::InvalidEmail(email));
        }
        if let Some(allowed) = allowed_domain {
            let allowed = allowed.trim_start_matches('@');
            if !domain.eq_ignore_ascii_case(allowed) {
                return Err(UserError::DomainNotAllowed(domain.to_owned()));
            }
        }
        self.email = email;
        self.first_name = crate::model::trim_optional(self.first_name);
        self.last_name = crate::model::trim_optional(self.last_name);
        self.profile_image_url = crate::model::trim_optional(self.profile_image_url);
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Name printed on certificates: first and last name when present,
    /// otherwise the email address.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        if self.email.trim().is_empty() {
            "Certificate Recipient".to_owned()
        } else {
            self.email.clone()
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn user(first: Option<&str>, last: Option<&str>, email: &str) -> User {
        User {
            id: UserId::new("u-1"),
            email: email.to_owned(),
            first_name: first.map(str::to_owned),
            last_name: last.map(str::to_owned),
            profile_image_url: None,
            role: Role::Employee,
            created_at: fixed_now(),
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(
            user(Some("Ada"), Some("Lovelace"), "ada@corp.test").display_name(),
            "Ada Lovelace"
        );
        assert_eq!(user(None, Some("Lovelace"), "ada@corp.test").display_name(), "Lovelace");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(user(Some("  "), None, "ada@corp.test").display_name(), "ada@corp.test");
        assert_eq!(user(None, None, "").display_name(), "Certificate Recipient");
    }

    #[test]
    fn profile_domain_check_is_case_insensitive() {
        let profile = UserProfile {
            id: UserId::new("sub-1"),
            email: "Ada@Corp.Test".into(),
            first_name: Some(" Ada ".into()),
            last_name: Some(String::new()),
            profile_image_url: None,
        };
        let ok = profile.clone().validate(Some("corp.test")).unwrap();
        assert_eq!(ok.first_name.as_deref(), Some("Ada"));
        assert_eq!(ok.last_name, None);

        let err = profile.validate(Some("@other.test")).unwrap_err();
        assert_eq!(err, UserError::DomainNotAllowed("Corp.Test".into()));
    }

    #[test]
    fn profile_rejects_malformed_email() {
        let profile = UserProfile {
            id: UserId::new("sub-1"),
            email: "not-an-email".into(),
            first_name: None,
            last_name: None,
            profile_image_url: None,
        };
        assert!(matches!(
            profile.validate(None),
            Err(UserError::InvalidEmail(_))
        ));
    }

    #[test]
    fn role_codes_round_trip() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::Employee.as_str(), "employee");
        assert!(Role::parse("root").is_err());
    }
}
