use chrono::{DateTime, Utc};
use thiserror::Error;
use url::Url;

use crate::model::ids::{ModuleId, PageId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PageError {
    #[error("unknown page type: {0}")]
    UnknownKind(String),

    #[error("page order must be >= 0")]
    NegativeOrder,

    #[error("{kind} pages require content")]
    MissingContent { kind: &'static str },

    #[error("unsupported media URL scheme: {0}")]
    UnsupportedScheme(String),
}

/// Rendering type of a module page. Content stays opaque to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageKind {
    Text,
    Image,
    Video,
    Slide,
}

impl PageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Text => "text",
            PageKind::Image => "image",
            PageKind::Video => "video",
            PageKind::Slide => "slide",
        }
    }

    /// Parse a page type code. `ppt_slide` is the older spelling of `slide`.
    ///
    /// # Errors
    ///
    /// Returns `PageError::UnknownKind` for any other code.
    pub fn parse(raw: &str) -> Result<Self, PageError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(PageKind::Text),
            "image" => Ok(PageKind::Image),
            "video" => Ok(PageKind::Video),
            "slide" | "ppt_slide" => Ok(PageKind::Slide),
            other => Err(PageError::UnknownKind(other.to_owned())),
        }
    }

    fn is_media(self) -> bool {
        !matches!(self, PageKind::Text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModulePage {
    pub id: PageId,
    pub module_id: ModuleId,
    pub page_order: i32,
    pub kind: PageKind,
    pub title: Option<String>,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDraft {
    pub module_id: ModuleId,
    pub page_order: i32,
    pub kind: PageKind,
    pub title: Option<String>,
    pub content: Option<String>,
}

impl PageDraft {
    /// Check ordering and media references.
    ///
    /// Media pages must carry content. Absolute URLs are limited to http(s);
    /// relative references (e.g. `/uploads/deck.pptx#slide2`) pass through.
    ///
    /// # Errors
    ///
    /// Returns `PageError` if the draft is not storable.
    pub fn validate(self) -> Result<Self, PageError> {
        if self.page_order < 0 {
            return Err(PageError::NegativeOrder);
        }
        let content = self.content.filter(|c| !c.trim().is_empty());
        if self.kind.is_media() {
            let Some(reference) = content.as_deref() else {
                return Err(PageError::MissingContent {
                    kind: self.kind.as_str(),
                });
            };
            if let Ok(url) = Url::parse(reference.trim()) {
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(PageError::UnsupportedScheme(url.scheme().to_owned()));
                }
            }
        }
        Ok(Self {
            module_id: self.module_id,
            page_order: self.page_order,
            kind: self.kind,
            title: crate::model::trim_optional(self.title),
            content,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PagePatch {
    pub page_order: Option<i32>,
    pub kind: Option<PageKind>,
    pub title: Option<Option<String>>,
    pub content: Option<Option<String>>,
}

impl ModulePage {
    /// Apply a patch, re-validating the merged result.
    ///
    /// # Errors
    ///
    /// Returns `PageError` if the merged page is invalid.
    pub fn apply(&self, patch: PagePatch, now: DateTime<Utc>) -> Result<Self, PageError> {
        let merged = PageDraft {
            module_id: self.module_id,
            page_order: patch.page_order.unwrap_or(self.page_order),
            kind: patch.kind.unwrap_or(self.kind),
            title: patch.title.unwrap_or_else(|| self.title.clone()),
            content: patch.content.unwrap_or_else(|| self.content.clone()),
        }
        .validate()?;

        Ok(Self {
            id: self.id,
            module_id: merged.module_id,
            page_order: merged.page_order,
            kind: merged.kind,
            title: merged.title,
            content: merged.content,
            created_at: self.created_at,
            updated_at: now,
        })
    }
}
