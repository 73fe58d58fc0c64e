//! Transport-neutral controller responses.

use roadmap_core::repo::identifier_repo::SchemeHolder;
use roadmap_core::service::org_service::OrgEditView;
use serde_json::Value;

/// One-shot message shown on the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flash {
    Notice(String),
    Alert(String),
}

/// Page a controller action asks the caller to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    AdminEdit(OrgEditView),
    ShibbolethDs { orgs: Vec<SchemeHolder> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Redirect {
        location: String,
        flash: Option<Flash>,
    },
    Render(View),
    Json(Value),
    /// Non-success status with a plain message.
    Status { code: u16, message: String },
}

impl Response {
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            flash: None,
        }
    }

    pub fn redirect_with_notice(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            flash: Some(Flash::Notice(message.into())),
        }
    }

    pub fn redirect_with_alert(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Redirect {
            location: location.into(),
            flash: Some(Flash::Alert(message.into())),
        }
    }

    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }

    /// Redirect target, when this is a redirect.
    pub fn location(&self) -> Option<&str> {
        match self {
            Self::Redirect { location, .. } => Some(location),
            _ => None,
        }
    }

    pub fn flash(&self) -> Option<&Flash> {
        match self {
            Self::Redirect { flash, .. } => flash.as_ref(),
            _ => None,
        }
    }
}
