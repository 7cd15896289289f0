//! User facing messages carried by admin responses.

use http::StatusCode;
use serde::{Deserialize, Serialize};

const GLOBAL_ERROR_TEXT: &str = "The request could not be processed";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Form field the message refers to, `None` for request-wide messages.
    pub field: Option<String>,
    pub code: u16,
    pub message: String,
}

impl Message {
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            code: StatusCode::BAD_REQUEST.as_u16(),
            message: message.into(),
        }
    }

    /// Form level error not bound to a single field.
    pub fn form_error(message: impl Into<String>) -> Self {
        Self {
            field: None,
            code: StatusCode::BAD_REQUEST.as_u16(),
            message: message.into(),
        }
    }

    /// Generic, field-less error tagged with `status`.
    pub fn global_error(status: StatusCode) -> Self {
        Self {
            field: None,
            code: status.as_u16(),
            message: GLOBAL_ERROR_TEXT.to_string(),
        }
    }

    pub fn is_global(&self) -> bool {
        self.field.is_none()
    }
}
