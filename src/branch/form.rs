//! Input forms of the branch create request.
//!
//! A [`Form`] validates its data once, on construction, and keeps the
//! resulting messages so callers can copy them into a response untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::message::Message;

const SCHEMA_FIELD: &str = "__all__";

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ()\-]{4,19}$").expect("phone pattern is valid"));

#[derive(Clone, Default, Debug, Serialize, Deserialize, Validate)]
pub struct BranchForm {
    #[validate(
        length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"),
        custom(function = "BranchForm::validate_title")
    )]
    #[serde(default)]
    pub title: String,
    #[validate(length(max = 512, message = "Address must be at most 512 characters"))]
    pub address: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Phone number is not valid"))]
    pub phone: Option<String>,
    #[validate(email(message = "Email is not valid"))]
    pub email: Option<String>,
}

impl BranchForm {
    fn validate_title(title: &str) -> Result<(), ValidationError> {
        if title.trim().is_empty() {
            Err(ValidationError::new("title_blank").with_message("Title must not be blank".into()))
        } else {
            Ok(())
        }
    }
}

#[derive(Clone, Default, Debug, Serialize, Deserialize, Validate)]
pub struct OrderExtraForm {
    #[validate(length(max = 64, message = "Contract number must be at most 64 characters"))]
    pub contract_number: Option<String>,
    #[validate(range(max = 365, message = "Payment deferral must be at most 365 days"))]
    #[serde(default)]
    pub payment_deferral_days: u32,
    #[validate(range(min = 0.0, message = "Minimum order amount must not be negative"))]
    #[serde(default)]
    pub min_order_amount: f64,
    #[validate(length(max = 1000, message = "Comment must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Validated form data together with its messages.
#[derive(Clone, Debug)]
pub struct Form<T> {
    data: T,
    messages: Vec<Message>,
}

impl<T: Validate> Form<T> {
    pub fn new(data: T) -> Self {
        let messages = match data.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => collect_messages(&errors),
        };
        Self { data, messages }
    }
}

impl<T: Validate + DeserializeOwned + Default> Form<T> {
    /// Builds a form from submitted JSON. A missing or `null` value is an
    /// empty form. Values of the wrong type become field messages on an
    /// otherwise empty form, so the request still reaches validation.
    pub fn from_json(value: Option<Value>) -> Self {
        let value = match value {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(value) => value,
        };
        match serde_json::from_value::<T>(value.clone()) {
            Ok(data) => Self::new(data),
            Err(err) => Self {
                data: T::default(),
                messages: deserialize_messages::<T>(&value, &err),
            },
        }
    }
}

impl<T> Form<T> {
    pub fn is_valid(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }
}

fn collect_messages(errors: &ValidationErrors) -> Vec<Message> {
    let mut messages = Vec::new();
    for (field, field_errors) in errors.field_errors() {
        let field = field.to_string();
        for err in field_errors.iter() {
            let text = err
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.code.to_string());
            if field == SCHEMA_FIELD {
                messages.push(Message::form_error(text));
            } else {
                messages.push(Message::field_error(field.clone(), text));
            }
        }
    }

    // nested errors are not reported per field; an invalid form must still say so
    if messages.is_empty() {
        messages.push(Message::form_error("Form is not valid"));
    }

    messages.sort_by(|a, b| (&a.field, &a.message).cmp(&(&b.field, &b.message)));
    messages
}

// Retries every submitted field alone to find the ones serde rejects. All
// form fields are optional or defaulted, so a single field deserializes on
// its own.
fn deserialize_messages<T: DeserializeOwned>(
    value: &Value,
    err: &serde_json::Error,
) -> Vec<Message> {
    let Value::Object(fields) = value else {
        return vec![Message::form_error(format!("Form data must be an object: {}", err))];
    };

    let mut messages: Vec<Message> = fields
        .iter()
        .filter_map(|(name, field)| {
            let mut single = Map::new();
            single.insert(name.clone(), field.clone());
            serde_json::from_value::<T>(Value::Object(single))
                .err()
                .map(|e| Message::field_error(name.clone(), e.to_string()))
        })
        .collect();

    if messages.is_empty() {
        messages.push(Message::form_error(err.to_string()));
    }

    messages.sort_by(|a, b| (&a.field, &a.message).cmp(&(&b.field, &b.message)));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(title: &str) -> BranchForm {
        BranchForm {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_branch_form() {
        let form = Form::new(BranchForm {
            title: "Main Office".to_string(),
            address: Some("1 Main St".to_string()),
            phone: Some("+1 (555) 010-2030".to_string()),
            email: Some("office@example.com".to_string()),
        });
        assert!(form.is_valid());
        assert!(form.messages().is_empty());
        assert_eq!(form.data().title, "Main Office");
    }

    #[test]
    fn test_blank_title() {
        let form = Form::new(branch("   "));
        assert!(!form.is_valid());
        assert_eq!(form.messages().len(), 1);
        assert_eq!(form.messages()[0].field.as_deref(), Some("title"));
        assert_eq!(form.messages()[0].message, "Title must not be blank");
    }

    #[test]
    fn test_empty_title() {
        let form = Form::new(branch(""));
        assert!(!form.is_valid());
        assert!(form
            .messages()
            .iter()
            .any(|m| m.message == "Title must be between 1 and 255 characters"));
    }

    #[test]
    fn test_messages_sorted_by_field() {
        let form = Form::new(BranchForm {
            title: "x".repeat(300),
            phone: Some("call me".to_string()),
            email: Some("not-an-email".to_string()),
            ..Default::default()
        });
        assert!(!form.is_valid());
        let fields: Vec<_> = form
            .messages()
            .iter()
            .map(|m| m.field.clone().unwrap())
            .collect();
        assert_eq!(fields, vec!["email", "phone", "title"]);
        assert!(form.messages().iter().all(|m| m.code == 400));
    }

    #[test]
    fn test_order_extra_limits() {
        let form = Form::new(OrderExtraForm {
            payment_deferral_days: 400,
            min_order_amount: -1.0,
            ..Default::default()
        });
        assert!(!form.is_valid());
        assert_eq!(form.messages().len(), 2);

        let form = Form::new(OrderExtraForm {
            contract_number: Some("C-2024-001".to_string()),
            payment_deferral_days: 30,
            min_order_amount: 150.0,
            comment: None,
        });
        assert!(form.is_valid());
    }

    #[test]
    fn test_deserialize_defaults() {
        let extra: OrderExtraForm = serde_json::from_str("{}").unwrap();
        assert_eq!(extra.payment_deferral_days, 0);
        assert_eq!(extra.min_order_amount, 0.0);
        assert!(Form::new(extra).is_valid());
    }

    #[test]
    fn test_from_json_wrong_types() {
        let form = Form::<OrderExtraForm>::from_json(Some(serde_json::json!({
            "payment_deferral_days": -1,
            "comment": "fine",
        })));
        assert!(!form.is_valid());
        assert_eq!(form.messages().len(), 1);
        assert_eq!(
            form.messages()[0].field.as_deref(),
            Some("payment_deferral_days")
        );
        assert_eq!(form.messages()[0].code, 400);

        let form = Form::<BranchForm>::from_json(Some(serde_json::json!({"title": 5})));
        assert!(!form.is_valid());
        assert_eq!(form.messages()[0].field.as_deref(), Some("title"));
    }

    #[test]
    fn test_from_json_not_an_object() {
        let form = Form::<BranchForm>::from_json(Some(serde_json::json!(["Main Office"])));
        assert!(!form.is_valid());
        assert!(form.messages()[0].is_global());
    }

    #[test]
    fn test_from_json_missing_is_empty() {
        assert!(Form::<OrderExtraForm>::from_json(None).is_valid());
        assert!(Form::<OrderExtraForm>::from_json(Some(Value::Null)).is_valid());

        let form = Form::<BranchForm>::from_json(None);
        assert!(!form.is_valid());
        assert_eq!(form.messages()[0].field.as_deref(), Some("title"));

        let form = Form::<BranchForm>::from_json(Some(serde_json::json!({"title": "Depot"})));
        assert!(form.is_valid());
        assert_eq!(form.data().title, "Depot");
    }
}
