use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The logged-in user as returned by the auth endpoints.
///
/// Only the fields the client relies on are typed; anything else the server
/// sends is kept in `extra` so the persisted copy round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    /// "First Last", falling back to the email address when no name is set.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(name), None) | (None, Some(name)) => name.to_string(),
            (None, None) => self.email.clone(),
        }
    }
}

/// Registration form submitted to `auth/register`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_keeps_unknown_fields() {
        let json = r#"{"id":"5ebac534954b54139806c112","email":"fake@example.com","firstName":"Ada","lastName":"Lovelace","role":"admin","isEmailVerified":true,"timezone":"UTC"}"#;
        let user: User = serde_json::from_str(json).expect("Failed to parse user JSON");
        assert_eq!(user.display_name(), "Ada Lovelace");
        assert_eq!(user.role.as_deref(), Some("admin"));
        assert!(user.is_email_verified);
        assert_eq!(user.extra.get("timezone"), Some(&Value::from("UTC")));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["timezone"], "UTC");
        assert_eq!(back["firstName"], "Ada");
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user: User = serde_json::from_str(r#"{"id":"1","email":"a@b.c"}"#).unwrap();
        assert_eq!(user.display_name(), "a@b.c");
        assert!(!user.is_email_verified);
    }

    #[test]
    fn test_new_user_omits_missing_company() {
        let form = NewUser {
            email: "a@b.c".to_string(),
            password: "password1".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            company: None,
        };
        let json = serde_json::to_value(&form).unwrap();
        assert_eq!(json["firstName"], "A");
        assert!(json.get("company").is_none());
    }
}
