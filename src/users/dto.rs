use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, users::repo_types::User};

/// Body of `POST /users` and `PUT /users/:id`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserPayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Validated input, passed to the store exactly as the client sent it.
#[derive(Debug, PartialEq, Eq)]
pub struct UserInput {
    pub name: String,
    pub email: String,
    pub password: Option<String>,
}

impl UserPayload {
    /// Malformed JSON, non-object bodies and unknown fields are all rejected.
    pub fn parse(body: &[u8]) -> Result<Self, ApiError> {
        serde_json::from_slice(body).map_err(|e| {
            tracing::warn!(error = %e, "invalid JSON body");
            ApiError::Validation("Invalid JSON body".into())
        })
    }

    pub fn validate(self) -> Result<UserInput, ApiError> {
        let name = non_blank(self.name);
        let email = non_blank(self.email);
        match (name, email) {
            (Some(name), Some(email)) => Ok(UserInput {
                name,
                email,
                password: self.password,
            }),
            _ => Err(ApiError::Validation("Name and email are required".into())),
        }
    }
}

// Whitespace-only counts as missing; accepted values are not rewritten.
fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            email: u.email,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_surrounding_whitespace() {
        let input = UserPayload::parse(
            br#"{"name":"  John Doe ","email":"john@example.com","password":"password123"}"#,
        )
        .unwrap()
        .validate()
        .unwrap();
        assert_eq!(
            input,
            UserInput {
                name: "  John Doe ".into(),
                email: "john@example.com".into(),
                password: Some("password123".into()),
            }
        );
    }

    #[test]
    fn password_is_optional() {
        let input = UserPayload::parse(br#"{"name":"a","email":"b"}"#)
            .unwrap()
            .validate()
            .unwrap();
        assert!(input.password.is_none());
    }

    #[test]
    fn rejects_malformed_json() {
        let err = UserPayload::parse(b"{not json").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON body");
    }

    #[test]
    fn rejects_non_object_and_unknown_fields() {
        assert!(UserPayload::parse(b"[1,2,3]").is_err());
        assert!(UserPayload::parse(br#""John""#).is_err());
        assert!(UserPayload::parse(br#"{"name":"a","email":"b","role":"admin"}"#).is_err());
        assert!(UserPayload::parse(br#"{"name":42,"email":"b"}"#).is_err());
    }

    #[test]
    fn null_or_blank_fields_fail_validation() {
        for body in [
            &br#"{"name":null,"email":"x@x.com"}"#[..],
            br#"{"email":"x@x.com"}"#,
            br#"{"name":"John","email":"   "}"#,
        ] {
            let err = UserPayload::parse(body).unwrap().validate().unwrap_err();
            assert_eq!(err.to_string(), "Name and email are required");
        }
    }

    #[test]
    fn response_has_no_password_field() {
        let resp = UserResponse::from(User {
            id: Uuid::new_v4(),
            name: "n".into(),
            email: "e".into(),
            password_hash: Some("hash".into()),
        });
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("hash"));
    }
}
