use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "ts", ts(type = "string | null"))]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// First name for greetings, falling back to the email's local part
    pub fn display_name(&self) -> &str {
        let name = self.name.trim();
        if let Some(first) = name.split_whitespace().next() {
            first
        } else {
            self.email.split('@').next().unwrap_or(&self.email)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_auth_response() {
        let json = r#"{"token":"abc123","user":{"id":"u1","name":"Ada Lovelace","email":"ada@example.com","createdAt":"2024-03-01T12:00:00Z"}}"#;
        let resp: AuthResponse = serde_json::from_str(json).expect("Failed to parse auth JSON");
        assert_eq!(resp.token, "abc123");
        assert_eq!(resp.user.id, "u1");
        assert!(resp.user.created_at.is_some());
    }

    #[test]
    fn test_user_without_created_at() {
        let json = r#"{"id":"u1","name":"Ada","email":"ada@example.com"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.created_at, None);
        assert!(!serde_json::to_string(&user).unwrap().contains("createdAt"));
    }

    #[test]
    fn test_display_name() {
        let mut user = User {
            id: "u1".to_string(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            created_at: None,
        };
        assert_eq!(user.display_name(), "Ada");

        user.name = "  ".to_string();
        assert_eq!(user.display_name(), "ada");
    }
}
