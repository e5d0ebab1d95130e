// Record types for users, admins and conversations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::SessionIdentity;

/// A registered student account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub course_section: Option<String>,
    pub semester: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn to_json(&self, conversation_count: i64) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "firstName": self.first_name,
            "lastName": self.last_name,
            "studentId": self.student_id,
            "courseSection": self.course_section,
            "semester": self.semester,
            "isActive": self.is_active,
            "createdAt": self.created_at.to_rfc3339(),
            "conversationCount": conversation_count,
        })
    }
}

/// Fields for creating a user row. `created_at` may be supplied by the
/// legacy import; otherwise the store stamps the current time.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub course_section: Option<String>,
    pub semester: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Editable user fields, matching the admin edit form.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: String,
    pub course_section: Option<String>,
    pub semester: Option<String>,
    pub is_active: bool,
    pub password_hash: Option<String>,
}

/// An instructor/operator account, independent of `User`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_super_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl AdminUser {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "firstName": self.first_name,
            "lastName": self.last_name,
            "isSuperAdmin": self.is_super_admin,
            "isActive": self.is_active,
            "createdAt": self.created_at.to_rfc3339(),
            "lastLogin": self.last_login.map(|t| t.to_rfc3339()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAdmin {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_super_admin: bool,
}

/// Denormalized identity snapshot captured when a guest submits the
/// one-time information form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestInfo {
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub email: String,
    pub course_section: Option<String>,
    pub semester: Option<String>,
}

impl GuestInfo {
    pub fn from_identity(identity: &SessionIdentity) -> Self {
        GuestInfo {
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            student_id: identity.student_id.clone(),
            email: identity.email.clone(),
            course_section: none_if_empty(&identity.course_section),
            semester: none_if_empty(&identity.semester),
        }
    }

    fn user_info_json(&self) -> Value {
        json!({
            "firstName": self.first_name,
            "lastName": self.last_name,
            "studentId": self.student_id,
            "email": self.email,
            "courseSection": self.course_section,
            "semester": self.semester,
            "is_registered": false,
        })
    }
}

/// Exactly one identity per conversation: a (possibly cleared) reference to
/// a registered user, or a guest snapshot. The two can never both be
/// authoritative.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationOwner {
    Registered(Option<i64>),
    Guest(GuestInfo),
}

impl ConversationOwner {
    pub fn is_guest(&self) -> bool {
        matches!(self, ConversationOwner::Guest(_))
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            ConversationOwner::Registered(id) => *id,
            ConversationOwner::Guest(_) => None,
        }
    }
}

/// A persisted Q&A exchange.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: i64,
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub owner: ConversationOwner,
    pub timestamp: DateTime<Utc>,
}

impl Conversation {
    /// JSON shape used by the history, admin and API surfaces. For a
    /// registered conversation the caller supplies the joined user row so
    /// the identity block can be filled in.
    pub fn to_json(&self, user: Option<&User>) -> Value {
        let mut value = json!({
            "id": self.id,
            "question": self.question,
            "answer": self.answer,
            "session_id": self.session_id,
            "timestamp": self.timestamp.to_rfc3339(),
            "saved_at": self.timestamp.to_rfc3339(),
            "is_guest": self.owner.is_guest(),
        });

        match &self.owner {
            ConversationOwner::Guest(info) => {
                value["user_info"] = info.user_info_json();
            }
            ConversationOwner::Registered(_) => {
                if let Some(user) = user {
                    value["user_info"] = json!({
                        "firstName": user.first_name,
                        "lastName": user.last_name,
                        "studentId": user.student_id,
                        "email": user.email,
                        "courseSection": user.course_section,
                        "semester": user.semester,
                        "is_registered": true,
                    });
                }
            }
        }

        value
    }
}

#[derive(Debug, Clone)]
pub struct NewConversation {
    pub session_id: String,
    pub question: String,
    pub answer: String,
    pub owner: ConversationOwner,
    pub timestamp: Option<DateTime<Utc>>,
}

pub fn none_if_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest_info() -> GuestInfo {
        GuestInfo {
            first_name: "Grace".into(),
            last_name: "Hopper".into(),
            student_id: "S100".into(),
            email: "grace@example.com".into(),
            course_section: Some("001".into()),
            semester: None,
        }
    }

    #[test]
    fn guest_conversation_carries_snapshot() {
        let conv = Conversation {
            id: 7,
            session_id: "sess".into(),
            question: "q".into(),
            answer: "a".into(),
            owner: ConversationOwner::Guest(guest_info()),
            timestamp: Utc::now(),
        };
        let value = conv.to_json(None);
        assert_eq!(value["is_guest"], true);
        assert_eq!(value["user_info"]["firstName"], "Grace");
        assert_eq!(value["user_info"]["is_registered"], false);
    }

    #[test]
    fn registered_conversation_without_user_row_has_no_identity_block() {
        let conv = Conversation {
            id: 8,
            session_id: "sess".into(),
            question: "q".into(),
            answer: "a".into(),
            owner: ConversationOwner::Registered(None),
            timestamp: Utc::now(),
        };
        let value = conv.to_json(None);
        assert_eq!(value["is_guest"], false);
        assert!(value.get("user_info").is_none());
    }

    #[test]
    fn owner_exposes_exactly_one_identity() {
        let guest = ConversationOwner::Guest(guest_info());
        assert!(guest.is_guest());
        assert_eq!(guest.user_id(), None);

        let registered = ConversationOwner::Registered(Some(3));
        assert!(!registered.is_guest());
        assert_eq!(registered.user_id(), Some(3));
    }
}
