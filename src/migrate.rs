// One-time import of the legacy JSON store into SQL.
//
// The legacy application kept a user map in users_db.json and a
// conversation list in qa_conversations.json. The import runs once per
// database (guarded by an app_state marker), skips users that already
// exist, and tolerates missing optional fields.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use crate::database::Database;
use crate::error::Result;
use crate::models::{none_if_empty, ConversationOwner, GuestInfo, NewConversation, NewUser};
use crate::store::{ConversationStore, UserStore};

const IMPORT_MARKER: &str = "legacy_json_import";
const USERS_FILE: &str = "users_db.json";
const CONVERSATIONS_FILE: &str = "qa_conversations.json";

#[derive(Debug, Default, Deserialize)]
struct LegacyUser {
    #[serde(rename = "firstName", default)]
    first_name: String,
    #[serde(rename = "lastName", default)]
    last_name: String,
    #[serde(rename = "studentId", default)]
    student_id: String,
    #[serde(default)]
    password_hash: String,
    #[serde(rename = "courseSection", default)]
    course_section: String,
    #[serde(default)]
    semester: String,
    #[serde(default)]
    created_at: String,
}

#[derive(Debug, Default, Deserialize)]
struct LegacyUserInfo {
    #[serde(rename = "firstName", default)]
    first_name: String,
    #[serde(rename = "lastName", default)]
    last_name: String,
    #[serde(rename = "studentId", default)]
    student_id: String,
    #[serde(default)]
    email: String,
    #[serde(rename = "courseSection", default)]
    course_section: String,
    #[serde(default)]
    semester: String,
    #[serde(default)]
    is_registered: bool,
}

#[derive(Debug, Deserialize)]
struct LegacyConversation {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    session_id: String,
    #[serde(default)]
    user_info: LegacyUserInfo,
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub users_imported: usize,
    pub conversations_imported: usize,
    pub skipped: bool,
}

/// Import legacy JSON files from `dir` if this database has not imported
/// them before. Safe to call on every startup.
pub fn import_legacy_json(db: &Database, dir: &Path) -> Result<ImportSummary> {
    if db.get_state(IMPORT_MARKER)?.is_some() {
        return Ok(ImportSummary {
            skipped: true,
            ..ImportSummary::default()
        });
    }

    let mut summary = ImportSummary::default();
    let mut user_ids_by_email: HashMap<String, i64> = HashMap::new();

    let users_path = dir.join(USERS_FILE);
    if users_path.exists() {
        tracing::info!("Migrating users from {}", users_path.display());
        let raw = fs::read_to_string(&users_path)?;
        let users: HashMap<String, LegacyUser> = serde_json::from_str(&raw)?;

        for (email, legacy) in users {
            let email = email.trim().to_lowercase();
            if let Some(existing) = db.user_by_email(&email)? {
                user_ids_by_email.insert(email, existing.id);
                continue;
            }

            let user = db.create_user(NewUser {
                email: email.clone(),
                password_hash: legacy.password_hash,
                first_name: legacy.first_name,
                last_name: legacy.last_name,
                student_id: legacy.student_id,
                course_section: none_if_empty(&legacy.course_section),
                semester: none_if_empty(&legacy.semester),
                created_at: parse_legacy_timestamp(&legacy.created_at),
            })?;
            user_ids_by_email.insert(email, user.id);
            summary.users_imported += 1;
        }
        tracing::info!("Migrated {} users", summary.users_imported);
    }

    let conversations_path = dir.join(CONVERSATIONS_FILE);
    if conversations_path.exists() {
        tracing::info!(
            "Migrating conversations from {}",
            conversations_path.display()
        );
        let raw = fs::read_to_string(&conversations_path)?;
        let conversations: Vec<LegacyConversation> = serde_json::from_str(&raw)?;

        for legacy in conversations {
            let owner = if legacy.user_info.is_registered {
                let email = legacy.user_info.email.trim().to_lowercase();
                ConversationOwner::Registered(user_ids_by_email.get(&email).copied())
            } else {
                ConversationOwner::Guest(GuestInfo {
                    first_name: legacy.user_info.first_name,
                    last_name: legacy.user_info.last_name,
                    student_id: legacy.user_info.student_id,
                    email: legacy.user_info.email,
                    course_section: none_if_empty(&legacy.user_info.course_section),
                    semester: none_if_empty(&legacy.user_info.semester),
                })
            };

            db.insert_conversation(&NewConversation {
                session_id: legacy.session_id,
                question: legacy.question,
                answer: legacy.answer,
                owner,
                timestamp: parse_legacy_timestamp(&legacy.timestamp),
            })?;
            summary.conversations_imported += 1;
        }
        tracing::info!("Migrated {} conversations", summary.conversations_imported);
    }

    db.set_state(IMPORT_MARKER, "done")?;
    Ok(summary)
}

/// Legacy timestamps are Python isoformat strings, with or without an
/// offset. Unparseable values fall back to the insert-time default.
fn parse_legacy_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::test_db;
    use serde_json::json;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join(USERS_FILE),
            json!({
                "ada@example.com": {
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "studentId": "S100",
                    "email": "ada@example.com",
                    "password_hash": "pbkdf2:sha256:legacy",
                    "courseSection": "001",
                    "semester": "Fall 2024",
                    "created_at": "2024-09-01T10:00:00"
                },
                // Optional fields missing entirely.
                "min@example.com": {
                    "firstName": "Min",
                    "lastName": "Imal",
                    "studentId": "S200",
                    "password_hash": "hash"
                }
            })
            .to_string(),
        )
        .unwrap();

        fs::write(
            dir.join(CONVERSATIONS_FILE),
            json!([
                {
                    "id": 1,
                    "question": "what is pip?",
                    "answer": "a package manager",
                    "timestamp": "2024-09-02T11:30:00",
                    "session_id": "legacy-session",
                    "user_info": {
                        "firstName": "Ada",
                        "lastName": "Lovelace",
                        "studentId": "S100",
                        "email": "Ada@Example.com",
                        "is_registered": true
                    }
                },
                {
                    "id": 2,
                    "question": "guest question",
                    "answer": "guest answer",
                    "timestamp": "not a timestamp",
                    "session_id": "legacy-session",
                    "user_info": {
                        "firstName": "Gus",
                        "lastName": "Guest",
                        "studentId": "G1",
                        "email": "gus@example.com",
                        "is_registered": false
                    }
                }
            ])
            .to_string(),
        )
        .unwrap();
    }

    #[test]
    fn imports_users_and_conversations_once() {
        let (dir, db) = test_db();
        write_fixture(dir.path());

        let summary = import_legacy_json(&db, dir.path()).unwrap();
        assert_eq!(summary.users_imported, 2);
        assert_eq!(summary.conversations_imported, 2);
        assert!(!summary.skipped);

        // Registered conversation linked by case-folded email.
        let ada = db.user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(db.count_for_user(ada.id).unwrap(), 1);
        assert_eq!(ada.course_section.as_deref(), Some("001"));

        let minimal = db.user_by_email("min@example.com").unwrap().unwrap();
        assert_eq!(minimal.semester, None);

        // Second run is a no-op.
        let again = import_legacy_json(&db, dir.path()).unwrap();
        assert!(again.skipped);
        assert_eq!(db.count_for_user(ada.id).unwrap(), 1);
    }

    #[test]
    fn existing_users_are_not_duplicated() {
        let (dir, db) = test_db();
        write_fixture(dir.path());
        db.create_user(crate::models::NewUser {
            email: "ada@example.com".to_string(),
            password_hash: "already-here".to_string(),
            first_name: "Ada".to_string(),
            last_name: "L".to_string(),
            student_id: "S100".to_string(),
            course_section: None,
            semester: None,
            created_at: None,
        })
        .unwrap();

        let summary = import_legacy_json(&db, dir.path()).unwrap();
        assert_eq!(summary.users_imported, 1);

        let ada = db.user_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(ada.password_hash, "already-here");
        // Her legacy conversation still linked to the pre-existing row.
        assert_eq!(db.count_for_user(ada.id).unwrap(), 1);
    }

    #[test]
    fn missing_files_complete_with_zero_counts() {
        let (dir, db) = test_db();
        let summary = import_legacy_json(&db, dir.path()).unwrap();
        assert_eq!(summary, ImportSummary { users_imported: 0, conversations_imported: 0, skipped: false });
    }

    #[test]
    fn legacy_timestamp_formats() {
        assert!(parse_legacy_timestamp("2024-09-01T10:00:00").is_some());
        assert!(parse_legacy_timestamp("2024-09-01T10:00:00.123456").is_some());
        assert!(parse_legacy_timestamp("2024-09-01T10:00:00+00:00").is_some());
        assert!(parse_legacy_timestamp("nonsense").is_none());
        assert!(parse_legacy_timestamp("").is_none());
    }
}
