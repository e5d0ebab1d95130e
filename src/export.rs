// CSV export and JSON backup.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use crate::database::Database;
use crate::error::Result;
use crate::models::{ConversationOwner, User};
use crate::store::{ConversationExportRow, ConversationStore, UserStore};

pub const USERS_CSV_COLUMNS: [&str; 9] = [
    "ID",
    "Email",
    "First Name",
    "Last Name",
    "Student ID",
    "Course Section",
    "Semester",
    "Created At",
    "Conversation Count",
];

pub const CONVERSATIONS_CSV_COLUMNS: [&str; 8] = [
    "ID",
    "User Email",
    "Student ID",
    "Question",
    "Answer",
    "Timestamp",
    "Is Guest",
    "Session ID",
];

fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_row(fields: &[String]) -> String {
    let escaped: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
    format!("{}\r\n", escaped.join(","))
}

/// The full unfiltered user set with per-user conversation counts.
pub fn users_csv(rows: &[(User, i64)]) -> String {
    let mut out = csv_row(&USERS_CSV_COLUMNS.map(String::from));
    for (user, conversation_count) in rows {
        out.push_str(&csv_row(&[
            user.id.to_string(),
            user.email.clone(),
            user.first_name.clone(),
            user.last_name.clone(),
            user.student_id.clone(),
            user.course_section.clone().unwrap_or_default(),
            user.semester.clone().unwrap_or_default(),
            format_timestamp(&user.created_at),
            conversation_count.to_string(),
        ]));
    }
    out
}

/// The full unfiltered conversation set, identity columns filled from the
/// guest snapshot or the joined user row.
pub fn conversations_csv(rows: &[ConversationExportRow]) -> String {
    let mut out = csv_row(&CONVERSATIONS_CSV_COLUMNS.map(String::from));
    for row in rows {
        let conv = &row.conversation;
        let (user_email, student_id) = match &conv.owner {
            ConversationOwner::Guest(info) => (
                if info.email.is_empty() {
                    "Guest".to_string()
                } else {
                    info.email.clone()
                },
                if info.student_id.is_empty() {
                    "N/A".to_string()
                } else {
                    info.student_id.clone()
                },
            ),
            ConversationOwner::Registered(_) => (
                row.user_email.clone().unwrap_or_else(|| "N/A".to_string()),
                row.user_student_id
                    .clone()
                    .unwrap_or_else(|| "N/A".to_string()),
            ),
        };

        out.push_str(&csv_row(&[
            conv.id.to_string(),
            user_email,
            student_id,
            conv.question.clone(),
            conv.answer.clone(),
            format_timestamp(&conv.timestamp),
            if conv.owner.is_guest() { "Yes" } else { "No" }.to_string(),
            conv.session_id.clone(),
        ]));
    }
    out
}

/// Write timestamped JSON snapshots of the user and conversation tables.
/// Returns the two file paths.
pub fn backup_to_json(db: &Database, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");

    let mut users_data = Map::new();
    for user in db.all_users()? {
        let count = db.count_for_user(user.id)?;
        users_data.insert(user.email.clone(), user.to_json(count));
    }
    let users_path = dir.join(format!("backup_users_{stamp}.json"));
    fs::write(&users_path, serde_json::to_string_pretty(&users_data)?)?;

    let mut conversations_data = Vec::new();
    for conv in db.all_conversations()? {
        let user = match conv.owner.user_id() {
            Some(user_id) => db.user_by_id(user_id)?,
            None => None,
        };
        conversations_data.push(conv.to_json(user.as_ref()));
    }
    let conversations_path = dir.join(format!("backup_conversations_{stamp}.json"));
    fs::write(
        &conversations_path,
        serde_json::to_string_pretty(&json!(conversations_data))?,
    )?;

    tracing::info!(
        "Backup created: {}, {}",
        users_path.display(),
        conversations_path.display()
    );
    Ok((users_path, conversations_path))
}
