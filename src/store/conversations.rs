// Conversation persistence and queries.

use chrono::{DateTime, Utc};
use rusqlite::{params, Result, Row};

use crate::database::Database;
use crate::models::{Conversation, ConversationOwner, GuestInfo, NewConversation};

use super::{page_offset, Page};

const CONVERSATION_COLUMNS: &str = "id, user_id, session_id, question, answer, \
     guest_first_name, guest_last_name, guest_student_id, guest_email, \
     guest_course_section, guest_semester, is_guest, timestamp";

/// Subset restriction for the admin conversation listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConversationFilter {
    All,
    Registered,
    Guest,
}

impl ConversationFilter {
    pub fn parse(value: &str) -> Self {
        match value {
            "registered" => ConversationFilter::Registered,
            "guest" => ConversationFilter::Guest,
            _ => ConversationFilter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationFilter::All => "all",
            ConversationFilter::Registered => "registered",
            ConversationFilter::Guest => "guest",
        }
    }

    fn clause(&self) -> Option<&'static str> {
        match self {
            ConversationFilter::All => None,
            ConversationFilter::Registered => Some("is_guest = 0"),
            ConversationFilter::Guest => Some("is_guest = 1"),
        }
    }
}

/// Flat row for the CSV export: the conversation plus the owning user's
/// email and student id when the owner reference still resolves.
#[derive(Debug, Clone)]
pub struct ConversationExportRow {
    pub conversation: Conversation,
    pub user_email: Option<String>,
    pub user_student_id: Option<String>,
}

pub(crate) fn row_to_conversation(row: &Row) -> Result<Conversation> {
    let is_guest: bool = row.get(11)?;
    let owner = if is_guest {
        ConversationOwner::Guest(GuestInfo {
            first_name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            last_name: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            student_id: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            email: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            course_section: row.get(9)?,
            semester: row.get(10)?,
        })
    } else {
        ConversationOwner::Registered(row.get(1)?)
    };

    Ok(Conversation {
        id: row.get(0)?,
        session_id: row.get(2)?,
        question: row.get(3)?,
        answer: row.get(4)?,
        owner,
        timestamp: row.get(12)?,
    })
}

pub trait ConversationStore {
    fn insert_conversation(&self, new: &NewConversation) -> Result<i64>;
    fn conversation_by_id(&self, id: i64) -> Result<Option<Conversation>>;
    /// A conversation only if it is owned by the given registered user.
    fn conversation_for_user(&self, id: i64, user_id: i64) -> Result<Option<Conversation>>;
    /// Newest first; search narrows over question/answer before pagination,
    /// the filter restricts to guest or registered subsets.
    fn list_conversations(
        &self,
        filter: ConversationFilter,
        search: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Conversation>>;
    fn conversations_for_user(&self, user_id: i64, page: i64, per_page: i64)
        -> Result<Page<Conversation>>;
    fn all_conversations_for_user(&self, user_id: i64) -> Result<Vec<Conversation>>;
    fn all_conversations(&self) -> Result<Vec<Conversation>>;
    fn export_conversation_rows(&self) -> Result<Vec<ConversationExportRow>>;
    fn update_conversation(
        &self,
        id: i64,
        question: &str,
        answer: &str,
        guest: Option<&GuestInfo>,
    ) -> Result<()>;
    fn delete_conversation(&self, id: i64) -> Result<()>;
    fn count_for_user(&self, user_id: i64) -> Result<i64>;
    fn count_for_user_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64>;
    fn latest_for_user(&self, user_id: i64) -> Result<Option<Conversation>>;
}

impl ConversationStore for Database {
    fn insert_conversation(&self, new: &NewConversation) -> Result<i64> {
        let timestamp = new.timestamp.unwrap_or_else(Utc::now);
        let (user_id, guest) = match &new.owner {
            ConversationOwner::Registered(user_id) => (*user_id, None),
            ConversationOwner::Guest(info) => (None, Some(info)),
        };

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO conversations (user_id, session_id, question, answer,
                 guest_first_name, guest_last_name, guest_student_id, guest_email,
                 guest_course_section, guest_semester, is_guest, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                user_id,
                new.session_id,
                new.question,
                new.answer,
                guest.map(|g| g.first_name.as_str()),
                guest.map(|g| g.last_name.as_str()),
                guest.map(|g| g.student_id.as_str()),
                guest.map(|g| g.email.as_str()),
                guest.and_then(|g| g.course_section.as_deref()),
                guest.and_then(|g| g.semester.as_deref()),
                guest.is_some(),
                timestamp,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn conversation_by_id(&self, id: i64) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], row_to_conversation)?;
        rows.next().transpose()
    }

    fn conversation_for_user(&self, id: i64, user_id: i64) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1 AND user_id = ?2"
        ))?;
        let mut rows = stmt.query_map(params![id, user_id], row_to_conversation)?;
        rows.next().transpose()
    }

    fn list_conversations(
        &self,
        filter: ConversationFilter,
        search: Option<&str>,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Conversation>> {
        let (page, offset) = page_offset(page, per_page);
        let conn = self.conn.lock().unwrap();

        let mut clauses: Vec<&str> = Vec::new();
        if let Some(clause) = filter.clause() {
            clauses.push(clause);
        }
        let search_term = search.filter(|s| !s.is_empty());
        if search_term.is_some() {
            clauses.push("(question LIKE '%'||?1||'%' OR answer LIKE '%'||?1||'%')");
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let (total, items) = match search_term {
            Some(term) => {
                let total: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM conversations {where_sql}"),
                    params![term],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations {where_sql}
                     ORDER BY timestamp DESC, id DESC LIMIT ?2 OFFSET ?3"
                ))?;
                let rows = stmt.query_map(params![term, per_page, offset], row_to_conversation)?;
                (total, rows.collect::<Result<Vec<_>>>()?)
            }
            None => {
                let total: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM conversations {where_sql}"),
                    [],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations {where_sql}
                     ORDER BY timestamp DESC, id DESC LIMIT ?1 OFFSET ?2"
                ))?;
                let rows = stmt.query_map(params![per_page, offset], row_to_conversation)?;
                (total, rows.collect::<Result<Vec<_>>>()?)
            }
        };

        Ok(Page::new(items, page, per_page, total))
    }

    fn conversations_for_user(
        &self,
        user_id: i64,
        page: i64,
        per_page: i64,
    ) -> Result<Page<Conversation>> {
        let (page, offset) = page_offset(page, per_page);
        let conn = self.conn.lock().unwrap();

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![user_id, per_page, offset], row_to_conversation)?;
        let items = rows.collect::<Result<Vec<_>>>()?;

        Ok(Page::new(items, page, per_page, total))
    }

    fn all_conversations_for_user(&self, user_id: i64) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_conversation)?;
        rows.collect()
    }

    fn all_conversations(&self) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map([], row_to_conversation)?;
        rows.collect()
    }

    fn export_conversation_rows(&self) -> Result<Vec<ConversationExportRow>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT c.id, c.user_id, c.session_id, c.question, c.answer,
                    c.guest_first_name, c.guest_last_name, c.guest_student_id, c.guest_email,
                    c.guest_course_section, c.guest_semester, c.is_guest, c.timestamp,
                    u.email, u.student_id
             FROM conversations c
             LEFT JOIN users u ON u.id = c.user_id
             ORDER BY c.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ConversationExportRow {
                conversation: row_to_conversation(row)?,
                user_email: row.get(13)?,
                user_student_id: row.get(14)?,
            })
        })?;
        rows.collect()
    }

    fn update_conversation(
        &self,
        id: i64,
        question: &str,
        answer: &str,
        guest: Option<&GuestInfo>,
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE conversations SET question = ?1, answer = ?2 WHERE id = ?3",
            params![question, answer, id],
        )?;
        if let Some(info) = guest {
            tx.execute(
                "UPDATE conversations SET guest_first_name = ?1, guest_last_name = ?2,
                     guest_student_id = ?3, guest_email = ?4, guest_course_section = ?5,
                     guest_semester = ?6
                 WHERE id = ?7 AND is_guest = 1",
                params![
                    info.first_name,
                    info.last_name,
                    info.student_id,
                    info.email,
                    info.course_section,
                    info.semester,
                    id,
                ],
            )?;
        }
        tx.commit()
    }

    fn delete_conversation(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
    }

    fn count_for_user_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE user_id = ?1 AND timestamp >= ?2",
            params![user_id, since],
            |row| row.get(0),
        )
    }

    fn latest_for_user(&self, user_id: i64) -> Result<Option<Conversation>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![user_id], row_to_conversation)?;
        rows.next().transpose()
    }
}
