// Aggregate queries for the admin dashboard and analytics page.

use chrono::{DateTime, Utc};
use rusqlite::{params, Result};
use serde_json::{json, Value};

use crate::database::Database;

/// Cumulative database counters shown on the dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub total_users: i64,
    pub active_users: i64,
    pub total_conversations: i64,
    pub registered_conversations: i64,
    pub guest_conversations: i64,
    pub total_admins: i64,
}

impl DatabaseStats {
    pub fn to_json(&self) -> Value {
        json!({
            "total_users": self.total_users,
            "active_users": self.active_users,
            "total_conversations": self.total_conversations,
            "registered_conversations": self.registered_conversations,
            "guest_conversations": self.guest_conversations,
            "total_admins": self.total_admins,
        })
    }
}

/// A leaderboard entry: user identity plus conversation count.
#[derive(Debug, Clone)]
pub struct TopUser {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub student_id: String,
    pub conversation_count: i64,
}

impl TopUser {
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "email": self.email,
            "firstName": self.first_name,
            "lastName": self.last_name,
            "studentId": self.student_id,
            "conversation_count": self.conversation_count,
        })
    }
}

pub trait AnalyticsStore {
    fn database_stats(&self) -> Result<DatabaseStats>;
    /// `(day, count)` pairs for conversations since `since`, oldest day first.
    fn conversations_by_day(&self, since: DateTime<Utc>) -> Result<Vec<(String, i64)>>;
    fn top_users(&self, limit: i64) -> Result<Vec<TopUser>>;
    /// `(total, registered, guest)` conversation counts since `since`.
    fn window_counts(&self, since: DateTime<Utc>) -> Result<(i64, i64, i64)>;
}

impl AnalyticsStore for Database {
    fn database_stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn.lock().unwrap();
        let count = |sql: &str| -> Result<i64> { conn.query_row(sql, [], |row| row.get(0)) };

        Ok(DatabaseStats {
            total_users: count("SELECT COUNT(*) FROM users")?,
            active_users: count("SELECT COUNT(*) FROM users WHERE is_active = 1")?,
            total_conversations: count("SELECT COUNT(*) FROM conversations")?,
            registered_conversations: count(
                "SELECT COUNT(*) FROM conversations WHERE is_guest = 0",
            )?,
            guest_conversations: count("SELECT COUNT(*) FROM conversations WHERE is_guest = 1")?,
            total_admins: count("SELECT COUNT(*) FROM admin_users")?,
        })
    }

    fn conversations_by_day(&self, since: DateTime<Utc>) -> Result<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT date(timestamp) AS day, COUNT(*) FROM conversations
             WHERE timestamp >= ?1 GROUP BY day ORDER BY day ASC",
        )?;
        let rows = stmt.query_map(params![since], |row| Ok((row.get(0)?, row.get(1)?)))?;
        rows.collect()
    }

    fn top_users(&self, limit: i64) -> Result<Vec<TopUser>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT u.id, u.email, u.first_name, u.last_name, u.student_id,
                    COUNT(c.id) AS conversation_count
             FROM users u
             JOIN conversations c ON c.user_id = u.id
             GROUP BY u.id
             ORDER BY conversation_count DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(TopUser {
                id: row.get(0)?,
                email: row.get(1)?,
                first_name: row.get(2)?,
                last_name: row.get(3)?,
                student_id: row.get(4)?,
                conversation_count: row.get(5)?,
            })
        })?;
        rows.collect()
    }

    fn window_counts(&self, since: DateTime<Utc>) -> Result<(i64, i64, i64)> {
        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE timestamp >= ?1",
            params![since],
            |row| row.get(0),
        )?;
        let registered: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE timestamp >= ?1 AND is_guest = 0",
            params![since],
            |row| row.get(0),
        )?;
        let guest: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE timestamp >= ?1 AND is_guest = 1",
            params![since],
            |row| row.get(0),
        )?;
        Ok((total, registered, guest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationOwner, GuestInfo, NewConversation, NewUser};
    use crate::store::conversations::ConversationStore;
    use crate::store::testutil::test_db;
    use crate::store::users::UserStore;
    use chrono::Duration;

    fn seed_user(db: &crate::database::Database, email: &str) -> i64 {
        db.create_user(NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            student_id: "S".to_string(),
            course_section: None,
            semester: None,
            created_at: None,
        })
        .unwrap()
        .id
    }

    fn seed_conversation(
        db: &crate::database::Database,
        owner: ConversationOwner,
        age: Duration,
    ) {
        db.insert_conversation(&NewConversation {
            session_id: "s".to_string(),
            question: "q".to_string(),
            answer: "a".to_string(),
            owner,
            timestamp: Some(Utc::now() - age),
        })
        .unwrap();
    }

    fn guest() -> ConversationOwner {
        ConversationOwner::Guest(GuestInfo {
            first_name: "G".to_string(),
            last_name: "V".to_string(),
            student_id: "G1".to_string(),
            email: "g@example.com".to_string(),
            course_section: None,
            semester: None,
        })
    }

    #[test]
    fn stats_count_each_bucket() {
        let (_dir, db) = test_db();
        let user_id = seed_user(&db, "u@example.com");
        seed_conversation(&db, ConversationOwner::Registered(Some(user_id)), Duration::zero());
        seed_conversation(&db, guest(), Duration::zero());
        seed_conversation(&db, guest(), Duration::zero());

        let stats = db.database_stats().unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.total_conversations, 3);
        assert_eq!(stats.registered_conversations, 1);
        assert_eq!(stats.guest_conversations, 2);
        assert_eq!(stats.total_admins, 0);
    }

    #[test]
    fn window_counts_exclude_old_rows() {
        let (_dir, db) = test_db();
        let user_id = seed_user(&db, "u@example.com");
        seed_conversation(&db, ConversationOwner::Registered(Some(user_id)), Duration::zero());
        seed_conversation(&db, guest(), Duration::days(40));

        let since = Utc::now() - Duration::days(30);
        let (total, registered, guest_count) = db.window_counts(since).unwrap();
        assert_eq!(total, 1);
        assert_eq!(registered, 1);
        assert_eq!(guest_count, 0);
    }

    #[test]
    fn by_day_buckets_group_and_sort() {
        let (_dir, db) = test_db();
        seed_conversation(&db, guest(), Duration::zero());
        seed_conversation(&db, guest(), Duration::zero());
        seed_conversation(&db, guest(), Duration::days(1));

        let since = Utc::now() - Duration::days(7);
        let buckets = db.conversations_by_day(since).unwrap();
        assert_eq!(buckets.len(), 2);
        assert!(buckets[0].0 < buckets[1].0);
        assert_eq!(buckets.iter().map(|(_, n)| n).sum::<i64>(), 3);
    }

    #[test]
    fn top_users_ranked_by_conversation_count() {
        let (_dir, db) = test_db();
        let busy = seed_user(&db, "busy@example.com");
        let quiet = seed_user(&db, "quiet@example.com");
        seed_user(&db, "silent@example.com");
        for _ in 0..3 {
            seed_conversation(&db, ConversationOwner::Registered(Some(busy)), Duration::zero());
        }
        seed_conversation(&db, ConversationOwner::Registered(Some(quiet)), Duration::zero());
        // Guests never appear on the leaderboard.
        seed_conversation(&db, guest(), Duration::zero());

        let top = db.top_users(10).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].email, "busy@example.com");
        assert_eq!(top[0].conversation_count, 3);
        assert_eq!(top[1].conversation_count, 1);
    }
}
