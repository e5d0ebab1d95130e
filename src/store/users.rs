// User account operations.

use chrono::Utc;
use rusqlite::{params, Result, Row};

use crate::database::Database;
use crate::models::{NewUser, User, UserUpdate};

use super::{page_offset, Page};

const USER_COLUMNS: &str = "id, email, password_hash, first_name, last_name, student_id, \
     course_section, semester, is_active, created_at, updated_at";

pub(crate) fn row_to_user(row: &Row) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        student_id: row.get(5)?,
        course_section: row.get(6)?,
        semester: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub trait UserStore {
    fn create_user(&self, new: NewUser) -> Result<User>;
    fn user_by_id(&self, id: i64) -> Result<Option<User>>;
    fn user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Newest accounts first; optional case-insensitive substring search
    /// over email, first/last name and student id.
    fn list_users(&self, search: Option<&str>, page: i64, per_page: i64) -> Result<Page<User>>;
    fn all_users(&self) -> Result<Vec<User>>;
    fn update_user(&self, id: i64, update: UserUpdate) -> Result<()>;
    fn set_user_password(&self, id: i64, password_hash: &str) -> Result<()>;
    /// Delete the user's conversations and then the user, as one unit.
    /// Returns the number of conversations removed.
    fn delete_user_cascade(&self, id: i64) -> Result<usize>;
    /// Reassign every conversation owned by `source_id` to `target_id`,
    /// then delete the source user, as one unit. Returns the number of
    /// conversations transferred.
    fn merge_users(&self, source_id: i64, target_id: i64) -> Result<usize>;
}

impl UserStore for Database {
    fn create_user(&self, new: NewUser) -> Result<User> {
        let now = Utc::now();
        let created_at = new.created_at.unwrap_or(now);
        let id = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO users (email, password_hash, first_name, last_name, student_id,
                                    course_section, semester, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9)",
                params![
                    new.email.to_lowercase(),
                    new.password_hash,
                    new.first_name,
                    new.last_name,
                    new.student_id,
                    new.course_section,
                    new.semester,
                    created_at,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };

        Ok(User {
            id,
            email: new.email.to_lowercase(),
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            student_id: new.student_id,
            course_section: new.course_section,
            semester: new.semester,
            is_active: true,
            created_at,
            updated_at: now,
        })
    }

    fn user_by_id(&self, id: i64) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_user)?;
        rows.next().transpose()
    }

    fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))?;
        let mut rows = stmt.query_map(params![email.to_lowercase()], row_to_user)?;
        rows.next().transpose()
    }

    fn list_users(&self, search: Option<&str>, page: i64, per_page: i64) -> Result<Page<User>> {
        let (page, offset) = page_offset(page, per_page);
        let conn = self.conn.lock().unwrap();

        let search_clause = "(email LIKE '%'||?1||'%'
             OR first_name LIKE '%'||?1||'%'
             OR last_name LIKE '%'||?1||'%'
             OR student_id LIKE '%'||?1||'%')";

        let (total, items) = match search {
            Some(term) if !term.is_empty() => {
                let total: i64 = conn.query_row(
                    &format!("SELECT COUNT(*) FROM users WHERE {search_clause}"),
                    params![term],
                    |row| row.get(0),
                )?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE {search_clause}
                     ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
                ))?;
                let rows = stmt.query_map(params![term, per_page, offset], row_to_user)?;
                (total, rows.collect::<Result<Vec<_>>>()?)
            }
            _ => {
                let total: i64 =
                    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
                let mut stmt = conn.prepare(&format!(
                    "SELECT {USER_COLUMNS} FROM users
                     ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2"
                ))?;
                let rows = stmt.query_map(params![per_page, offset], row_to_user)?;
                (total, rows.collect::<Result<Vec<_>>>()?)
            }
        };

        Ok(Page::new(items, page, per_page, total))
    }

    fn all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY email ASC"))?;
        let rows = stmt.query_map([], row_to_user)?;
        rows.collect()
    }

    fn update_user(&self, id: i64, update: UserUpdate) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, student_id = ?4,
                              course_section = ?5, semester = ?6, is_active = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                update.first_name,
                update.last_name,
                update.email.to_lowercase(),
                update.student_id,
                update.course_section,
                update.semester,
                update.is_active,
                Utc::now(),
                id,
            ],
        )?;
        if let Some(password_hash) = update.password_hash {
            tx.execute(
                "UPDATE users SET password_hash = ?1 WHERE id = ?2",
                params![password_hash, id],
            )?;
        }
        tx.commit()
    }

    fn set_user_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![password_hash, Utc::now(), id],
        )?;
        Ok(())
    }

    fn delete_user_cascade(&self, id: i64) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM conversations WHERE user_id = ?1", params![id])?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(removed)
    }

    fn merge_users(&self, source_id: i64, target_id: i64) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let moved = tx.execute(
            "UPDATE conversations SET user_id = ?1 WHERE user_id = ?2",
            params![target_id, source_id],
        )?;
        tx.execute("DELETE FROM users WHERE id = ?1", params![source_id])?;
        tx.commit()?;
        Ok(moved)
    }
}
