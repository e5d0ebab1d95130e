// Admin account operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Result, Row};

use crate::database::Database;
use crate::models::{AdminUser, NewAdmin};

const ADMIN_COLUMNS: &str = "id, email, password_hash, first_name, last_name, \
     is_super_admin, is_active, created_at, last_login";

fn row_to_admin(row: &Row) -> Result<AdminUser> {
    Ok(AdminUser {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
        is_super_admin: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        last_login: row.get(8)?,
    })
}

pub trait AdminStore {
    fn create_admin(&self, new: NewAdmin) -> Result<AdminUser>;
    fn admin_by_id(&self, id: i64) -> Result<Option<AdminUser>>;
    fn admin_by_email(&self, email: &str) -> Result<Option<AdminUser>>;
    fn set_admin_password(&self, id: i64, password_hash: &str) -> Result<()>;
    fn touch_admin_login(&self, id: i64, when: DateTime<Utc>) -> Result<()>;
    fn count_admins(&self) -> Result<i64>;
}

impl AdminStore for Database {
    fn create_admin(&self, new: NewAdmin) -> Result<AdminUser> {
        let now = Utc::now();
        let id = {
            let conn = self.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO admin_users (email, password_hash, first_name, last_name,
                     is_super_admin, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
                params![
                    new.email.to_lowercase(),
                    new.password_hash,
                    new.first_name,
                    new.last_name,
                    new.is_super_admin,
                    now,
                ],
            )?;
            conn.last_insert_rowid()
        };

        Ok(AdminUser {
            id,
            email: new.email.to_lowercase(),
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            is_super_admin: new.is_super_admin,
            is_active: true,
            created_at: now,
            last_login: None,
        })
    }

    fn admin_by_id(&self, id: i64) -> Result<Option<AdminUser>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {ADMIN_COLUMNS} FROM admin_users WHERE id = ?1"))?;
        let mut rows = stmt.query_map(params![id], row_to_admin)?;
        rows.next().transpose()
    }

    fn admin_by_email(&self, email: &str) -> Result<Option<AdminUser>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admin_users WHERE email = ?1"
        ))?;
        let mut rows = stmt.query_map(params![email.to_lowercase()], row_to_admin)?;
        rows.next().transpose()
    }

    fn set_admin_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE admin_users SET password_hash = ?1 WHERE id = ?2",
            params![password_hash, id],
        )?;
        Ok(())
    }

    fn touch_admin_login(&self, id: i64, when: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE admin_users SET last_login = ?1 WHERE id = ?2",
            params![when, id],
        )?;
        Ok(())
    }

    fn count_admins(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM admin_users", [], |row| row.get(0))
    }
}
