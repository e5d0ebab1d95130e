// Password hashing and the session identity snapshot.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::User;

pub const MIN_PASSWORD_LEN: usize = 6;

// Session keys. User-facing identity and admin identity live side by side
// in the same session; logout flushes everything.
pub const USER_INFO_KEY: &str = "user_info";
pub const USER_ID_KEY: &str = "user_id";
pub const SESSION_ID_KEY: &str = "session_id";
pub const SESSION_START_KEY: &str = "session_start";
pub const ADMIN_ID_KEY: &str = "admin_id";
pub const ADMIN_EMAIL_KEY: &str = "admin_email";
pub const ADMIN_NAME_KEY: &str = "admin_name";
pub const SUPER_ADMIN_KEY: &str = "is_super_admin";

/// Hash a password with a fresh random salt (argon2id, PHC string format).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Password(e.to_string()))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash. Unparseable hashes (e.g. rows
/// imported from the legacy store with a foreign hash format) fail closed.
pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Identity fields carried by a browser session, for registered users and
/// guests alike. Field names mirror the legacy session payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionIdentity {
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    #[serde(rename = "studentId")]
    pub student_id: String,
    pub email: String,
    #[serde(rename = "courseSection", default)]
    pub course_section: String,
    #[serde(default)]
    pub semester: String,
    pub is_registered: bool,
}

impl SessionIdentity {
    pub fn registered(user: &User) -> Self {
        SessionIdentity {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            student_id: user.student_id.clone(),
            email: user.email.clone(),
            course_section: user.course_section.clone().unwrap_or_default(),
            semester: user.semester.clone().unwrap_or_default(),
            is_registered: true,
        }
    }
}
