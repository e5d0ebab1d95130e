// Admin routes: login, dashboard, listings, analytics, exports, mutations.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;

use crate::auth::{self, MIN_PASSWORD_LEN};
use crate::error::AppError;
use crate::export;
use crate::models::{none_if_empty, GuestInfo, UserUpdate};
use crate::store::{AdminStore, AnalyticsStore, ConversationFilter, ConversationStore, UserStore};

use super::{html, AppState};

const PER_PAGE: i64 = 20;
const RECENT_LIMIT: i64 = 10;
const TOP_USERS_LIMIT: i64 = 10;

type HandlerResult = Result<Response, AppError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_form).post(login_submit))
        .route("/logout", get(logout))
        .route("/dashboard", get(dashboard))
        .route("/users", get(list_users))
        .route("/users/merge", get(merge_form).post(merge_submit))
        .route("/users/{id}", get(user_detail))
        .route("/users/{id}/edit", get(edit_user_form).post(edit_user_submit))
        .route("/users/{id}/delete", post(delete_user))
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{id}/edit",
            get(edit_conversation_form).post(edit_conversation_submit),
        )
        .route("/conversations/{id}/delete", post(delete_conversation))
        .route("/analytics", get(analytics))
        .route("/export/users", get(export_users))
        .route("/export/conversations", get(export_conversations))
        .route("/backup", get(backup))
        .route("/api/stats", get(api_stats))
}

/// Admin authentication gate. Unauthenticated requests are sent to the
/// admin login page.
async fn require_admin(session: &Session) -> Result<Option<i64>, AppError> {
    Ok(session.get::<i64>(auth::ADMIN_ID_KEY).await?)
}

macro_rules! admin_guard {
    ($session:expr) => {
        match require_admin(&$session).await? {
            Some(admin_id) => admin_id,
            None => return Ok(Redirect::to("/admin/login").into_response()),
        }
    };
}

fn not_found(message: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Not found", "message": message, "status": 404})),
    )
        .into_response()
}

fn flash_ok(message: String) -> Response {
    Json(json!({"success": true, "message": message})).into_response()
}

fn flash_error(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"success": false, "message": message})),
    )
        .into_response()
}

async fn login_form() -> Html<String> {
    Html(html::admin_login_page(None))
}

#[derive(Deserialize)]
struct AdminLoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<AdminLoginForm>,
) -> HandlerResult {
    let email = form.email.trim().to_lowercase();

    if let Some(admin) = state.db.admin_by_email(&email)? {
        if admin.is_active && auth::verify_password(&admin.password_hash, &form.password) {
            session.insert(auth::ADMIN_ID_KEY, admin.id).await?;
            session.insert(auth::ADMIN_EMAIL_KEY, &admin.email).await?;
            session.insert(auth::ADMIN_NAME_KEY, &admin.first_name).await?;
            session
                .insert(auth::SUPER_ADMIN_KEY, admin.is_super_admin)
                .await?;
            state.db.touch_admin_login(admin.id, Utc::now())?;
            tracing::info!("Admin logged in: {}", admin.email);
            return Ok(Redirect::to("/admin/dashboard").into_response());
        }
    }

    Ok(Html(html::admin_login_page(Some("Invalid credentials"))).into_response())
}

async fn logout(session: Session) -> HandlerResult {
    session.flush().await?;
    Ok(Redirect::to("/admin/login").into_response())
}

async fn dashboard(State(state): State<AppState>, session: Session) -> HandlerResult {
    admin_guard!(session);

    let stats = state.db.database_stats()?;
    let recent_conversations = state
        .db
        .list_conversations(ConversationFilter::All, None, 1, RECENT_LIMIT)?;
    let recent_users = state.db.list_users(None, 1, RECENT_LIMIT)?;

    let mut conversations = Vec::new();
    for conv in &recent_conversations.items {
        let user = match conv.owner.user_id() {
            Some(user_id) => state.db.user_by_id(user_id)?,
            None => None,
        };
        conversations.push(conv.to_json(user.as_ref()));
    }
    let mut users = Vec::new();
    for user in &recent_users.items {
        users.push(user.to_json(state.db.count_for_user(user.id)?));
    }

    Ok(Json(json!({
        "stats": stats.to_json(),
        "recent_conversations": conversations,
        "recent_users": users,
    }))
    .into_response())
}

#[derive(Deserialize)]
struct UserListQuery {
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    page: Option<i64>,
}

async fn list_users(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<UserListQuery>,
) -> HandlerResult {
    admin_guard!(session);

    let search = query.search.as_deref().unwrap_or("");
    let page = state
        .db
        .list_users(Some(search).filter(|s| !s.is_empty()), query.page.unwrap_or(1), PER_PAGE)?;

    let mut users = Vec::new();
    for user in &page.items {
        users.push(user.to_json(state.db.count_for_user(user.id)?));
    }

    Ok(Json(json!({
        "users": users,
        "pagination": page.pagination_json(),
        "search": search,
    }))
    .into_response())
}

#[derive(Deserialize)]
struct PageQuery {
    #[serde(default)]
    page: Option<i64>,
}

async fn user_detail(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> HandlerResult {
    admin_guard!(session);

    let Some(user) = state.db.user_by_id(user_id)? else {
        return Ok(not_found(format!("User {user_id} not found")));
    };

    let page = state
        .db
        .conversations_for_user(user.id, query.page.unwrap_or(1), PER_PAGE)?;
    let conversations: Vec<_> = page
        .items
        .iter()
        .map(|conv| conv.to_json(Some(&user)))
        .collect();

    Ok(Json(json!({
        "user": user.to_json(state.db.count_for_user(user.id)?),
        "conversations": conversations,
        "pagination": page.pagination_json(),
    }))
    .into_response())
}

async fn edit_user_form(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> HandlerResult {
    admin_guard!(session);

    match state.db.user_by_id(user_id)? {
        Some(user) => {
            let count = state.db.count_for_user(user.id)?;
            Ok(Json(json!({"user": user.to_json(count)})).into_response())
        }
        None => Ok(not_found(format!("User {user_id} not found"))),
    }
}

#[derive(Deserialize)]
struct EditUserForm {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    student_id: String,
    #[serde(default)]
    course_section: String,
    #[serde(default)]
    semester: String,
    /// Checkbox: present as "on" when checked.
    #[serde(default)]
    is_active: Option<String>,
    #[serde(default)]
    new_password: String,
}

async fn edit_user_submit(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
    Form(form): Form<EditUserForm>,
) -> HandlerResult {
    admin_guard!(session);

    if state.db.user_by_id(user_id)?.is_none() {
        return Ok(not_found(format!("User {user_id} not found")));
    }

    let new_password = form.new_password.trim();
    let password_hash = if new_password.is_empty() {
        None
    } else {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Ok(flash_error(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        Some(auth::hash_password(new_password)?)
    };

    let update = UserUpdate {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_lowercase(),
        student_id: form.student_id.trim().to_string(),
        course_section: none_if_empty(&form.course_section),
        semester: none_if_empty(&form.semester),
        is_active: form.is_active.as_deref() == Some("on"),
        password_hash,
    };

    match state.db.update_user(user_id, update) {
        Ok(()) => Ok(flash_ok("User updated successfully!".to_string())),
        Err(e) => Ok(flash_error(format!("Error updating user: {e}"))),
    }
}

async fn delete_user(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> HandlerResult {
    admin_guard!(session);

    let Some(user) = state.db.user_by_id(user_id)? else {
        return Ok(not_found(format!("User {user_id} not found")));
    };

    match state.db.delete_user_cascade(user.id) {
        Ok(_) => Ok(flash_ok(format!("User {} deleted successfully!", user.email))),
        Err(e) => Ok(flash_error(format!("Error deleting user: {e}"))),
    }
}

async fn merge_form(State(state): State<AppState>, session: Session) -> HandlerResult {
    admin_guard!(session);

    let users: Vec<_> = state
        .db
        .all_users()?
        .iter()
        .map(|u| json!({"id": u.id, "email": u.email}))
        .collect();
    Ok(Json(json!({"users": users})).into_response())
}

#[derive(Deserialize)]
struct MergeForm {
    #[serde(default)]
    source_user_id: Option<i64>,
    #[serde(default)]
    target_user_id: Option<i64>,
}

async fn merge_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<MergeForm>,
) -> HandlerResult {
    admin_guard!(session);

    let (Some(source_id), Some(target_id)) = (form.source_user_id, form.target_user_id) else {
        return Ok(flash_error("Please select both users to merge".to_string()));
    };
    if source_id == target_id {
        return Ok(flash_error(
            "Cannot merge a user with themselves".to_string(),
        ));
    }

    // Both accounts must exist before anything is touched.
    let Some(source) = state.db.user_by_id(source_id)? else {
        return Ok(not_found(format!("User {source_id} not found")));
    };
    let Some(target) = state.db.user_by_id(target_id)? else {
        return Ok(not_found(format!("User {target_id} not found")));
    };

    match state.db.merge_users(source.id, target.id) {
        Ok(transferred) => Ok(flash_ok(format!(
            "Successfully merged {} into {}. {} conversations transferred.",
            source.email, target.email, transferred
        ))),
        Err(e) => Ok(flash_error(format!("Error merging users: {e}"))),
    }
}

#[derive(Deserialize)]
struct ConversationListQuery {
    #[serde(default)]
    search: Option<String>,
    #[serde(default)]
    filter: Option<String>,
    #[serde(default)]
    page: Option<i64>,
}

async fn list_conversations(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<ConversationListQuery>,
) -> HandlerResult {
    admin_guard!(session);

    let filter = ConversationFilter::parse(query.filter.as_deref().unwrap_or("all"));
    let search = query.search.as_deref().unwrap_or("");
    let page = state.db.list_conversations(
        filter,
        Some(search).filter(|s| !s.is_empty()),
        query.page.unwrap_or(1),
        PER_PAGE,
    )?;

    let mut conversations = Vec::new();
    for conv in &page.items {
        let user = match conv.owner.user_id() {
            Some(user_id) => state.db.user_by_id(user_id)?,
            None => None,
        };
        conversations.push(conv.to_json(user.as_ref()));
    }

    Ok(Json(json!({
        "conversations": conversations,
        "pagination": page.pagination_json(),
        "search": search,
        "filter": filter.as_str(),
    }))
    .into_response())
}

async fn edit_conversation_form(
    State(state): State<AppState>,
    session: Session,
    Path(conv_id): Path<i64>,
) -> HandlerResult {
    admin_guard!(session);

    match state.db.conversation_by_id(conv_id)? {
        Some(conv) => {
            let user = match conv.owner.user_id() {
                Some(user_id) => state.db.user_by_id(user_id)?,
                None => None,
            };
            Ok(Json(json!({"conversation": conv.to_json(user.as_ref())})).into_response())
        }
        None => Ok(not_found(format!("Conversation {conv_id} not found"))),
    }
}

#[derive(Deserialize)]
struct EditConversationForm {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    guest_first_name: String,
    #[serde(default)]
    guest_last_name: String,
    #[serde(default)]
    guest_student_id: String,
    #[serde(default)]
    guest_email: String,
    #[serde(default)]
    guest_course_section: String,
    #[serde(default)]
    guest_semester: String,
}

async fn edit_conversation_submit(
    State(state): State<AppState>,
    session: Session,
    Path(conv_id): Path<i64>,
    Form(form): Form<EditConversationForm>,
) -> HandlerResult {
    admin_guard!(session);

    let Some(conv) = state.db.conversation_by_id(conv_id)? else {
        return Ok(not_found(format!("Conversation {conv_id} not found")));
    };

    let guest = if conv.owner.is_guest() {
        Some(GuestInfo {
            first_name: form.guest_first_name.trim().to_string(),
            last_name: form.guest_last_name.trim().to_string(),
            student_id: form.guest_student_id.trim().to_string(),
            email: form.guest_email.trim().to_string(),
            course_section: none_if_empty(&form.guest_course_section),
            semester: none_if_empty(&form.guest_semester),
        })
    } else {
        None
    };

    match state.db.update_conversation(
        conv.id,
        form.question.trim(),
        form.answer.trim(),
        guest.as_ref(),
    ) {
        Ok(()) => Ok(flash_ok("Conversation updated successfully!".to_string())),
        Err(e) => Ok(flash_error(format!("Error updating conversation: {e}"))),
    }
}

async fn delete_conversation(
    State(state): State<AppState>,
    session: Session,
    Path(conv_id): Path<i64>,
) -> HandlerResult {
    admin_guard!(session);

    if state.db.conversation_by_id(conv_id)?.is_none() {
        return Ok(not_found(format!("Conversation {conv_id} not found")));
    }

    match state.db.delete_conversation(conv_id) {
        Ok(()) => Ok(flash_ok("Conversation deleted successfully!".to_string())),
        Err(e) => Ok(flash_error(format!("Error deleting conversation: {e}"))),
    }
}

#[derive(Deserialize)]
struct AnalyticsQuery {
    #[serde(default)]
    days: Option<i64>,
}

async fn analytics(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<AnalyticsQuery>,
) -> HandlerResult {
    admin_guard!(session);

    let days = query.days.unwrap_or(30).max(1);
    let since = Utc::now() - Duration::days(days);

    let by_date: Vec<_> = state
        .db
        .conversations_by_day(since)?
        .into_iter()
        .map(|(date, count)| json!({"date": date, "count": count}))
        .collect();
    let top_users: Vec<_> = state
        .db
        .top_users(TOP_USERS_LIMIT)?
        .iter()
        .map(|u| u.to_json())
        .collect();
    let (total, registered, guest) = state.db.window_counts(since)?;

    Ok(Json(json!({
        "conversations_by_date": by_date,
        "top_users": top_users,
        "total_conversations": total,
        "registered_count": registered,
        "guest_count": guest,
        "days": days,
    }))
    .into_response())
}

fn csv_response(filename: String, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        body,
    )
        .into_response()
}

async fn export_users(State(state): State<AppState>, session: Session) -> HandlerResult {
    admin_guard!(session);

    let mut rows = Vec::new();
    for user in state.db.all_users()? {
        let count = state.db.count_for_user(user.id)?;
        rows.push((user, count));
    }
    let body = export::users_csv(&rows);
    let filename = format!("users_{}.csv", Utc::now().format("%Y%m%d"));
    Ok(csv_response(filename, body))
}

async fn export_conversations(State(state): State<AppState>, session: Session) -> HandlerResult {
    admin_guard!(session);

    let rows = state.db.export_conversation_rows()?;
    let body = export::conversations_csv(&rows);
    let filename = format!("conversations_{}.csv", Utc::now().format("%Y%m%d"));
    Ok(csv_response(filename, body))
}

async fn backup(State(state): State<AppState>, session: Session) -> HandlerResult {
    admin_guard!(session);

    match export::backup_to_json(&state.db, &state.backup_dir) {
        Ok((users_path, conversations_path)) => Ok(flash_ok(format!(
            "Backup created successfully! ({}, {})",
            users_path.display(),
            conversations_path.display()
        ))),
        Err(e) => Ok(flash_error(format!("Backup failed: {e}"))),
    }
}

async fn api_stats(State(state): State<AppState>, session: Session) -> HandlerResult {
    admin_guard!(session);

    let stats = state.db.database_stats()?;
    Ok(Json(stats.to_json()).into_response())
}
