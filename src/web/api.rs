// Programmatic JSON API, version 1. Session-authenticated; every response
// is an envelope with a success flag and timestamp, or an error triple
// with a matching HTTP status.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_sessions::Session;

use crate::auth;
use crate::error::AppError;
use crate::models::{ConversationOwner, NewConversation};
use crate::store::{ConversationStore, UserStore};

use super::AppState;

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;
const MAX_QUESTION_LEN: usize = 1000;

type HandlerResult = Result<Response, AppError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(api_info))
        .route("/conversations", get(get_conversations))
        .route("/conversations/{id}", get(get_conversation))
        .route("/users", get(get_users))
        .route("/users/{id}", get(get_user))
        .route("/ask", post(ask_question))
        .route("/stats", get(get_user_stats))
}

fn envelope_error(status: StatusCode, error: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": error,
            "message": message,
            "status": status.as_u16(),
        })),
    )
        .into_response()
}

fn unauthorized() -> Response {
    envelope_error(
        StatusCode::UNAUTHORIZED,
        "Authentication required",
        "User must be logged in".to_string(),
    )
}

fn admin_only() -> Response {
    envelope_error(
        StatusCode::FORBIDDEN,
        "Admin authentication required",
        "Admin access only".to_string(),
    )
}

async fn session_user_id(session: &Session) -> Result<Option<i64>, AppError> {
    Ok(session.get::<i64>(auth::USER_ID_KEY).await?)
}

async fn session_admin_id(session: &Session) -> Result<Option<i64>, AppError> {
    Ok(session.get::<i64>(auth::ADMIN_ID_KEY).await?)
}

fn clamp_per_page(per_page: Option<i64>) -> i64 {
    per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
}

async fn api_info() -> Json<Value> {
    Json(json!({
        "name": "Student Q&A Chatbot API",
        "version": "1.0",
        "description": "RESTful API for accessing chatbot data",
        "base_url": "/api/v1",
        "endpoints": {
            "info": {
                "path": "/api/v1/",
                "method": "GET",
                "description": "API information",
                "auth_required": false,
            },
            "conversations_list": {
                "path": "/api/v1/conversations",
                "method": "GET",
                "description": "Get all conversations for authenticated user",
                "auth_required": true,
                "parameters": {
                    "page": "Page number (optional, default: 1)",
                    "per_page": "Items per page (optional, default: 20, max: 100)",
                },
            },
            "conversation_detail": {
                "path": "/api/v1/conversations/<id>",
                "method": "GET",
                "description": "Get a specific conversation by ID",
                "auth_required": true,
            },
            "users_list": {
                "path": "/api/v1/users",
                "method": "GET",
                "description": "Get all users (admin only)",
                "auth_required": true,
                "admin_only": true,
            },
            "user_detail": {
                "path": "/api/v1/users/<id>",
                "method": "GET",
                "description": "Get a specific user by ID (admin only)",
                "auth_required": true,
                "admin_only": true,
            },
            "ask_question": {
                "path": "/api/v1/ask",
                "method": "POST",
                "description": "Submit a question to the chatbot",
                "auth_required": true,
                "body": {"question": "The question to ask (required)"},
            },
            "stats": {
                "path": "/api/v1/stats",
                "method": "GET",
                "description": "Get user statistics",
                "auth_required": true,
            },
        },
        "authentication": {
            "type": "Session-based",
            "note": "Login via web interface before using API",
        },
        "response_format": "JSON",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Deserialize)]
struct PaginationQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    per_page: Option<i64>,
}

async fn get_conversations(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<PaginationQuery>,
) -> HandlerResult {
    let Some(user_id) = session_user_id(&session).await? else {
        return Ok(unauthorized());
    };

    let per_page = clamp_per_page(query.per_page);
    let page = state
        .db
        .conversations_for_user(user_id, query.page.unwrap_or(1), per_page)?;

    let user = state.db.user_by_id(user_id)?;
    let data: Vec<_> = page
        .items
        .iter()
        .map(|conv| conv.to_json(user.as_ref()))
        .collect();

    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": page.pagination_json(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

async fn get_conversation(
    State(state): State<AppState>,
    session: Session,
    Path(conversation_id): Path<i64>,
) -> HandlerResult {
    let Some(user_id) = session_user_id(&session).await? else {
        return Ok(unauthorized());
    };

    let Some(conversation) = state.db.conversation_for_user(conversation_id, user_id)? else {
        return Ok(envelope_error(
            StatusCode::NOT_FOUND,
            "Not found",
            format!("Conversation {conversation_id} not found or access denied"),
        ));
    };

    let user = state.db.user_by_id(user_id)?;
    Ok(Json(json!({
        "success": true,
        "data": conversation.to_json(user.as_ref()),
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

#[derive(Deserialize)]
struct UserListQuery {
    #[serde(default)]
    page: Option<i64>,
    #[serde(default)]
    per_page: Option<i64>,
    #[serde(default)]
    search: Option<String>,
}

async fn get_users(
    State(state): State<AppState>,
    session: Session,
    Query(query): Query<UserListQuery>,
) -> HandlerResult {
    if session_admin_id(&session).await?.is_none() {
        return Ok(admin_only());
    }

    let per_page = clamp_per_page(query.per_page);
    let search = query.search.as_deref().filter(|s| !s.is_empty());
    let page = state
        .db
        .list_users(search, query.page.unwrap_or(1), per_page)?;

    let mut data = Vec::new();
    for user in &page.items {
        data.push(user.to_json(state.db.count_for_user(user.id)?));
    }

    Ok(Json(json!({
        "success": true,
        "data": data,
        "pagination": page.pagination_json(),
        "search": search,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

async fn get_user(
    State(state): State<AppState>,
    session: Session,
    Path(user_id): Path<i64>,
) -> HandlerResult {
    if session_admin_id(&session).await?.is_none() {
        return Ok(admin_only());
    }

    let Some(user) = state.db.user_by_id(user_id)? else {
        return Ok(envelope_error(
            StatusCode::NOT_FOUND,
            "Not found",
            format!("User {user_id} not found"),
        ));
    };

    let count = state.db.count_for_user(user.id)?;
    Ok(Json(json!({
        "success": true,
        "data": user.to_json(count),
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

async fn ask_question(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Value>,
) -> HandlerResult {
    let Some(user_id) = session_user_id(&session).await? else {
        return Ok(unauthorized());
    };

    let Some(question_value) = body.get("question") else {
        return Ok(envelope_error(
            StatusCode::BAD_REQUEST,
            "Bad request",
            "Question field is required".to_string(),
        ));
    };
    let question = question_value.as_str().unwrap_or_default().trim().to_string();

    if question.is_empty() {
        return Ok(envelope_error(
            StatusCode::BAD_REQUEST,
            "Bad request",
            "Question cannot be empty".to_string(),
        ));
    }
    if question.chars().count() > MAX_QUESTION_LEN {
        return Ok(envelope_error(
            StatusCode::BAD_REQUEST,
            "Bad request",
            "Question too long (max 1000 characters)".to_string(),
        ));
    }

    let answer = state.chat.answer(&question).await;

    let session_id = session
        .get::<String>(auth::SESSION_ID_KEY)
        .await?
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let timestamp = Utc::now();
    let conversation_id = state.db.insert_conversation(&NewConversation {
        session_id,
        question: question.clone(),
        answer: answer.clone(),
        owner: ConversationOwner::Registered(Some(user_id)),
        timestamp: Some(timestamp),
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "conversation_id": conversation_id,
                "question": question,
                "answer": answer,
                "timestamp": timestamp.to_rfc3339(),
            },
            "timestamp": Utc::now().to_rfc3339(),
        })),
    )
        .into_response())
}

async fn get_user_stats(State(state): State<AppState>, session: Session) -> HandlerResult {
    let Some(user_id) = session_user_id(&session).await? else {
        return Ok(unauthorized());
    };

    let Some(user) = state.db.user_by_id(user_id)? else {
        return Ok(envelope_error(
            StatusCode::NOT_FOUND,
            "Not found",
            "User not found".to_string(),
        ));
    };

    let total_conversations = state.db.count_for_user(user.id)?;
    let seven_days_ago = Utc::now() - Duration::days(7);
    let recent_conversations = state.db.count_for_user_since(user.id, seven_days_ago)?;
    let latest = state.db.latest_for_user(user.id)?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "user": {
                "id": user.id,
                "email": user.email,
                "first_name": user.first_name,
                "last_name": user.last_name,
                "student_id": user.student_id,
            },
            "statistics": {
                "total_conversations": total_conversations,
                "conversations_last_7_days": recent_conversations,
                "member_since": user.created_at.to_rfc3339(),
                "last_activity": latest.map(|c| c.timestamp.to_rfc3339()),
            },
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}
