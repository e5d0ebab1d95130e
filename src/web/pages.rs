// Browser-facing routes: login, registration, guest capture, chat.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Form, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use uuid::Uuid;

use crate::auth::{self, SessionIdentity, MIN_PASSWORD_LEN};
use crate::error::AppError;
use crate::models::{none_if_empty, ConversationOwner, GuestInfo, NewConversation, NewUser};
use crate::store::{ConversationStore, UserStore};

use super::{html, AppState};

type HandlerResult = Result<Response, AppError>;

/// Write the identity snapshot and a fresh session id into the session.
async fn establish_session(
    session: &Session,
    identity: SessionIdentity,
    user_id: Option<i64>,
) -> Result<(), AppError> {
    session.insert(auth::USER_INFO_KEY, identity).await?;
    session
        .insert(auth::SESSION_ID_KEY, Uuid::new_v4().to_string())
        .await?;
    session
        .insert(auth::SESSION_START_KEY, Utc::now().to_rfc3339())
        .await?;
    if let Some(id) = user_id {
        session.insert(auth::USER_ID_KEY, id).await?;
    }
    Ok(())
}

pub async fn index(session: Session) -> HandlerResult {
    match session.get::<SessionIdentity>(auth::USER_INFO_KEY).await? {
        Some(identity) => Ok(Html(html::index_page(&identity.first_name)).into_response()),
        None => Ok(Redirect::to("/login").into_response()),
    }
}

pub async fn login_form() -> Html<String> {
    Html(html::login_page(None))
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

pub async fn login_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> HandlerResult {
    let email = form.email.trim().to_lowercase();

    if let Some(user) = state.db.user_by_email(&email)? {
        if auth::verify_password(&user.password_hash, &form.password) {
            tracing::info!("User logged in: {}", user.email);
            establish_session(&session, SessionIdentity::registered(&user), Some(user.id))
                .await?;
            return Ok(Redirect::to("/").into_response());
        }
    }

    Ok(Html(html::login_page(Some("Invalid email or password"))).into_response())
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(rename = "firstName", default)]
    first_name: String,
    #[serde(rename = "lastName", default)]
    last_name: String,
    #[serde(rename = "studentId", default)]
    student_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(rename = "confirmPassword", default)]
    confirm_password: String,
    #[serde(rename = "courseSection", default)]
    course_section: String,
    #[serde(default)]
    semester: String,
}

pub async fn register_form() -> Html<String> {
    Html(html::register_page(None))
}

pub async fn register_submit(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> HandlerResult {
    let first_name = form.first_name.trim().to_string();
    let last_name = form.last_name.trim().to_string();
    let student_id = form.student_id.trim().to_string();
    let email = form.email.trim().to_lowercase();

    let reject = |message: &str| Ok(Html(html::register_page(Some(message))).into_response());

    if first_name.is_empty()
        || last_name.is_empty()
        || student_id.is_empty()
        || email.is_empty()
        || form.password.is_empty()
    {
        return reject("All required fields must be filled");
    }
    if form.password != form.confirm_password {
        return reject("Passwords do not match");
    }
    if form.password.len() < MIN_PASSWORD_LEN {
        return reject("Password must be at least 6 characters");
    }
    if state.db.user_by_email(&email)?.is_some() {
        return reject("Email already registered");
    }

    let user = state.db.create_user(NewUser {
        email,
        password_hash: auth::hash_password(&form.password)?,
        first_name,
        last_name,
        student_id,
        course_section: none_if_empty(&form.course_section),
        semester: none_if_empty(&form.semester),
        created_at: None,
    })?;
    tracing::info!("User registered: {}", user.email);

    // Auto-login after registration.
    establish_session(&session, SessionIdentity::registered(&user), Some(user.id)).await?;
    Ok(Redirect::to("/").into_response())
}

pub async fn logout(session: Session) -> HandlerResult {
    session.flush().await?;
    Ok(Redirect::to("/login").into_response())
}

pub async fn user_form() -> Html<String> {
    Html(html::user_form_page())
}

#[derive(Deserialize)]
pub struct GuestForm {
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
}

pub async fn submit_user_info(
    session: Session,
    Form(form): Form<GuestForm>,
) -> HandlerResult {
    let identity = SessionIdentity {
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        student_id: form.student_id.trim().to_string(),
        email: form.email.trim().to_string(),
        course_section: form.course_section.trim().to_string(),
        semester: form.semester.trim().to_string(),
        is_registered: false,
    };

    if identity.first_name.is_empty()
        || identity.last_name.is_empty()
        || identity.student_id.is_empty()
        || identity.email.is_empty()
    {
        return Ok((StatusCode::BAD_REQUEST, "Missing required fields").into_response());
    }

    establish_session(&session, identity, None).await?;
    Ok(Redirect::to("/").into_response())
}

#[derive(Deserialize)]
pub struct AskBody {
    #[serde(default)]
    question: String,
}

pub async fn ask(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AskBody>,
) -> HandlerResult {
    let Some(identity) = session.get::<SessionIdentity>(auth::USER_INFO_KEY).await? else {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Please submit your information first"})),
        )
            .into_response());
    };

    let question = body.question.trim().to_string();
    if question.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Question cannot be empty"})),
        )
            .into_response());
    }

    let answer = state.chat.answer(&question).await;

    let session_id = session
        .get::<String>(auth::SESSION_ID_KEY)
        .await?
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let owner = if identity.is_registered {
        ConversationOwner::Registered(session.get::<i64>(auth::USER_ID_KEY).await?)
    } else {
        ConversationOwner::Guest(GuestInfo::from_identity(&identity))
    };

    state.db.insert_conversation(&NewConversation {
        session_id,
        question: question.clone(),
        answer: answer.clone(),
        owner,
        timestamp: None,
    })?;

    Ok(Json(json!({
        "question": question,
        "answer": answer,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

pub async fn history(State(state): State<AppState>, session: Session) -> HandlerResult {
    let identity = session.get::<SessionIdentity>(auth::USER_INFO_KEY).await?;
    let registered = identity.map(|i| i.is_registered).unwrap_or(false);
    if !registered {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "History is only available for registered users"})),
        )
            .into_response());
    }

    let user = match session.get::<i64>(auth::USER_ID_KEY).await? {
        Some(user_id) => state.db.user_by_id(user_id)?,
        None => None,
    };
    let conversations = match &user {
        Some(user) => state.db.all_conversations_for_user(user.id)?,
        None => Vec::new(),
    };
    let data: Vec<_> = conversations
        .iter()
        .map(|conv| conv.to_json(user.as_ref()))
        .collect();

    Ok(Json(json!({
        "conversations": data,
        "count": data.len(),
    }))
    .into_response())
}

#[derive(Deserialize)]
pub struct ChangePasswordForm {
    #[serde(default)]
    current_password: String,
    #[serde(default)]
    new_password: String,
    #[serde(default)]
    confirm_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<ChangePasswordForm>,
) -> HandlerResult {
    let Some(user_id) = session.get::<i64>(auth::USER_ID_KEY).await? else {
        return Ok((
            StatusCode::FORBIDDEN,
            Json(json!({"error": "Password change is only available for registered users"})),
        )
            .into_response());
    };
    let Some(user) = state.db.user_by_id(user_id)? else {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "User not found"})),
        )
            .into_response());
    };

    let reject = |message: &str| {
        Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "message": message})),
        )
            .into_response())
    };

    if !auth::verify_password(&user.password_hash, &form.current_password) {
        return reject("Current password is incorrect");
    }
    if form.new_password != form.confirm_password {
        return reject("Passwords do not match");
    }
    if form.new_password.len() < MIN_PASSWORD_LEN {
        return reject("Password must be at least 6 characters");
    }

    state
        .db
        .set_user_password(user.id, &auth::hash_password(&form.new_password)?)?;
    Ok(Json(json!({"success": true, "message": "Password updated successfully!"})).into_response())
}

pub async fn export_data(State(state): State<AppState>) -> HandlerResult {
    let conversations = state.db.all_conversations()?;
    let mut data = Vec::with_capacity(conversations.len());
    for conv in &conversations {
        let user = match conv.owner.user_id() {
            Some(user_id) => state.db.user_by_id(user_id)?,
            None => None,
        };
        data.push(conv.to_json(user.as_ref()));
    }

    Ok(Json(json!({
        "total_conversations": data.len(),
        "data": data,
        "export_timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response())
}

pub async fn clear_session(session: Session) -> HandlerResult {
    session.flush().await?;
    Ok(Json(json!({"success": true, "message": "Session cleared"})).into_response())
}
