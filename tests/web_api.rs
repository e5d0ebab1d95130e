// End-to-end tests driving the router: browser flows, the JSON API
// envelope, and the admin merge guard rails.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use course_chat::auth;
use course_chat::chat::ChatService;
use course_chat::database::Database;
use course_chat::models::NewAdmin;
use course_chat::store::{AdminStore, ConversationStore, UserStore};
use course_chat::web::{self, AppState};

fn test_app() -> (TempDir, Router, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("test.db")).unwrap();
    // Nothing listens on this port, so every completion call fails and the
    // chat service falls back to its apology answer.
    let chat = ChatService::new(
        "test-key".to_string(),
        "http://127.0.0.1:9/v1".to_string(),
        String::new(),
    );
    let state = AppState {
        db: db.clone(),
        chat: Arc::new(chat),
        backup_dir: dir.path().to_path_buf(),
    };
    let app = web::router(state, "integration-test-secret-0123456789abcdef");
    (dir, app, db)
}

async fn send(app: &Router, request: Request<Body>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn session_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("response should set a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_post(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn register_user(app: &Router) -> String {
    let response = send(
        app,
        form_post(
            "/register",
            "firstName=Ada&lastName=Lovelace&studentId=S100&email=ada@example.com\
             &password=secret1&confirmPassword=secret1&courseSection=001&semester=Fall+2025",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    session_cookie(&response)
}

#[tokio::test]
async fn unauthenticated_api_listing_gets_a_401_envelope() {
    let (_dir, app, _db) = test_app();

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/conversations")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(response).await;
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Authentication required");
}

#[tokio::test]
async fn api_ask_validates_and_persists() {
    let (_dir, app, db) = test_app();
    let cookie = register_user(&app).await;

    // Empty question.
    let response = send(
        &app,
        json_post("/api/v1/ask", Some(&cookie), serde_json::json!({"question": ""})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Question cannot be empty");

    // Too long.
    let long = "x".repeat(1001);
    let response = send(
        &app,
        json_post("/api/v1/ask", Some(&cookie), serde_json::json!({"question": long})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Question too long (max 1000 characters)");

    // Missing field.
    let response = send(&app, json_post("/api/v1/ask", Some(&cookie), serde_json::json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Question field is required");

    // Valid question: answered (fail-soft apology) and persisted.
    let response = send(
        &app,
        json_post(
            "/api/v1/ask",
            Some(&cookie),
            serde_json::json!({"question": "what is a tuple?"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["question"], "what is a tuple?");
    assert!(body["data"]["conversation_id"].as_i64().is_some());
    let answer = body["data"]["answer"].as_str().unwrap();
    assert!(!answer.is_empty());

    let user = db.user_by_email("ada@example.com").unwrap().unwrap();
    assert_eq!(db.count_for_user(user.id).unwrap(), 1);

    // The saved answer is what the API returned.
    let saved = db
        .conversation_by_id(body["data"]["conversation_id"].as_i64().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(saved.answer, answer);
}

#[tokio::test]
async fn api_conversations_listing_pages_and_wraps() {
    let (_dir, app, _db) = test_app();
    let cookie = register_user(&app).await;

    for i in 0..3 {
        let response = send(
            &app,
            json_post(
                "/api/v1/ask",
                Some(&cookie),
                serde_json::json!({"question": format!("question {i}")}),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/conversations?page=1&per_page=2")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["pagination"]["total_items"], 3);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["pagination"]["has_next"], true);
    assert_eq!(body["data"][0]["user_info"]["is_registered"], true);
}

#[tokio::test]
async fn login_rejects_bad_credentials_inline() {
    let (_dir, app, _db) = test_app();
    register_user(&app).await;

    let response = send(
        &app,
        form_post("/login", "email=ada@example.com&password=wrong-password"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Invalid email or password"));

    let response = send(
        &app,
        form_post("/login", "email=ada@example.com&password=secret1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let (_dir, app, _db) = test_app();
    register_user(&app).await;

    let response = send(
        &app,
        form_post(
            "/register",
            "firstName=Ada&lastName=Again&studentId=S101&email=ada@example.com\
             &password=secret2&confirmPassword=secret2",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_text(response).await;
    assert!(page.contains("Email already registered"));

    // Mismatched confirmation and short passwords are also rejected.
    let response = send(
        &app,
        form_post(
            "/register",
            "firstName=B&lastName=C&studentId=S2&email=b@example.com\
             &password=secret1&confirmPassword=other",
        ),
    )
    .await;
    assert!(body_text(response).await.contains("Passwords do not match"));

    let response = send(
        &app,
        form_post(
            "/register",
            "firstName=B&lastName=C&studentId=S2&email=b@example.com\
             &password=abc&confirmPassword=abc",
        ),
    )
    .await;
    assert!(body_text(response)
        .await
        .contains("Password must be at least 6 characters"));
}

#[tokio::test]
async fn guest_flow_captures_identity_and_asks() {
    let (_dir, app, db) = test_app();

    // Missing required fields.
    let response = send(
        &app,
        form_post("/submit_user_info", "firstName=G&lastName=&studentId=&email="),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        form_post(
            "/submit_user_info",
            "firstName=Gus&lastName=Guest&studentId=G7&email=gus@example.com",
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let cookie = session_cookie(&response);

    let response = send(
        &app,
        json_post("/ask", Some(&cookie), serde_json::json!({"question": "hello?"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["question"], "hello?");
    assert!(body["answer"].as_str().unwrap().len() > 0);

    // Stored as a guest conversation with the snapshot attached.
    let conversations = db.all_conversations().unwrap();
    assert_eq!(conversations.len(), 1);
    assert!(conversations[0].owner.is_guest());

    // Guests have no history view.
    let response = send(
        &app,
        Request::builder()
            .uri("/history")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn web_ask_without_identity_is_forbidden() {
    let (_dir, app, _db) = test_app();
    let response = send(
        &app,
        json_post("/ask", None, serde_json::json!({"question": "anyone there?"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Please submit your information first");
}

async fn admin_cookie(app: &Router, db: &Database) -> String {
    db.create_admin(NewAdmin {
        email: "ops@example.com".to_string(),
        password_hash: auth::hash_password("admin-pass").unwrap(),
        first_name: "Ops".to_string(),
        last_name: "Admin".to_string(),
        is_super_admin: true,
    })
    .unwrap();

    let response = send(
        app,
        form_post("/admin/login", "email=ops@example.com&password=admin-pass"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    session_cookie(&response)
}

#[tokio::test]
async fn admin_routes_redirect_without_a_session() {
    let (_dir, app, _db) = test_app();
    let response = send(
        &app,
        Request::builder()
            .uri("/admin/dashboard")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/admin/login");
}

#[tokio::test]
async fn admin_merge_of_missing_users_mutates_nothing() {
    let (_dir, app, db) = test_app();
    let cookie = admin_cookie(&app, &db).await;
    register_user(&app).await;
    let user = db.user_by_email("ada@example.com").unwrap().unwrap();

    let mut request = form_post(
        "/admin/users/merge",
        "source_user_id=9998&target_user_id=9999",
    );
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The one real user is untouched.
    assert!(db.user_by_id(user.id).unwrap().is_some());

    // Merging a user with itself is refused too.
    let mut request = form_post(
        "/admin/users/merge",
        &format!("source_user_id={0}&target_user_id={0}", user.id),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Cannot merge a user with themselves");
}

#[tokio::test]
async fn admin_stats_reports_counts() {
    let (_dir, app, db) = test_app();
    let cookie = admin_cookie(&app, &db).await;
    register_user(&app).await;

    let response = send(
        &app,
        Request::builder()
            .uri("/admin/api/stats")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total_users"], 1);
    assert_eq!(body["total_admins"], 1);
    assert_eq!(body["total_conversations"], 0);
}

#[tokio::test]
async fn csv_export_covers_every_row() {
    let (_dir, app, db) = test_app();
    let cookie = admin_cookie(&app, &db).await;
    let user_cookie = register_user(&app).await;
    for i in 0..2 {
        send(
            &app,
            json_post(
                "/api/v1/ask",
                Some(&user_cookie),
                serde_json::json!({"question": format!("q{i}")}),
            ),
        )
        .await;
    }

    let response = send(
        &app,
        Request::builder()
            .uri("/admin/export/conversations")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let csv = body_text(response).await;
    // One CRLF-terminated record per row plus the header; the answers
    // themselves may contain bare newlines inside quoted fields.
    assert_eq!(csv.matches("\r\n").count(), 1 + 2);
    assert!(csv.starts_with("ID,User Email,Student ID,"));
    assert!(csv.contains("ada@example.com"));
}

#[tokio::test]
async fn password_change_requires_the_current_password() {
    let (_dir, app, _db) = test_app();
    let cookie = register_user(&app).await;

    let mut request = form_post(
        "/change_password",
        "current_password=wrong&new_password=newsecret&confirm_password=newsecret",
    );
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Current password is incorrect");

    let mut request = form_post(
        "/change_password",
        "current_password=secret1&new_password=newsecret&confirm_password=newsecret",
    );
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    // The old password no longer works, the new one does.
    let response = send(
        &app,
        form_post("/login", "email=ada@example.com&password=secret1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(
        &app,
        form_post("/login", "email=ada@example.com&password=newsecret"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn clear_session_logs_out() {
    let (_dir, app, _db) = test_app();
    let cookie = register_user(&app).await;

    let response = send(&app, json_post("/clear_session", Some(&cookie), serde_json::json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["message"], "Session cleared");

    // The old cookie no longer authenticates.
    let response = send(
        &app,
        Request::builder()
            .uri("/api/v1/conversations")
            .header(header::COOKIE, &cookie)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
