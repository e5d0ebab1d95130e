use std::path::Path;
use std::sync::Arc;

use course_chat::auth;
use course_chat::chat::ChatService;
use course_chat::config::Config;
use course_chat::corpus::CorpusLoader;
use course_chat::database::Database;
use course_chat::migrate;
use course_chat::models::NewAdmin;
use course_chat::store::AdminStore;
use course_chat::web::{self, AppState};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    tracing_subscriber::fmt::init();
    color_eyre::install()?;

    let config = Config::from_env()?;
    tracing::info!("Starting Student Q&A Chatbot web application");

    let db = Database::open(&config.database_path)?;
    tracing::info!("Database initialized: {}", config.database_path.display());

    let summary = migrate::import_legacy_json(&db, Path::new("."))?;
    if !summary.skipped && (summary.users_imported > 0 || summary.conversations_imported > 0) {
        tracing::info!(
            "Legacy import complete: {} users, {} conversations",
            summary.users_imported,
            summary.conversations_imported
        );
    }

    if let Some((email, password)) = &config.admin_bootstrap {
        bootstrap_admin(&db, email, password)?;
    }

    let corpus_text = CorpusLoader::new(&config.corpus_dir).load();
    let chat = ChatService::new(
        config.mistral_api_key.clone(),
        config.mistral_base_url.clone(),
        corpus_text,
    );

    let state = AppState {
        db,
        chat: Arc::new(chat),
        backup_dir: std::env::current_dir()?,
    };
    let app = web::router(state, &config.session_secret);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the configured admin account, or reset its password if the row
/// already exists.
fn bootstrap_admin(db: &Database, email: &str, password: &str) -> color_eyre::Result<()> {
    let password_hash = auth::hash_password(password)?;
    match db.admin_by_email(email)? {
        Some(admin) => {
            db.set_admin_password(admin.id, &password_hash)?;
            tracing::info!("Password updated for admin {}", email);
        }
        None => {
            db.create_admin(NewAdmin {
                email: email.to_string(),
                password_hash,
                first_name: "Admin".to_string(),
                last_name: "User".to_string(),
                is_super_admin: true,
            })?;
            tracing::info!("Admin user created: {}", email);
        }
    }
    Ok(())
}
