//! Example web server with cookie-bound login sessions.
//!
//! Run with: cargo run -p web-server-demo
//!
//! Then open http://localhost:9527/login in your browser.
//! Set `SESSION_REDIS_URL` (and build with `--features redis`) to keep
//! session bags in Redis instead of process memory.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Form, Router,
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect},
    routing::get,
};
use cookie_sessions_core::SessionExt;
use cookie_sessions_http::{SessionRejection, destroy_session, start_session};
use cookie_sessions_store::{BackendConfig, ManagerConfig, SessionManager, default_registry};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionManager>,
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut registry = default_registry()?;
    let mut config = ManagerConfig::default()
        .with_cookie_name("GOSESSID")
        .with_max_lifetime(Duration::from_secs(3600))
        .with_gc_interval(Duration::from_secs(60));

    if let Ok(url) = std::env::var("SESSION_REDIS_URL") {
        let backend = BackendConfig::Redis {
            url,
            namespace: "demo:session".to_string(),
        };
        registry.register("redis", backend.build().await?)?;
        config = config.with_provider("redis");
    }

    let sessions = Arc::new(SessionManager::from_config(&registry, &config)?);
    let gc = sessions.spawn_gc();
    tracing::info!(
        provider = sessions.provider_name(),
        cookie = sessions.cookie_name(),
        "Session manager ready"
    );

    let state = AppState { sessions };

    // Build router
    let app = Router::new()
        .route("/", get(hello_handler))
        .route("/login", get(login_form_handler).post(login_handler))
        .route("/logout", get(logout_handler))
        .route("/count", get(count_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([127, 0, 0, 1], 9527));
    tracing::info!("Server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    gc.stop().await;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
}

async fn hello_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SessionRejection> {
    let (session, cookies) = start_session(&state.sessions, &headers).await?;
    let greeting = match session.get_as::<String>("username").await? {
        Some(name) => format!("Hello, {}!", escape_html(&name)),
        None => "Hello world! <a href=\"/login\">Log in</a>".to_string(),
    };
    Ok((cookies, Html(greeting)))
}

async fn login_form_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SessionRejection> {
    let (session, cookies) = start_session(&state.sessions, &headers).await?;
    let username = session
        .get_as::<String>("username")
        .await?
        .unwrap_or_default();
    let page = LOGIN_HTML.replace("{username}", &escape_html(&username));
    Ok((cookies, Html(page)))
}

async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<impl IntoResponse, SessionRejection> {
    let (session, cookies) = start_session(&state.sessions, &headers).await?;
    session.set_as("username", &form.username).await?;
    tracing::info!(sid = session.id().short(), "User logged in");
    Ok((cookies, Redirect::to("/")))
}

async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SessionRejection> {
    let cookies = destroy_session(&state.sessions, &headers).await?;
    Ok((cookies, Redirect::to("/login")))
}

async fn count_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, SessionRejection> {
    let (session, cookies) = start_session(&state.sessions, &headers).await?;
    let count = session.get_as::<u64>("count").await?.unwrap_or(0) + 1;
    session.set_as("count", &count).await?;
    Ok((cookies, Html(format!("You have visited this page {count} times."))))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const LOGIN_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Session Demo - Login</title>
    <style>
        body { font-family: system-ui, sans-serif; margin: 40px; }
        .current { color: #666; margin-bottom: 10px; }
    </style>
</head>
<body>
    <h1>Login</h1>
    <div class="current">Current user: {username}</div>
    <form action="/login" method="post">
        <label>Username: <input type="text" name="username"></label>
        <input type="submit" value="Log in">
    </form>
    <p><a href="/logout">Log out</a></p>
</body>
</html>
"#;
