//! In-memory device registry backend speaking the same REST shape as the real one.
//!
//! Used by `rigwatch --demo` (as a child process) and mounted in-process by tests.

pub mod auth;
pub mod error;
pub mod routes;
pub mod sampler;
pub mod state;
pub mod types;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub use routes::router;
pub use state::{AppState, Store, DEMO_PASSWORD, DEMO_USER};

/// Signing secret when none is configured.
pub const DEFAULT_SECRET: &str = "rigwatch-demo-secret";

/// Serve `state` on an already-bound listener until the task is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

/// Bind an ephemeral localhost port and serve the seeded backend in the background.
/// Returns the base URL of the API (`http://127.0.0.1:PORT/api/`).
pub async fn spawn_local(state: AppState) -> std::io::Result<(String, JoinHandle<()>)> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!(error = %e, "demo backend stopped");
        }
    });
    Ok((format!("http://{addr}/api/"), handle))
}
