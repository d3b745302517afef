//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the
//! REST server (with OpenAPI/Swagger UI). The workspace's main `portal-run`
//! binary is the production entry point.

use portal_api_rest::{serve, AppState};
use portal_core::{CoreConfig, LogNotifier};
use portal_files::DocumentService;
use portal_store::JsonStore;
use portal_types::EmailAddress;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the clinic portal REST API server
///
/// Starts the REST API server on the configured address (default:
/// 0.0.0.0:3000). Provides HTTP endpoints for case operations with
/// OpenAPI/Swagger documentation.
///
/// # Environment Variables
/// - `PORTAL_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `PORTAL_DATA_DIR`: Row store root (default: "/portal_data")
/// - `PORTAL_DOCUMENTS_DIR`: Document store root (default: "/portal_documents")
/// - `PORTAL_PUBLIC_BASE_URL`: Public URL documents are served under
/// - `PORTAL_LAB_ORDER_EMAIL`: Lab address kit-order notifications go to
/// - `API_KEY`: Shared key expected in the `x-api-key` header
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - a configured directory does not exist,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("portal_api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("PORTAL_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting clinic portal REST API on {}", addr);

    let data_dir = std::env::var("PORTAL_DATA_DIR").unwrap_or_else(|_| "/portal_data".into());
    let data_path = Path::new(&data_dir);
    if !data_path.exists() {
        anyhow::bail!("Data directory does not exist: {}", data_path.display());
    }

    let documents_dir =
        std::env::var("PORTAL_DOCUMENTS_DIR").unwrap_or_else(|_| "/portal_documents".into());
    let documents_path = Path::new(&documents_dir);
    if !documents_path.exists() {
        anyhow::bail!(
            "Documents directory does not exist: {}",
            documents_path.display()
        );
    }

    let public_base_url = std::env::var("PORTAL_PUBLIC_BASE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".into());
    let lab_order_email = EmailAddress::new(
        std::env::var("PORTAL_LAB_ORDER_EMAIL")
            .unwrap_or_else(|_| "orders@lab.example.org".into()),
    )?;

    let cfg = Arc::new(CoreConfig::new(
        data_path.to_path_buf(),
        documents_path.to_path_buf(),
        public_base_url.clone(),
        lab_order_email,
    )?);

    let store = Arc::new(JsonStore::new(cfg.data_dir())?);
    let documents = Arc::new(DocumentService::new(cfg.documents_dir(), &public_base_url)?);

    let state = AppState::new(
        cfg,
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        documents,
        Arc::new(LogNotifier),
    );

    serve(&addr, state).await?;

    Ok(())
}
