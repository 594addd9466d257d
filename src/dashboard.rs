//! Local explainability dashboard server

use actix_web::dev::ServerHandle;
use actix_web::rt::task::JoinHandle;
use actix_web::{middleware, web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing::info;

use crate::config::DashboardConfig;
use crate::explainer::SmartExplainer;
use crate::handlers::{self, explain, health};

/// Application state shared across handlers
pub struct AppState {
    pub explainer: SmartExplainer,
}

/// Register dashboard routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::index))
        .route("/health", web::get().to(health::health_check))
        .route("/api/summary", web::get().to(explain::summary))
        .route("/api/features", web::get().to(explain::features))
        .route("/api/importance", web::get().to(explain::importance))
        .route(
            "/api/contribution/{feature}",
            web::get().to(explain::contribution),
        )
        .route("/api/local/{id}", web::get().to(explain::local))
        .route("/api/predictions", web::get().to(explain::predictions));
}

/// Running dashboard
pub struct DashboardHandle {
    url: String,
    handle: ServerHandle,
    task: JoinHandle<io::Result<()>>,
}

impl DashboardHandle {
    /// Base URL the server listens on
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop the server and wait for it to shut down
    pub async fn stop(self, graceful: bool) -> io::Result<()> {
        info!("Stopping dashboard at {}", self.url);
        self.handle.stop(graceful).await;
        join(self.task).await
    }

    /// Wait until the server exits (e.g. on Ctrl-C)
    pub async fn wait(self) -> io::Result<()> {
        join(self.task).await
    }
}

async fn join(task: JoinHandle<io::Result<()>>) -> io::Result<()> {
    task.await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
}

/// Start serving `explainer` in the background.
///
/// Must be called from within an actix runtime.
pub fn run_app(explainer: SmartExplainer, config: &DashboardConfig) -> io::Result<DashboardHandle> {
    let state = Arc::new(AppState { explainer });

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .bind(config.addr())?;

    let url = server
        .addrs()
        .first()
        .map(|addr| format!("http://{}", addr))
        .unwrap_or_else(|| format!("http://{}", config.addr()));

    let server = server.run();
    let handle = server.handle();
    let task = actix_web::rt::spawn(server);

    info!("Dashboard running at {}", url);

    Ok(DashboardHandle { url, handle, task })
}
