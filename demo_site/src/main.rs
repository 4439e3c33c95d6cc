//! Demo site: a small blog with an admin area, served by folio-mvc.
//!
//! Run from this directory so `config/app.json` and `view/` resolve: `cargo run`

mod admin;
mod blog;

use folio_mvc::{load_from_env, AppState, Application};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    folio_mvc::telemetry::init("folio_mvc=info,demo_site=info");

    let config = load_from_env()?;
    let dispatcher = Application::builder(config)
        .invokable::<blog::BlogRepository>("Demo/BlogRepository")
        .service_factory("Demo/CredentialsFactory", admin::CredentialsFactory)
        .controller("blog", "index", blog::IndexController::build)
        .controller("admin", "login", admin::LoginController::build)
        .controller("admin", "dashboard", admin::DashboardController::build)
        .build()?;

    let app = folio_mvc::app(AppState::with_memory_sessions(dispatcher));
    let addr = std::env::var("FOLIO_LISTEN").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Demo site listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
