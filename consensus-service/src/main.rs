use anyhow::Context;
use consensus_service::{
    config::Settings,
    logging::{LogFormat, init_tracing},
    service::create_app,
};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::Json);

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let app = match create_app(&settings) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to build the consensus workflow");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let listener = TcpListener::bind(format!("0.0.0.0:{}", settings.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.port))?;
    let addr = listener.local_addr()?;

    info!("Medical Consensus Service starting on {}", addr);
    info!("API documentation available at http://{}/", addr);
    info!("Analysis endpoint: POST http://{}/consensus/analyze", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
