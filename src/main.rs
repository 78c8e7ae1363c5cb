use pipeline_trigger::error::TriggerError;
use pipeline_trigger::logging::{FileLogger, setup_logging};
use pipeline_trigger::{AppState, app, load_config, read_token};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8501";
const DEFAULT_CONFIG_PATH: &str = "trigger_config.toml";

fn fatal(e: TriggerError) -> ! {
    error!("{}", e);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let file_logger = std::env::var("TRIGGER_LOG_DIR")
        .ok()
        .map(|dir| FileLogger::new(PathBuf::from(dir)));
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Logging setup failed: {}", e);
            std::process::exit(1);
        }
    };

    // Without a token nothing may be served
    let secret_token = read_token().unwrap_or_else(|e| fatal(e));

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path =
        std::env::var("TRIGGER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = load_config(&config_path).unwrap_or_else(|e| fatal(e));
    let state = AppState::new(config, secret_token).unwrap_or_else(|e| fatal(e));

    info!("Using config at {:?}", config_path);
    info!(
        "Serving {} repositories; triggers go to {} on ref '{}'",
        state.registry.repos().len(),
        state.config.endpoint_url,
        state.config.git_ref
    );

    let app = app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .unwrap_or_else(|e| fatal(e.into()));
    info!("Listening on {}", bind_address);
    if let Err(e) = axum::serve(listener, app).await {
        fatal(e.into());
    }
}
