use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley_api::{
    build_router,
    config::Config,
    state::AppState,
    uploads::CloudinaryStorage,
};
use parley_llm::{ChatOptions, CompletionGateway, OpenAIClient, OpenAIConfig};
use parley_persist::{ChatStore, MongoConfig, MongoPersistenceClient, PersistenceClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config);

    tracing::info!("Starting Parley API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Completion gateway
    let mut llm_config = OpenAIConfig::new(config.llm_api_key.clone())
        .with_timeout_secs(config.llm.request_timeout_secs);
    if let Some(base_url) = &config.llm.base_url {
        llm_config = llm_config.with_base_url(base_url.clone());
    }
    let llm_client = OpenAIClient::from_config(llm_config)?;
    tracing::info!(model = %config.llm.model, base_url = %llm_client.base_url(), "LLM client ready");

    let mut options = ChatOptions::new();
    if let Some(temperature) = config.llm.temperature {
        options = options.temperature(temperature);
    }
    if let Some(max_tokens) = config.llm.max_tokens {
        options = options.max_tokens(max_tokens);
    }
    let gateway = CompletionGateway::new(Arc::new(llm_client), config.llm.model.clone())
        .with_options(options)
        .with_http_client(
            reqwest::Client::builder()
                .timeout(config.request_timeout())
                .build()?,
        );

    // Persistence client (MongoDB), created once and shared
    tracing::info!("Connecting to MongoDB");
    let mongo = MongoPersistenceClient::connect(&MongoConfig {
        uri: config.mongodb_uri.clone(),
        database: config.mongodb.database.clone(),
        max_pool_size: config.mongodb.pool_size,
        timeout: config.mongodb.timeout(),
    })
    .await?;
    let persist_client: Arc<dyn PersistenceClient> = Arc::new(mongo);
    let store = ChatStore::new(persist_client);

    let uploads = match (&config.upload.cloud_name, &config.upload.upload_preset) {
        (Some(cloud), Some(preset)) => Some(CloudinaryStorage::new(cloud.clone(), preset.clone())),
        _ => {
            tracing::warn!("Cloudinary is not configured; /upload will fail");
            None
        }
    };

    let mut state = AppState::new(config.clone(), store, gateway);
    if let Some(storage) = uploads {
        state = state.with_uploads(Arc::new(storage));
    }
    let app = build_router(Arc::new(state));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
