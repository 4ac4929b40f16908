use actix_cors::Cors;
use actix_files as fs;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use orchestrate_core::config::Config;
use orchestrate_proxy::{api, telemetry};
use orchestrate_rs::Client;
use std::path::Path;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> Result<()> {
    let _guard = telemetry::init_telemetry(Path::new("./logs"))?;

    let mut config = Config::load("config.json").unwrap_or_else(|_| {
        tracing::warn!("Failed to load config.json, using defaults");
        Config::default()
    });
    if let Ok(port) = std::env::var("PORT") {
        config.port = port;
    }

    let token = config
        .auth_token()
        .with_context(|| format!("{} is not set", config.auth_token_env))?;

    tracing::info!("orchestrate-proxy starting");
    tracing::info!("  API host: {}", config.api_host);
    tracing::info!("  Port: {}", config.port);
    tracing::info!("  Static directory: {}", config.static_dir);
    tracing::info!("  Search limit: {}", config.search_limit);
    tracing::info!(
        "  CORS: enabled={}, origins={:?}",
        config.cors.enabled,
        config.cors.allowed_origins
    );

    let client = Client::from_config(&token, &config)?;
    let config = Arc::new(config);
    let app_state = web::Data::new(api::AppState {
        client,
        config: config.clone(),
    });

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting HTTP server on {}", bind_addr);

    let cors_config = config.cors.clone();
    let static_dir = config.static_dir.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();

        if cors_config.enabled {
            if cors_config.allowed_origins.iter().any(|o| o == "*") {
                cors = cors.allow_any_origin().send_wildcard();
            } else {
                for origin in &cors_config.allowed_origins {
                    cors = cors.allowed_origin(origin);
                }
            }
            cors = cors
                .allowed_methods(vec!["GET", "OPTIONS"])
                .allowed_headers(vec![
                    actix_web::http::header::ACCEPT,
                    actix_web::http::header::CONTENT_TYPE,
                ])
                .max_age(3600);
        }

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(TracingLogger::default())
            .configure(api::configure)
            .service(fs::Files::new("/", &static_dir).index_file("index.html"))
    })
    .bind(&bind_addr)?
    .run();

    server.await?;

    tracing::info!("Shutting down");
    Ok(())
}
