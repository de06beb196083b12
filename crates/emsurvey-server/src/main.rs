use anyhow::Result;
use chrono::Utc;
use emsurvey_ai::{ReportGenerator, ZhipuProvider};
use emsurvey_storage::store::user::NewUser;
use emsurvey_storage::SurveyStore;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::time::{interval, Duration};
use tracing_subscriber::EnvFilter;

use emsurvey_server::app;
use emsurvey_server::config::ServerConfig;
use emsurvey_server::state::AppState;
use emsurvey_server::{dictionary_seed, product_seed, region_seed};

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  emsurvey-server [config.toml]                                  Start the server");
    eprintln!("  emsurvey-server init-dictionaries <config.toml> [seed.json]   Initialize dictionaries (system defaults when seed omitted)");
    eprintln!("  emsurvey-server init-regions <config.toml> [seed.json]        Initialize regions (presets when seed omitted)");
    eprintln!("  emsurvey-server init-products <config.toml> <seed.json>       Initialize product capabilities from seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    emsurvey_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("emsurvey=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-dictionaries") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-dictionaries requires <config.toml> argument")
            })?;
            run_init_dictionaries(config_path, args.get(3).map(String::as_str)).await
        }
        Some("init-regions") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-regions requires <config.toml> argument")
            })?;
            run_init_regions(config_path, args.get(3).map(String::as_str)).await
        }
        Some("init-products") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-products requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-products requires <seed.json> argument")
            })?;
            run_init_products(config_path, seed_path).await
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

async fn open_store(config: &ServerConfig) -> Result<SurveyStore> {
    let db_url = config.database.connection_url();
    SurveyStore::new(&db_url, Path::new(&config.database.data_dir)).await
}

/// Initialize dictionaries.
/// - With `seed_path`: import dictionaries from JSON seed file
/// - Without `seed_path`: insert missing built-in system dictionaries
async fn run_init_dictionaries(config_path: &str, seed_path: Option<&str>) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = open_store(&config).await?;
    if let Some(path) = seed_path {
        dictionary_seed::init_from_seed_file(&store, path).await?;
    } else {
        dictionary_seed::init_default_dictionaries(&store).await?;
    }
    Ok(())
}

/// Re-sync preset regions, then import the optional seed file.
async fn run_init_regions(config_path: &str, seed_path: Option<&str>) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = open_store(&config).await?;
    region_seed::sync_preset_regions(&store).await?;
    if let Some(path) = seed_path {
        region_seed::init_from_seed_file(&store, path).await?;
    }
    Ok(())
}

async fn run_init_products(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = open_store(&config).await?;
    product_seed::init_from_seed_file(&store, seed_path).await?;
    Ok(())
}

/// Create the configured admin account when no user exists yet.
async fn ensure_default_admin(store: &SurveyStore, config: &ServerConfig) -> Result<()> {
    if store.count_users().await? > 0 {
        return Ok(());
    }
    let admin_role = store
        .get_role_by_code(emsurvey_storage::store::role::ADMIN_ROLE)
        .await?
        .ok_or_else(|| anyhow::anyhow!("admin role missing after seeding"))?;
    let password_hash = emsurvey_storage::auth::hash_password(&config.auth.default_password)?;
    store
        .create_user(&NewUser {
            username: &config.auth.default_username,
            password_hash: &password_hash,
            display_name: Some("系统管理员".to_string()),
            email: None,
            phone: None,
            role_id: &admin_role.id,
            enabled: true,
        })
        .await?;
    tracing::warn!(
        username = %config.auth.default_username,
        "Default admin account created. Change its password after first login."
    );
    Ok(())
}

fn build_report_generator(config: &ServerConfig) -> Option<Arc<dyn ReportGenerator>> {
    let ai = &config.ai;
    if !ai.enabled {
        tracing::info!("AI report generation disabled, fallback reports will be used");
        return None;
    }
    let Some(api_key) = ai.api_key.clone().filter(|k| !k.is_empty()) else {
        tracing::warn!("AI enabled but [ai].api_key is empty, fallback reports will be used");
        return None;
    };
    if ai.provider != "zhipu" {
        tracing::warn!(provider = %ai.provider, "Unsupported AI provider, fallback reports will be used");
        return None;
    }
    match ZhipuProvider::new(
        api_key,
        ai.model.clone(),
        ai.base_url.clone(),
        Some(ai.timeout_secs),
        ai.max_tokens,
        ai.temperature,
    ) {
        Ok(provider) => {
            tracing::info!(
                provider = provider.provider(),
                model = provider.model_name(),
                "AI report generator configured"
            );
            Some(Arc::new(provider))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to build AI client, fallback reports will be used");
            None
        }
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        db = %config.database.redacted_url(),
        "emsurvey-server starting"
    );

    let store = Arc::new(open_store(&config).await?);

    // 角色需先于默认管理员写入
    store.ensure_builtin_roles().await?;
    if let Err(e) = dictionary_seed::init_default_dictionaries(&store).await {
        tracing::error!(error = %e, "Failed to initialize default dictionaries");
    }
    if let Err(e) = region_seed::init_default_regions(&store).await {
        tracing::error!(error = %e, "Failed to initialize preset regions");
    }
    if let Err(e) = product_seed::init_default_products(&store).await {
        tracing::error!(error = %e, "Failed to initialize default product capabilities");
    }
    ensure_default_admin(&store, &config).await?;

    // JWT secret: use configured value or generate random
    let jwt_secret = match &config.auth.jwt_secret {
        Some(secret) => Arc::new(secret.clone()),
        None => {
            let secret = emsurvey_storage::auth::generate_token();
            tracing::warn!("No jwt_secret configured. A random secret was generated and will change on restart. Set [auth].jwt_secret in config for production use.");
            Arc::new(secret)
        }
    };

    let report_generator = build_report_generator(&config);
    let log_retention_days = config.log_retention_days;
    let http_port = config.http_port;

    let state = AppState {
        store: store.clone(),
        report_generator,
        start_time: Utc::now(),
        jwt_secret,
        token_expire_secs: config.auth.token_expire_secs,
        config: Arc::new(config),
    };

    let http_addr: SocketAddr = format!("0.0.0.0:{http_port}").parse()?;
    let app = app::build_http_app(state);
    let http_listener = tokio::net::TcpListener::bind(http_addr).await?;
    let http_server = axum::serve(http_listener, app.into_make_service());

    // Periodic system log cleanup
    let cleanup_store = store.clone();
    let cleanup_handle = tokio::spawn(async move {
        let mut tick = interval(Duration::from_secs(3600));
        loop {
            tick.tick().await;
            match cleanup_store.cleanup_logs(log_retention_days).await {
                Ok(removed) if removed > 0 => {
                    tracing::info!(removed, "Cleaned up expired system logs")
                }
                Err(e) => tracing::error!(error = %e, "System log cleanup failed"),
                _ => {}
            }
        }
    });

    tracing::info!(http = %http_addr, "Server started");

    tokio::select! {
        result = http_server.with_graceful_shutdown(async { signal::ctrl_c().await.ok(); }) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server error");
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down gracefully");
        }
    }

    cleanup_handle.abort();
    tracing::info!("Server stopped");

    Ok(())
}
