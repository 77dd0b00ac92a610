use actix_web::{web, App, HttpResponse, HttpServer, middleware::Compress};
use actix_cors::Cors;
use metrics_exporter_prometheus::PrometheusBuilder;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use tracing_actix_web::TracingLogger;

use school_archive::config::AppConfig;
use school_archive::openapi::ApiDoc;
use school_archive::repo::open_repo;
use school_archive::routes::{config, AppState};
use school_archive::security::SecurityHeaders;
use school_archive::storage::build_media_store;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds; production sets the environment externally.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let app_config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            eprintln!("Please copy .env.example to .env and configure it");
            std::process::exit(1);
        }
    };

    info!("Bootstrapping school archive ({:?})", app_config.environment);
    info!("Frontend URL: {}", app_config.frontend_url);
    match &app_config.oauth {
        Some(o) => info!("Google OAuth enabled; register this redirect URI with Google: {}", o.redirect_uri),
        None => warn!("Google OAuth not configured (GOOGLE_CLIENT_ID/GOOGLE_SECRET_KEY missing); login is disabled"),
    }

    let prometheus = PrometheusBuilder::new().install_recorder()?;

    let repo = open_repo(app_config.database_url.as_deref(), &app_config.data_dir).await?;
    let media_store = build_media_store(&app_config.storage, app_config.environment).await?;

    let openapi = ApiDoc::openapi();
    info!("OpenAPI spec generated");

    let bind_addr = app_config.bind_addr.clone();
    let security = SecurityHeaders::from_config(&app_config);
    let frontend_url = app_config.frontend_url.clone();
    let state = web::Data::new(AppState::new(app_config, repo, media_store));

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            // during local dev allow React/Vite default ports
            .allowed_origin("http://localhost:5173")
            .allowed_origin("http://127.0.0.1:5173")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        let metrics_handle = prometheus.clone();
        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(security.clone())
            .wrap(cors)
            .app_data(state.clone())
            .configure(config)
            .route("/metrics", web::get().to(move || {
                let handle = metrics_handle.clone();
                async move { HttpResponse::Ok().content_type("text/plain; version=0.0.4").body(handle.render()) }
            }))
            .service(SwaggerUi::new("/docs/{_:.*}").url("/docs/openapi.json", openapi.clone()))
    })
    .bind(&bind_addr)?;

    info!("Listening on http://{bind_addr}");

    server.run().await?;
    Ok(())
}
