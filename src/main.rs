use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

use taskhive::app::{self, AppState};
use taskhive::config::Config;
use taskhive::error::expose_internal_errors;
use taskhive::mailer::LogMailer;
use taskhive::store::{PgStore, Store};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
    expose_internal_errors(config.environment.is_development());

    let store = match PgStore::connect(&config.database).await {
        Ok(store) => store,
        Err(err) => {
            log::error!("Failed to connect to database: {}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = store.migrate().await {
        log::error!("Failed to run migrations: {}", err);
        std::process::exit(1);
    }
    let store: Arc<dyn Store> = Arc::new(store);

    let state = web::Data::new(AppState::new(&config, Arc::clone(&store), Arc::new(LogMailer)));
    let server_config = config.clone();

    log::info!("Starting taskhive server at {}", config.server_url());
    let result = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(app::cors(&server_config))
            .wrap(Logger::default())
            .configure(app::configure)
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await;

    store.close().await;
    log::info!("Database connections closed");
    result
}
