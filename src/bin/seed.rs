//! Loads the demo data into the database named by `DATABASE_URL`.
//!
//! ```sh
//! cargo run --bin seed
//! ```

use taskhive::config::Config;
use taskhive::seed::{seed_demo, Seeded};
use taskhive::store::{PgStore, Store};

#[actix_web::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };
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

    let outcome = seed_demo(&store, config.bcrypt_cost).await;
    store.close().await;
    match outcome {
        Ok(Seeded::Created { project, tasks }) => {
            log::info!("Seeded project '{}' with {} tasks", project.name, tasks)
        }
        Ok(Seeded::AlreadyPresent) => log::info!("Demo data already present, nothing to do"),
        Err(err) => {
            log::error!("Seeding failed: {}", err);
            std::process::exit(1);
        }
    }
}
