mod auth;
mod db;
mod documents;
mod error;
mod models;
mod objects;
mod postgres;
mod protocol;
mod redaction;
mod repository;
mod schema;
mod server;
mod sharing;
mod types;
mod users;

use std::env;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    env_logger::init();

    let Ok(config_str) = &env::var("DOCSHARE_CONFIG") else {
        log::error!("Config not found! Set env variable \"DOCSHARE_CONFIG\"");
        return;
    };

    let config =
        match serde_json::from_str::<server::DocshareConfig>(config_str) {
            Ok(config) => config,
            Err(err) => {
                log::error!("Error parsing config: {}", err);
                return;
            }
        };

    let docshare = match server::Docshare::new(config).await {
        Ok(docshare) => docshare,
        Err(err) => {
            log::error!("Error starting docshare: {}", err);
            return;
        }
    };
    if let Err(err) = docshare.run().await {
        log::error!("Server stopped: {}", err);
    }
}
