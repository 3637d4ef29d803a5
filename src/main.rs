use actix_web::middleware::{Logger, NormalizePath};
use actix_web::{web, App, HttpServer};
use log::info;
use shopcatalog::api;
use shopcatalog::config::Config;
use shopcatalog::db::Database;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load configuration
    let config = Config::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    // Initialize the database
    let db = Database::new(&config.database_path)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    db.create_schema()
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    info!("Schema ready at {}", config.database_path);

    let db = web::Data::new(db);
    info!("listening on http://{}", &config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .wrap(NormalizePath::trim())
            .wrap(Logger::default())
            .configure(api::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
