use actix_multipart::form::MultipartFormConfig;
use actix_web::middleware::TrailingSlash;
use actix_web::{middleware::DefaultHeaders, web::Data, App, HttpServer};
use anyhow::Context as AnyhowContext;
use pneu_import::catalog::SqliteProductRepository;
use pneu_import::category::SqliteCategoryRepository;
use pneu_import::import::controllers;
use pneu_import::import::images::FilesystemAssetStore;
use pneu_import::import::job::ImportContext;
use pneu_import::import::ImportRules;
use pneu_import::SELF_ADDR;
use pneu_types::category::CategoryRepository;
use pneu_types::product::ProductRepository;
use std::env;
use std::sync::Arc;
use tokio_rusqlite::Connection;

#[actix_web::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Unable to open .env file: {err}"));
        }
    }

    std::fs::create_dir_all("storage")?;

    // Each repository gets its own connection; SQLite in WAL mode handles
    // multiple connections to one database file safely.
    let conn = Connection::open("storage/catalog.db").await?;
    let product_repo: Arc<dyn ProductRepository> =
        Arc::new(SqliteProductRepository::init(conn).await?);
    let conn = Connection::open("storage/catalog.db").await?;
    let category_repo: Arc<dyn CategoryRepository> =
        Arc::new(SqliteCategoryRepository::init(conn).await?);

    let ctx = ImportContext {
        rules: ImportRules::default(),
        products: product_repo,
        categories: category_repo,
        assets: Arc::new(FilesystemAssetStore::new("media")),
    };

    log::info!("Starting catalog import server on {}:8080", *SELF_ADDR);
    HttpServer::new(move || {
        App::new()
            .app_data(MultipartFormConfig::default().total_limit(20 * 1024 * 1024))
            .wrap(
                DefaultHeaders::new()
                    .add(("Access-Control-Allow-Origin", "*"))
                    .add(("Access-Control-Allow-Methods", "GET, POST, OPTIONS"))
                    .add(("Access-Control-Allow-Headers", "*")),
            )
            .wrap(actix_web::middleware::NormalizePath::new(
                TrailingSlash::Trim,
            ))
            .app_data(Data::new(ctx.clone()))
            .service(controllers::import_products)
            .service(controllers::import_preview)
    })
    .bind((SELF_ADDR.as_str(), 8080))
    .context("Failed to bind server to port 8080. Is the port already in use?")?
    .run()
    .await?;
    Ok(())
}
