use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use std::{io, sync::Arc};

use moner::{
    auth::AuthMiddleware,
    config::Config,
    mailer::{LogMailer, Mailer, SmtpMailer},
    routes,
    state::AppState,
    store::{MemoryStore, PgStore, Store},
};

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(startup_error)?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => Arc::new(
            PgStore::connect(url, config.database_max_connections)
                .await
                .map_err(startup_error)?,
        ),
        None => {
            log::warn!("DATABASE_URL is not set, data will only live in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => {
            log::info!("Sending mail through {} as {}", smtp.relay, smtp.sender_email);
            Arc::new(SmtpMailer::new(smtp).map_err(startup_error)?)
        }
        None => {
            log::warn!("SMTP is not configured, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let state = AppState::new(&config, store, mailer).map_err(startup_error)?;
    let _cleanup = state.codes.spawn_cleanup();
    let data = web::Data::new(state);

    let website_url = config.website_url.clone();
    log::info!("Starting Moner server at {}", config.server_url());

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&website_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(data.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(routes::health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
