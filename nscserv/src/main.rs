mod auth;
mod config;
mod db;
mod error;
mod handlers;
mod jobs;
mod mailer;
mod state;
mod tls;

use actix_web::middleware::Logger;
use actix_web::web;
use actix_web::{App, HttpServer};
use anyhow::{anyhow, Context};
use tracing::info;

use crate::config::AppConfig;
use crate::handlers::{account, admin, auth as auth_handlers, kyc, notifications, packages, withdrawals};
use crate::mailer::MailerHandle;
use crate::state::AppState;

pub fn configure_routes() -> impl actix_web::dev::HttpServiceFactory {
    web::scope("")
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .service(
                    web::scope("/auth")
                        .route("/register", web::post().to(auth_handlers::register))
                        .route("/login", web::post().to(auth_handlers::login))
                        .route("/refresh", web::post().to(auth_handlers::refresh))
                        .route("/logout", web::post().to(auth_handlers::logout))
                        .route("/forgot-password", web::post().to(auth_handlers::forgot_password))
                        .route("/reset-password", web::post().to(auth_handlers::reset_password))
                )
                .route("/me", web::get().to(account::me))
                .route("/dashboard", web::get().to(account::dashboard))
                .route("/bot/activate", web::post().to(account::activate_bot))
                .route("/payments", web::get().to(account::list_payments))
                .route("/earnings", web::get().to(account::list_earnings))
                .route("/transactions", web::get().to(account::list_transactions))
                .route("/referrals", web::get().to(account::referrals))
                .route("/packages/plans", web::get().to(packages::list_plans))
                .route("/packages", web::get().to(packages::list_packages))
                .route("/packages", web::post().to(packages::purchase))
                .route("/withdrawals", web::get().to(withdrawals::list_withdrawals))
                .route("/withdrawals", web::post().to(withdrawals::request_withdrawal))
                .route("/kyc", web::get().to(kyc::get_kyc))
                .route("/kyc", web::post().to(kyc::submit_kyc))
                .route("/notifications", web::get().to(notifications::list_notifications))
                .route("/notifications/read-all", web::post().to(notifications::mark_all_read))
                .route("/notifications/{id}/read", web::post().to(notifications::mark_read))
                .service(
                    web::scope("/admin")
                        .route("/stats", web::get().to(admin::stats))
                        .route("/users", web::get().to(admin::list_users))
                        .route("/users/{id}/status", web::post().to(admin::set_user_status))
                        .route("/payments", web::get().to(admin::list_payments))
                        .route("/payments/{id}/approve", web::post().to(admin::approve_payment))
                        .route("/payments/{id}/reject", web::post().to(admin::reject_payment))
                        .route("/withdrawals", web::get().to(admin::list_withdrawals))
                        .route("/withdrawals/{id}/approve", web::post().to(admin::approve_withdrawal))
                        .route("/withdrawals/{id}/reject", web::post().to(admin::reject_withdrawal))
                        .route("/withdrawals/{id}/complete", web::post().to(admin::complete_withdrawal))
                        .route("/kyc", web::get().to(admin::list_kyc))
                        .route("/kyc/{id}/approve", web::post().to(admin::approve_kyc))
                        .route("/kyc/{id}/reject", web::post().to(admin::reject_kyc))
                        .route("/roi/run", web::post().to(admin::run_roi))
                        .route("/audit-logs", web::get().to(admin::audit_logs))
                )
        )
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let mut _guard = None;

    if std::env::var("SERVER_LOG").unwrap_or_default() == "true" {
        let file_appender = tracing_appender::rolling::RollingFileAppender::new(
            tracing_appender::rolling::Rotation::DAILY,
            "./logs",
            "nsc-server.log"
        );
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .with_writer(tracing_subscriber::fmt::writer::MakeWriterExt::and(non_blocking, std::io::stdout))
            .with_file(true)
            .with_line_number(true)
            .with_env_filter("info,actix_server=warn,actix_http::h1::dispatcher=off")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();

        _guard = Some(guard);
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stdout)
            .with_file(true)
            .with_line_number(true)
            .with_env_filter("info,actix_server=warn,actix_http::h1::dispatcher=off")
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new("%Y-%m-%dT%H:%M:%S".to_string()))
            .init();
    }

    let config = AppConfig::from_env().context("invalid configuration")?;

    let db_pool = db::init::init_pool(&config)
        .map_err(|e| anyhow!("failed to initialize database: {e}"))?;

    db::init::run_migrations(&db_pool)
        .map_err(|e| anyhow!("failed to run database migrations: {e}"))?;

    if let Some(bootstrap) = &config.admin {
        db::init::init_admin(&db_pool, bootstrap).context("failed to initialize admin account")?;
    }

    info!("✅ Database initialized");

    let mailer = MailerHandle::from_config(config.smtp.as_ref(), &config.app_name, &config.app_base_url)
        .context("failed to configure mailer")?;
    let app_state = AppState::new(config.clone(), mailer.clone()).context("failed to initialize token service")?;

    jobs::roi::spawn_scheduler(db_pool.clone(), mailer, config.roi_interval_secs, config.roi_batch_size);

    let state_data = web::Data::new(app_state);
    let db_data = web::Data::new(db_pool);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(db_data.clone())
            .wrap(Logger::default())
            .service(configure_routes())
    });

    if config.use_tls {
        let tls_config = tls::load(&config.tls_cert, &config.tls_key).context("failed to load TLS certificate")?;
        info!("Server starting with TLS on https://{}/", config.bind_addr);

        server
            .bind_rustls_0_23(config.bind_addr.as_str(), tls_config)?
            .run()
            .await?;
    } else {
        info!("Server starting on http://{}/", config.bind_addr);

        server
            .bind(config.bind_addr.as_str())?
            .run()
            .await?;
    }

    Ok(())
}
