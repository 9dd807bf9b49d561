use std::sync::Arc;

use auth::Authenticator;
use auth::PasswordHasher;
use auth_service::authentication::service::AuthenticationService;
use auth_service::authentication::service::LinkSettings;
use auth_service::authentication::strategy::LocalStrategy;
use auth_service::config::Config;
use auth_service::inbound::consumers::EmailEventConsumer;
use auth_service::inbound::http::router::create_router;
use auth_service::notification::service::EmailNotificationService;
use auth_service::outbound::email::HandlebarsTemplateRenderer;
use auth_service::outbound::email::SmtpEmailTransport;
use auth_service::outbound::events::KafkaEventProducer;
use auth_service::outbound::events::OutboxRelay;
use auth_service::outbound::repositories::PostgresAuthenticationRepository;
use auth_service::outbound::repositories::PostgresEventRecorder;
use auth_service::outbound::revocation::RedisRevocationStore;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auth_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "auth-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        kafka_brokers = %config.kafka.brokers,
        kafka_topic = %config.kafka.topic,
        base_url = %config.application.base_url,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let revocation_store = Arc::new(RedisRevocationStore::connect(&config.redis.url).await?);

    let event_producer = Arc::new(KafkaEventProducer::new(&config)?);
    let event_store = Arc::new(PostgresEventRecorder::new(pg_pool.clone()));
    let repository = Arc::new(PostgresAuthenticationRepository::new(pg_pool));

    let authenticator = Arc::new(Authenticator::new(
        config.jwt.secret.as_bytes(),
        PasswordHasher::new(config.password.secret.as_bytes()),
        config.jwt.lifetimes(),
    ));

    let authentication_service = Arc::new(AuthenticationService::new(
        Arc::clone(&repository),
        Arc::clone(&event_store),
        Arc::clone(&event_producer),
        revocation_store,
        Arc::clone(&authenticator),
        LinkSettings::new(config.application.base_url.as_str()),
    ));
    let local_strategy = Arc::new(LocalStrategy::new(repository, authenticator));

    let notification_service = Arc::new(EmailNotificationService::new(
        Arc::clone(&authentication_service),
        Arc::new(SmtpEmailTransport::new(&config.email)?),
        Arc::new(HandlebarsTemplateRenderer::new(
            config.email.templates_dir.as_str(),
        )),
        config.email.from.as_str(),
    ));
    let email_consumer = EmailEventConsumer::new(&config, notification_service)?;

    let outbox_relay = OutboxRelay::new(
        event_store,
        event_producer,
        config.outbox.relay_settings(),
    );

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(
        authentication_service,
        local_strategy,
        config.application.base_url.starts_with("https://"),
    );
    let http_server =
        tokio::spawn(async move { axum::serve(http_listener, http_application).await });
    let consumer_task = tokio::spawn(email_consumer.start_consuming());
    let relay_task = tokio::spawn(outbox_relay.run());

    match tokio::try_join!(http_server, consumer_task, relay_task) {
        Ok((http, consumer, relay)) => {
            if let Err(e) = http {
                tracing::error!(error = %e, "Http server error");
            }
            if let Err(e) = consumer {
                tracing::error!(error = %e, "Email consumer error");
            }
            if let Err(e) = relay {
                tracing::error!(error = %e, "Outbox relay error");
            }
            tracing::info!("Tasks exited");
        }
        Err(e) => tracing::error!(error = %e, "Task panicked"),
    };

    Ok(())
}
