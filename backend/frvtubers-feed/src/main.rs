use actix_web::{web, App, HttpServer};
use std::io;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use frvtubers_feed::config::Config;
use frvtubers_feed::db::{self, PgPostStore, PostStore};
use frvtubers_feed::handlers::{
    describe_feed_generator, did_document, get_feed_skeleton, health, FeedHandlerState,
};
use frvtubers_feed::ingest::JetstreamConsumer;
use frvtubers_feed::jobs::start_roster_sync;
use frvtubers_feed::registry::{ManualOverrides, VtuberCatalog, VtuberRegistry};
use frvtubers_feed::services::{
    FeedAssembler, FirehoseSubscription, PostClassifier, RosterSource, TwitchRosterSource,
};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting frvtubers-feed v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Environment: {}, log level: {}, strategy: {}",
        config.app.env, config.app.log_level, config.feed.strategy
    );

    let pool = match db::init_pool(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database initialization failed: {:#}", e);
            eprintln!("ERROR: Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let catalog = match VtuberCatalog::from_config(&config.registry) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!("VTuber catalog loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load VTuber catalog: {}", e);
            std::process::exit(1);
        }
    };
    let registry = Arc::new(VtuberRegistry::new(
        catalog,
        ManualOverrides::from(&config.registry),
    ));
    let stats = registry.stats();
    info!(
        profiles = stats.profiles,
        team_profiles = stats.team_profiles,
        roster_members = stats.roster_members,
        "VTuber registry initialized"
    );

    let store: Arc<dyn PostStore> = Arc::new(PgPostStore::new(pool));

    // Team roster sync (disabled without Twitch credentials)
    let roster_source = match TwitchRosterSource::from_config(&config.roster) {
        Ok(source) => source.map(|source| Arc::new(source) as Arc<dyn RosterSource>),
        Err(e) => {
            tracing::error!("Twitch roster client creation failed: {:#}", e);
            eprintln!("ERROR: Failed to create Twitch roster client: {}", e);
            std::process::exit(1);
        }
    };
    if start_roster_sync(registry.clone(), roster_source, &config.roster).is_some() {
        info!("Team roster sync background job started");
    }

    // Firehose ingestion
    let subscription = Arc::new(FirehoseSubscription::new(
        registry.clone(),
        store.clone(),
        PostClassifier::new(config.feed.english_exclusion),
        config.ingest.log_posts,
    ));
    let consumer = JetstreamConsumer::new(config.ingest.clone(), subscription);
    tokio::spawn(consumer.run());
    info!("Jetstream consumer started");

    let feed_state = web::Data::new(FeedHandlerState {
        assembler: FeedAssembler::new(store, config.feed.strategy),
        config: config.feed.clone(),
    });
    let feed_config = web::Data::new(config.feed.clone());
    let registry_data = web::Data::from(registry);

    info!("HTTP server listening on 0.0.0.0:{}", config.app.port);
    HttpServer::new(move || {
        App::new()
            .app_data(feed_state.clone())
            .app_data(feed_config.clone())
            .app_data(registry_data.clone())
            .service(get_feed_skeleton)
            .service(describe_feed_generator)
            .service(did_document)
            .service(health)
            .route(
                "/metrics",
                web::get().to(frvtubers_feed::metrics::serve_metrics),
            )
    })
    .bind(format!("0.0.0.0:{}", config.app.port))?
    .run()
    .await
}
