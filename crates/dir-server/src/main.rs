use std::sync::Arc;

use dir_config::Config;
use dir_index::SearchIndex;
use dir_routing::RoutingHost;
use dir_scheduler::{AnonymousCredentials, PublicationScheduler, SyncScheduler};
use dir_server::{
    AppState, PublicationServiceImpl, RoutingServiceImpl, SearchServiceImpl, SignServiceImpl,
    StoreServiceImpl, SyncServiceImpl,
};
use dir_store::ContentStore;
use oci_client::secrets::RegistryAuth;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = load_config()?;

    let auth = match (&config.oci.username, &config.oci.password) {
        (Some(u), Some(p)) => RegistryAuth::Basic(u.clone(), p.clone()),
        _ => RegistryAuth::Anonymous,
    };
    let store = Arc::new(ContentStore::new(
        config.oci.registry_address.clone(),
        config.oci.repository_name.clone(),
        auth,
    ));

    let index = Arc::new(SearchIndex::open(&config.search.sqlite.db_path).await?);

    // The scheduler tables live alongside the search index, in the same
    // SQLite file; their migrations touch disjoint tables.
    let scheduler_opts: SqliteConnectOptions =
        config.search.sqlite.db_path.parse::<SqliteConnectOptions>()?;
    let scheduler_pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(scheduler_opts.create_if_missing(true))
        .await?;
    dir_scheduler::MIGRATOR.run(&scheduler_pool).await?;

    let metadata_db_path = format!("{}.routing-metadata", config.search.sqlite.db_path);
    let metadata_db = sled::open(&metadata_db_path)?;
    let routing = Arc::new(
        RoutingHost::start(
            &config.routing.listen_address,
            &config.routing.bootstrap_peers,
            config.routing.refresh_interval,
            config.routing.refresh_interval * 4,
            &metadata_db,
        )
        .await?,
    );
    tracing::info!(peer_id = %routing.local_peer_id(), "routing host started");

    let publications = Arc::new(PublicationScheduler::new(
        scheduler_pool.clone(),
        store.clone(),
        index.clone(),
        routing.clone(),
    ));
    let syncs = Arc::new(SyncScheduler::new(
        scheduler_pool,
        store.clone(),
        index.clone(),
        Arc::new(AnonymousCredentials),
        config.oci.repository_name.clone(),
        routing.local_peer_id(),
    ));

    let state = AppState { store, index, routing: routing.clone(), publications, syncs };

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    let publication_task = spawn_publication_loop(state.clone(), &config, shutdown_tx.subscribe());
    let sync_task = spawn_sync_loop(state.clone(), &config, shutdown_tx.subscribe());
    let refresh_task = spawn_routing_refresh_loop(routing.clone(), shutdown_tx.subscribe());

    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter.set_serving::<dir_proto::dir::v1::store_service_server::StoreServiceServer<StoreServiceImpl>>().await;

    let addr = config.listen_address.parse()?;
    tracing::info!(%addr, "serving directory core gRPC services");

    let server = tonic::transport::Server::builder()
        .add_service(health_service)
        .add_service(dir_proto::dir::v1::store_service_server::StoreServiceServer::new(
            StoreServiceImpl::new(state.clone()),
        ))
        .add_service(dir_proto::dir::v1::routing_service_server::RoutingServiceServer::new(
            RoutingServiceImpl::new(state.clone()),
        ))
        .add_service(dir_proto::dir::v1::search_service_server::SearchServiceServer::new(
            SearchServiceImpl::new(state.clone()),
        ))
        .add_service(dir_proto::dir::v1::publication_service_server::PublicationServiceServer::new(
            PublicationServiceImpl::new(state.clone()),
        ))
        .add_service(dir_proto::dir::v1::sync_service_server::SyncServiceServer::new(
            SyncServiceImpl::new(state.clone(), config.oci.registry_address.clone()),
        ))
        .add_service(dir_proto::dir::v1::sign_service_server::SignServiceServer::new(
            SignServiceImpl::new(state),
        ))
        .serve_with_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        });

    server.await?;

    tracing::info!("draining schedulers before exit");
    let _ = shutdown_tx.send(());
    let _ = tokio::join!(publication_task, sync_task, refresh_task);

    match Arc::try_unwrap(routing) {
        Ok(routing) => routing.stop().await,
        Err(_) => tracing::warn!("routing host still has outstanding references at shutdown"),
    }

    Ok(())
}

fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let path = std::env::var("DIR_CONFIG").unwrap_or_else(|_| "dir-server.json".to_string());
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| format!("failed to read config at {path}: {e}"))?;
    Ok(serde_json::from_str(&raw)?)
}

fn spawn_publication_loop(
    state: AppState,
    config: &Config,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let interval = config.sync.scheduler_interval;
    let permits = config.sync.worker_count as usize;
    tokio::spawn(async move {
        dir_scheduler::run_poll_loop(
            permits,
            interval,
            || {
                let state = state.clone();
                async move {
                    if let Err(err) = state.publications.poll_once(permits as i64).await {
                        tracing::warn!(%err, "publication poll tick failed");
                    }
                }
            },
            async move {
                let _ = shutdown.recv().await;
            },
        )
        .await;
    })
}

fn spawn_sync_loop(
    state: AppState,
    config: &Config,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let interval = config.sync.scheduler_interval;
    let permits = config.sync.worker_count as usize;
    tokio::spawn(async move {
        dir_scheduler::run_poll_loop(
            permits,
            interval,
            || {
                let state = state.clone();
                async move {
                    if let Err(err) = state.syncs.poll_once(permits as i64).await {
                        tracing::warn!(%err, "sync poll tick failed");
                    }
                }
            },
            async move {
                let _ = shutdown.recv().await;
            },
        )
        .await;
    })
}

fn spawn_routing_refresh_loop(
    routing: Arc<RoutingHost>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let interval = routing.refresh_interval();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(interval) => {
                    if let Err(err) = routing.refresh_tick().await {
                        tracing::warn!(%err, "routing refresh tick failed");
                    }
                }
            }
        }
    })
}
