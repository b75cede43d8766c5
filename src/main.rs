use std::sync::Arc;

use dotenvy::dotenv;

use sghc_requisitions::{
    config::{AppConfig, StoreBackend},
    create_router,
    database::create_database_pool,
    registry::Registry,
    store::{
        seed, InventoryStore, MemoryInventoryStore, MemoryRequisitionStore, PgInventoryStore,
        PgRequisitionStore, RequisitionStore,
    },
    utils::AdminTokens,
    AppState,
};

async fn build_stores(
    config: &AppConfig,
) -> Result<(Arc<dyn InventoryStore>, Arc<dyn RequisitionStore>), sqlx::Error> {
    match &config.backend {
        StoreBackend::Postgres {
            inventory_url,
            requisitions_url,
        } => {
            let inventory_db = create_database_pool("stock registry", inventory_url).await?;
            let requisitions_db = create_database_pool("requisitions", requisitions_url).await?;
            Ok((
                Arc::new(PgInventoryStore::new(inventory_db)),
                Arc::new(PgRequisitionStore::new(
                    requisitions_db,
                    config.default_admin_password.clone(),
                )),
            ))
        }
        StoreBackend::Memory => {
            log::warn!("using in-memory stores; data is lost on restart");
            Ok((
                Arc::new(MemoryInventoryStore::new(seed::demo_inventory())),
                Arc::new(MemoryRequisitionStore::new(config.default_admin_password.clone())),
            ))
        }
    }
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env().expect("invalid configuration");

    let (inventory_store, requisition_store) = build_stores(&config)
        .await
        .expect("Failed to connect to database");

    let registry = Arc::new(Registry::new(inventory_store, requisition_store));
    if let Err(err) = registry.initialize().await {
        // Each periodic sync retries the schema setup and the load until one succeeds.
        log::error!("initial load failed: {}", err);
    }
    registry.clone().spawn_refresh_loop(config.refresh_interval);

    let app = create_router(AppState {
        registry,
        tokens: AdminTokens::new(config.jwt_secret.clone()),
        scope: config.dashboard_scope,
    });

    let addr = format!("0.0.0.0:{}", config.port);
    log::info!("requisition tracker listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app).await.expect("server error");
}
