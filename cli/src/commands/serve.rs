use anyhow::{Context, Result};
use blockscore::{
    api::{router, AppState},
    store::{StoreClient, StoreConfig},
};

pub fn run(cli: &crate::cli::Cli, args: &crate::cli::ServeArgs) -> Result<()> {
    let config = super::load_config(cli)?;
    let table_path = args.table.clone().unwrap_or(config.table_path);

    let store = match StoreConfig::from_env() {
        Some(store) => Some(StoreClient::new(store)?),
        None => {
            tracing::warn!("SUPABASE_URL / SUPABASE_SERVICE_ROLE_KEY unset; /api/listings is disabled");
            None
        }
    };
    let app = router(AppState { table_path: table_path.clone(), store });

    let runtime = tokio::runtime::Runtime::new().context("[serve] Failed to start async runtime")?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(args.addr).await
            .with_context(|| format!("[serve] Failed to bind {}", args.addr))?;
        tracing::info!(addr = %args.addr, table = %table_path.display(), "serving master table");

        axum::serve(listener, app)
            .with_graceful_shutdown(async { tokio::signal::ctrl_c().await.ok(); })
            .await
            .context("[serve] server error")
    })
}
