use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use dice_relay::api::{router, AppState};
use dice_relay::chain::ChainClient;
use dice_relay::config::RelayerConfig;
use dice_relay::relay::RelayService;
use dice_relay::store::BetStore;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = RelayerConfig::from_env()?;
    let chain = ChainClient::new(&config)?;
    tracing::info!(
        relayer = ?chain.relayer(),
        network = ?config.network,
        game = ?config.game_address,
        token = ?config.token_address,
        "relayer ready"
    );

    let state = AppState {
        relay: RelayService::new(Arc::new(chain)),
        bets: Arc::new(BetStore::new()),
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
