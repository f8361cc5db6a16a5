use std::env;

use ethers_core::types::U256;

use dice_relay::chain::ChainClient;
use dice_relay::config::RelayerConfig;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();

    let config = RelayerConfig::from_env()?;
    let chain = ChainClient::new(&config)?;

    let command = env::args().nth(1).unwrap_or_else(|| "status".to_owned());
    match command.as_str() {
        "status" => {
            println!("network: {:?}", config.network);
            println!("relayer: {:?}", chain.relayer());
            println!("owner:   {:?}", chain.game_owner().await?);
            println!("fee:     {}", chain.fee().await?);
        }
        "withdraw" => {
            let raw = env::args().nth(2).ok_or_else(|| eyre::eyre!("usage: admin withdraw <amount>"))?;
            let amount = U256::from_dec_str(&raw)?;
            println!("withdraw tx: {:?}", chain.withdraw(amount).await?);
        }
        "transfer-ownership" => {
            let raw = env::args()
                .nth(2)
                .ok_or_else(|| eyre::eyre!("usage: admin transfer-ownership <address>"))?;
            println!("transfer tx: {:?}", chain.transfer_ownership(raw.parse()?).await?);
        }
        other => eyre::bail!("unknown command: {other}"),
    }

    Ok(())
}
