use dex_sync::logic::Selectors;
use dex_sync::{SyncConfig, SyncServiceBuilder};
use eyre::Result;
use std::time::Duration;
use tracing::info;

/// Sync pools and one wallet against a live cluster and print what the
/// stores hold.
///
/// Usage: cargo run --example watch_wallet -- <wallet address> [seconds]
/// Endpoints come from the environment (see `SyncConfig::from_env`).
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let wallet = args.next().or_else(|| std::env::var("WATCH_WALLET").ok());
    let seconds: u64 = args.next().and_then(|s| s.parse().ok()).unwrap_or(30);

    let config = SyncConfig::from_env()?;
    info!("Using RPC {} / {}", config.rpc_http_url, config.rpc_wss_url);

    let service = SyncServiceBuilder::new().with_config(config).build()?;
    service.start().await?;
    if let Some(wallet) = wallet.as_deref() {
        service.connect_wallet_str(wallet)?;
    }

    let selectors = Selectors::new(service.stores().clone());
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    for _ in 0..seconds.div_ceil(5) {
        ticker.tick().await;
        let stats = service.stats();
        println!(
            "pools={} ({}) token_accounts={} ({}) mints={} price hit rate={:.2}",
            stats.store_sizes.pools,
            stats.pools,
            stats.store_sizes.token_accounts,
            stats.token_accounts,
            stats.store_sizes.mints,
            stats.price_hit_rate,
        );

        if let Ok(wallet) = service.wallet() {
            if let Some(sol) = selectors.wallet_balance_sol(&wallet) {
                println!("  {} holds {:.4} SOL", wallet, sol);
            }
            for (address, account) in selectors.token_accounts_of(&wallet).iter() {
                let symbol = selectors.mint(&account.mint).map(|m| m.display_symbol()).unwrap_or_else(|| account.mint.to_string());
                println!("  {} {} {}", address, symbol, account.amount);
            }
        }
    }

    println!("All pools TVL: {:.2}", service.all_tvl().await);
    service.stop();
    Ok(())
}
