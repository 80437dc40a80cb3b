use logic_server::{serve, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG 未设置时默认 info
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    match serve(config).await {
        Ok(outcome) => {
            info!(declarer = %outcome.declarer, winners = %outcome.winners, "服务器退出");
            Ok(())
        }
        Err(e) => {
            error!("游戏异常结束: {e}");
            Err(e.into())
        }
    }
}
