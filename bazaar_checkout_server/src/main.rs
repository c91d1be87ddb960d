use bazaar_checkout_server::{config::ServerConfig, server::run_server};
use log::*;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    match run_server(config).await {
        Ok(()) => info!("🚀️ Bye."),
        Err(e) => error!("🚀️ Server exited with an error: {e}"),
    }
    Ok(())
}
