use mixdeck_server_lib::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    mixdeck_server_lib::run(config).await
}
