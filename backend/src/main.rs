use churn_backend::config::AppConfig;
use churn_backend::server;
use clap::Parser;
use log::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .format_timestamp_millis()
        .format_module_path(false)
        .init();

    info!("Starting churn prediction API");
    server::run(config).await
}
