use time_ledger_sim::{app, config::AppConfig, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env()?;
    let _log_guard = logging::init_logging(&cfg);

    app::run(cfg).await
}
