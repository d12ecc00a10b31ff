use coinflip_client::config::{
    self,
    Invocation,
};
use color_eyre::eyre::Result;

mod client;
mod ui;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = match config::from_env()? {
        Invocation::Run(app_config) => app_config,
        Invocation::Help => {
            println!("{}", config::usage());
            return Ok(());
        }
    };
    let _log_guard = client::init_tracing(&app_config.log_dir)?;
    tracing::info!("starting coinflip client");
    client::run_app(app_config).await
}
