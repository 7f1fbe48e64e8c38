use std::error::Error;

use dotenv::dotenv;
use tokio_util::sync::CancellationToken;

use adam_device_engine::common::logger::init_logger;
use adam_device_engine::common::setting::Settings;
use adam_device_engine::device_controller::device_manager::DeviceManager;
use adam_device_engine::{debug, info};

const LOG_TAG: &str = "main";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // check env file
    dotenv().ok();

    // load config
    let settings = Settings::load()?;

    // set up logger
    init_logger(&settings.env.log_level)?;
    info!(LOG_TAG, "config loaded, env: {}, mode: {}", settings.env.env, settings.env.mode);
    debug!(LOG_TAG, "config: {:?}", settings);

    // ctrl-c trips the token, every worker watches it
    let cancel = CancellationToken::new();
    let ctrlc_token = cancel.clone();
    ctrlc::set_handler(move || ctrlc_token.cancel())?;

    let manager = DeviceManager::start(&settings, cancel.clone()).await;
    info!(LOG_TAG, "{} devices running, press ctrl-c to stop", manager.devices().len());

    cancel.cancelled().await;
    manager.shutdown().await;
    info!(LOG_TAG, "bye");
    Ok(())
}
