use log::{error, info};
use shellgate::configuration::Config;
use shellgate::controller::Controller;

#[tokio::main]
async fn main() {
    // https://docs.rs/env_logger/latest/env_logger/
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    println!(
        "
=============================================================
        shellgate v{} - browser console for LXC containers
=============================================================
",
        env!("CARGO_PKG_VERSION")
    );

    info!("Importing configuration");

    let config = Config::from_args().unwrap_or_else(|e| {
        error!("Unable to import configuration: {}", e);
        std::process::exit(1);
    });

    let controller = Controller::new(config).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });

    if let Err(e) = controller.run().await {
        error!("Error occured in the controller process: {}, exiting...", e);
        std::process::exit(1);
    }

    info!("Shutdown complete");
}
