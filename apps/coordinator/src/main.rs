// [apps/coordinator/src/main.rs]
use gridx_coordinator::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    gridx_shared_telemetry::init_tracing("gridx_coordinator");

    let config = Config::from_env();
    let kernel = CoordinatorKernel::ignite(config).await;
    kernel.launch().await;
}
