use core_config::Environment;
use core_config::tracing::{init_tracing, install_color_eyre};
use migration::Migrator;
use sea_orm_migration::cli;

/// Migration CLI: `cargo run -p migration -- up` (reads `DATABASE_URL`)
#[tokio::main]
async fn main() {
    install_color_eyre();
    init_tracing(&Environment::from_env());
    cli::run_cli(Migrator).await;
}
