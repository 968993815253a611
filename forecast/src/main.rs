mod config;
mod host;
mod owm;
mod sensor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
