#[tokio::main]
async fn main() -> anyhow::Result<()> {
    resource_server::app::run().await
}
