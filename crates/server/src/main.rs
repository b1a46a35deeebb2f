#[tokio::main]
async fn main() -> anyhow::Result<()> {
    schoolhub_server::run().await
}
