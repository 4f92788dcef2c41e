#[tokio::main]
async fn main() -> anyhow::Result<()> {
    edurural_client::run().await
}
