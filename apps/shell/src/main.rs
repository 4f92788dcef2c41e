#[tokio::main]
async fn main() -> anyhow::Result<()> {
    edurural_shell::run().await
}
