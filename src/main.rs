#[tokio::main]
async fn main() -> anyhow::Result<()> {
    blunder_worker_lib::run().await
}
