//! govctl binary

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    govern_cli::run().await?;
    Ok(())
}
