use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    rbdedup_cli::main_entry().await
}
