use async_trait::async_trait;

#[async_trait]
pub trait Service: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
    async fn restart(&self) -> anyhow::Result<()> {
        self.stop().await?;
        self.start().await?;
        Ok(())
    }
    fn name(&self) -> &str;
    async fn is_running(&self) -> bool;
}
