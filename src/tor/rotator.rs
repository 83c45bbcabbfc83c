//! Exit identity rotation

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{info, instrument};

use super::control::ControlConnection;
use crate::config::TorConfig;
use crate::error::Result;

/// Something that can move subsequent traffic onto a new exit circuit
#[async_trait]
pub trait IdentityRotator: Send + Sync {
    /// Request a new identity and return once it is usable
    async fn rotate(&self) -> Result<()>;
}

/// Rotates identity through the Tor control port with `SIGNAL NEWNYM`
pub struct TorIdentityRotator {
    config: TorConfig,
}

impl TorIdentityRotator {
    pub fn new(config: TorConfig) -> Self {
        Self { config }
    }

    /// Random pause that lets Tor build the new circuit
    fn circuit_wait(&self) -> Duration {
        let secs = rand::thread_rng()
            .gen_range(self.config.circuit_wait_min..=self.config.circuit_wait_max);
        Duration::from_secs(secs)
    }
}

#[async_trait]
impl IdentityRotator for TorIdentityRotator {
    #[instrument(skip(self), fields(control = %self.config.control_addr()))]
    async fn rotate(&self) -> Result<()> {
        let mut conn = ControlConnection::connect(&self.config.control_addr()).await?;

        conn.authenticate(
            self.config.control_password.as_deref(),
            self.config.cookie_path.as_deref(),
        )
        .await?;
        info!("Authenticated with Tor control port");

        conn.new_identity().await?;
        info!("Sent NEWNYM signal");
        conn.quit().await;

        let wait = self.circuit_wait();
        info!(seconds = wait.as_secs(), "Building new circuit");
        tokio::time::sleep(wait).await;

        Ok(())
    }
}
