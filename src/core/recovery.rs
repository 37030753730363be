//! Out-of-band recovery of a wedged sensor bus.
//!
//! When the I²C transaction fails, the node asks an external smart-plug
//! controller to power-cycle it. The request is fire-and-forget from the
//! sampler's point of view: failures are logged and never propagated.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::config::recovery::RecoveryConfig;

/// Header carrying the controller's API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Recovery request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Something that can be asked to reset the sensor hardware.
#[async_trait::async_trait]
pub trait RecoveryTrigger: Send + Sync {
    async fn trigger(&self);
}

/// Calls the plug controller's reset endpoint with `PUT`.
pub struct HttpRecovery {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpRecovery {
    /// # Errors
    ///
    /// Returns `RecoveryError::Client` if the TLS backend cannot be initialized.
    pub fn new(config: &RecoveryConfig) -> Result<Self, RecoveryError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(RecoveryError::Client)?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            api_key: config.api_key.clone(),
        })
    }

    async fn request(&self) -> Result<StatusCode, RecoveryError> {
        let response = self
            .client
            .put(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|source| RecoveryError::Request {
                endpoint: self.endpoint.clone(),
                source,
            })?;
        Ok(response.status())
    }
}

#[async_trait::async_trait]
impl RecoveryTrigger for HttpRecovery {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn trigger(&self) {
        match self.request().await {
            Ok(status) if status.is_success() => info!("Sensor reset requested ({})", status),
            Ok(status) => warn!("Sensor reset rejected by controller: {}", status),
            Err(e) => error!("Sensor reset request failed: {}", e),
        }
    }
}

/// Used when recovery is disabled in configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRecovery;

#[async_trait::async_trait]
impl RecoveryTrigger for NoRecovery {
    async fn trigger(&self) {
        warn!("Sensor fault detected but recovery is disabled");
    }
}

/// Builds the trigger selected by `config.enabled`.
///
/// # Errors
///
/// Propagates `RecoveryError` from the HTTP client setup.
pub fn from_config(config: &RecoveryConfig) -> Result<Arc<dyn RecoveryTrigger>, RecoveryError> {
    if config.enabled {
        Ok(Arc::new(HttpRecovery::new(config)?))
    } else {
        Ok(Arc::new(NoRecovery))
    }
}
