//! Transport behind the connector

use crate::wire::{AdminCommand, InventoryReport, RegisterRequest, RegisterResponse};
use async_trait::async_trait;
use ism_errors::{Error, ProvisionError};
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

/// Transport to a provisioning peer
#[async_trait]
pub trait ProvisioningChannel: Send + Sync {
    /// Where this channel points, for diagnostics
    fn endpoint(&self) -> String;

    /// Announce the node to the peer
    ///
    /// # Errors
    ///
    /// Returns an error when the peer is unreachable or rejects the request
    /// outright; an answered-but-declined registration comes back as a
    /// response with `accepted: false`.
    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, Error>;

    /// Publish the node's full service inventory
    ///
    /// # Errors
    ///
    /// Returns an error when the peer is unreachable or answers with a
    /// failure status.
    async fn publish_inventory(&self, report: &InventoryReport) -> Result<(), Error>;

    /// Fetch pending administrative commands for this node
    ///
    /// # Errors
    ///
    /// Returns an error when the peer is unreachable or the answer cannot
    /// be decoded.
    async fn poll_commands(&self, node_id: Uuid) -> Result<Vec<AdminCommand>, Error>;

    /// Push one file (a backup archive) to the peer
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or the peer refuses
    /// the upload.
    async fn upload_file(&self, node_id: Uuid, file: &Path) -> Result<(), Error>;
}

/// JSON-over-HTTP channel
pub struct HttpChannel {
    client: Client,
    base_url: String,
}

impl HttpChannel {
    /// Build a channel against `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(base_url: impl Into<String>) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(format!("ismd/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProvisionError::ChannelError {
                message: e.to_string(),
            })?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl ProvisioningChannel for HttpChannel {
    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, Error> {
        let response = self
            .client
            .post(self.url("nodes/register"))
            .json(request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ProvisionError::RegistrationFailed {
                message: e.to_string(),
            })?;
        response
            .json()
            .await
            .map_err(|e| Error::from(ProvisionError::RegistrationFailed {
                message: e.to_string(),
            }))
    }

    async fn publish_inventory(&self, report: &InventoryReport) -> Result<(), Error> {
        self.client
            .post(self.url(&format!("nodes/{}/inventory", report.node_id)))
            .json(report)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ProvisionError::PublishFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn poll_commands(&self, node_id: Uuid) -> Result<Vec<AdminCommand>, Error> {
        let response = self
            .client
            .get(self.url(&format!("nodes/{node_id}/commands")))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ProvisionError::ChannelError {
                message: e.to_string(),
            })?;
        response
            .json()
            .await
            .map_err(|e| Error::from(ProvisionError::ChannelError {
                message: e.to_string(),
            }))
    }

    async fn upload_file(&self, node_id: Uuid, file: &Path) -> Result<(), Error> {
        let bytes = tokio::fs::read(file)
            .await
            .map_err(|e| Error::io_with_path(&e, file))?;
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("backup")
            .to_string();
        self.client
            .post(self.url(&format!("nodes/{node_id}/backups")))
            .query(&[("file", name.as_str())])
            .body(bytes)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| ProvisionError::UploadFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }
}
