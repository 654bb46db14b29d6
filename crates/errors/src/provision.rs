//! Provisioning connector error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ProvisionError {
    #[error("registration failed: {message}")]
    RegistrationFailed { message: String },

    #[error("registration timed out after {seconds}s")]
    RegistrationTimeout { seconds: u64 },

    #[error("channel error: {message}")]
    ChannelError { message: String },

    #[error("inventory publish failed: {message}")]
    PublishFailed { message: String },

    #[error("backup upload failed: {message}")]
    UploadFailed { message: String },
}
