use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Provisioning connector events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProvisionEvent {
    /// Registration with the provisioning service began
    Registering { endpoint: String },

    /// The node is registered
    Registered { node_id: Uuid },

    /// Registration did not answer within the configured window
    RegistrationTimeout { seconds: u64 },

    /// The channel to the provisioning service dropped
    Disconnected { message: String },

    /// One reconnect attempt is scheduled
    Reconnecting { delay_secs: u64 },

    /// The service inventory was published upstream
    InventoryPublished { services: usize },

    /// A file finished uploading to the provisioning service
    UploadCompleted { file: PathBuf },

    /// An administrative command arrived from upstream
    CommandReceived { verb: String },
}
