//! Connector state machine over a provisioning channel

use crate::channel::ProvisioningChannel;
use crate::wire::{AdminCommand, InventoryReport, RegisterRequest};
use async_trait::async_trait;
use ism_backup::UploadSink;
use ism_decide::PluginRegistry;
use ism_errors::{Error, ProvisionError};
use ism_events::{AppEvent, EventEmitter, EventSender, ProvisionEvent};
use ism_types::{normalize_service_name, AcceptedUpdates, NodeState, PluginInfo, ServiceDescriptor};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Receiving side of the forwarded administrative commands
pub type CommandReceiver = mpsc::UnboundedReceiver<AdminCommand>;

/// Registers the node with a provisioning peer, publishes inventory and
/// forwards administrative commands to the daemon.
pub struct ProvisioningConnector {
    node: Arc<NodeState>,
    registry: Arc<PluginRegistry>,
    channel: Arc<dyn ProvisioningChannel>,
    registration_timeout: Duration,
    reconnect_delay: Duration,
    registered: AtomicBool,
    commands: mpsc::UnboundedSender<AdminCommand>,
    tx: Option<EventSender>,
}

impl EventEmitter for ProvisioningConnector {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl ProvisioningConnector {
    /// Create a connector plus the receiver for forwarded commands
    #[must_use]
    pub fn new(
        node: Arc<NodeState>,
        registry: Arc<PluginRegistry>,
        channel: Arc<dyn ProvisioningChannel>,
    ) -> (Self, CommandReceiver) {
        let (commands, receiver) = mpsc::unbounded_channel();
        (
            Self {
                node,
                registry,
                channel,
                registration_timeout: Duration::from_secs(30),
                reconnect_delay: Duration::from_secs(10),
                registered: AtomicBool::new(false),
                commands,
                tx: None,
            },
            receiver,
        )
    }

    /// Window the register call must answer within
    #[must_use]
    pub fn with_registration_timeout(mut self, timeout: Duration) -> Self {
        self.registration_timeout = timeout;
        self
    }

    /// Fixed delay before the single reconnect attempt
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Attach an event channel
    #[must_use]
    pub fn with_events(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Whether the node currently holds a registration
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Register the node with the peer
    ///
    /// The register call is the one network operation with an explicit
    /// timeout; everything else relies on the channel's own limits.
    ///
    /// # Errors
    ///
    /// Returns an error when the call times out, the peer is unreachable,
    /// or the peer declines the registration.
    pub async fn register(&self) -> Result<(), Error> {
        let identity = self.node.identity();
        self.emit(AppEvent::Provision(ProvisionEvent::Registering {
            endpoint: self.channel.endpoint(),
        }));

        let request = RegisterRequest {
            node_id: identity.node_id,
            scope: identity.scope.clone(),
            service_name: identity.service_name.clone(),
            version: identity.running_version,
            platform: identity.platform,
        };

        let seconds = self.registration_timeout.as_secs();
        let result = tokio::time::timeout(
            self.registration_timeout,
            self.channel.register(&request),
        )
        .await;
        let response = match result {
            Ok(answer) => answer?,
            Err(_) => {
                self.emit(AppEvent::Provision(ProvisionEvent::RegistrationTimeout {
                    seconds,
                }));
                return Err(ProvisionError::RegistrationTimeout { seconds }.into());
            }
        };

        if !response.accepted {
            return Err(ProvisionError::RegistrationFailed {
                message: response
                    .message
                    .unwrap_or_else(|| "registration declined".to_string()),
            }
            .into());
        }

        self.registered.store(true, Ordering::SeqCst);
        self.emit(AppEvent::Provision(ProvisionEvent::Registered {
            node_id: identity.node_id,
        }));
        Ok(())
    }

    /// Merge the registry with the accepted candidates of the last scan
    /// into one inventory report
    ///
    /// Registry entries already carry their pending markers; accepted
    /// candidates without a registry entry are added as new services,
    /// enriched from a sibling service descriptor when one exists.
    #[must_use]
    pub fn build_inventory(
        &self,
        accepted: &AcceptedUpdates,
        update_ext: &str,
        auxiliary_ext: &str,
    ) -> InventoryReport {
        let identity = self.node.identity();

        let mut own = PluginInfo::new(identity.service_name.clone(), identity.running_version);
        own.platform = identity.platform.to_string();
        for candidate in accepted.candidates() {
            if candidate
                .service_name
                .eq_ignore_ascii_case(&identity.service_name)
            {
                own.pending_version = Some(candidate.version);
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(normalize_service_name(&own.service_name));
        let mut services = vec![own];

        for info in self.registry.snapshot() {
            if seen.insert(normalize_service_name(&info.service_name)) {
                services.push(info);
            }
        }

        for candidate in accepted.candidates() {
            if !seen.insert(normalize_service_name(&candidate.service_name)) {
                continue;
            }
            let mut info = PluginInfo::new(candidate.service_name.clone(), candidate.version);
            info.pending_version = Some(candidate.version);
            if let Some(descriptor) = ServiceDescriptor::load_sibling(
                &candidate.path,
                &candidate.service_name,
                update_ext,
                auxiliary_ext,
            ) {
                info.capabilities = descriptor.capabilities;
                info.platform = descriptor.platform;
            }
            services.push(info);
        }

        services.sort_by(|a, b| a.service_name.cmp(&b.service_name));
        InventoryReport {
            node_id: identity.node_id,
            scope: identity.scope.clone(),
            services,
        }
    }

    /// Publish an inventory report upstream
    ///
    /// # Errors
    ///
    /// Returns an error when the peer is unreachable or refuses the report.
    pub async fn publish_inventory(&self, report: &InventoryReport) -> Result<(), Error> {
        self.channel.publish_inventory(report).await?;
        self.emit(AppEvent::Provision(ProvisionEvent::InventoryPublished {
            services: report.services.len(),
        }));
        Ok(())
    }

    /// Fetch pending commands and forward them to the daemon
    ///
    /// # Errors
    ///
    /// Returns an error when the poll itself fails; a closed daemon side
    /// silently drops the remaining commands.
    pub async fn poll_commands(&self) -> Result<usize, Error> {
        let commands = self
            .channel
            .poll_commands(self.node.identity().node_id)
            .await?;
        let count = commands.len();
        for command in commands {
            self.emit(AppEvent::Provision(ProvisionEvent::CommandReceived {
                verb: command.verb().to_string(),
            }));
            if self.commands.send(command).is_err() {
                break;
            }
        }
        Ok(count)
    }

    /// Register, then poll for commands until the node stops
    ///
    /// A failed poll marks the link disconnected and triggers one reconnect
    /// after the fixed delay; a second consecutive failure ends the loop.
    pub async fn run(&self, poll_interval: Duration) {
        if self.register().await.is_err() {
            return;
        }

        while self.node.is_running() {
            tokio::time::sleep(poll_interval).await;
            if !self.node.is_running() {
                return;
            }
            if let Err(e) = self.poll_commands().await {
                self.registered.store(false, Ordering::SeqCst);
                self.emit(AppEvent::Provision(ProvisionEvent::Disconnected {
                    message: e.to_string(),
                }));
                self.emit(AppEvent::Provision(ProvisionEvent::Reconnecting {
                    delay_secs: self.reconnect_delay.as_secs(),
                }));
                tokio::time::sleep(self.reconnect_delay).await;
                if !self.node.is_running() || self.register().await.is_err() {
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl UploadSink for ProvisioningConnector {
    async fn upload(&self, file: &Path) -> Result<(), Error> {
        if !self.is_registered() {
            return Err(ProvisionError::UploadFailed {
                message: "node is not registered".to_string(),
            }
            .into());
        }
        self.channel
            .upload_file(self.node.identity().node_id, file)
            .await?;
        self.emit(AppEvent::Provision(ProvisionEvent::UploadCompleted {
            file: file.to_path_buf(),
        }));
        Ok(())
    }
}
