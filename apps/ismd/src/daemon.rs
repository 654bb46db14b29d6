//! Daemon wiring: event bridge, timers, provisioning and shutdown

use crate::trust::ScopeTokenVerifier;
use ism_backup::UploadSink;
use ism_config::Config;
use ism_decide::PluginRegistry;
use ism_errors::Error;
use ism_events::{AppEvent, EventReceiver};
use ism_install::{LaunchOutcome, ShutdownHook};
use ism_lifecycle::UpdateManager;
use ism_provision::{AdminCommand, CommandReceiver, HttpChannel, ProvisioningConnector};
use ism_types::{NodeIdentity, NodeState, Platform, RestartVerb, Uuid};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Level};

/// How often the connector polls the peer for admin commands
const COMMAND_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Settle time before a relaunch verb takes over the node directory
const RELAUNCH_GRACE: Duration = Duration::from_secs(2);

/// Longest wait for registration before the first scan publishes inventory
const REGISTRATION_HEAD_START: Duration = Duration::from_secs(10);

/// Funnel for shutdown requests: either flavor clears the running flag so
/// timers and retry loops stop, and wakes the main loop so the process can
/// exit.
pub struct DaemonShutdown {
    node: Arc<NodeState>,
    notify: Notify,
}

impl DaemonShutdown {
    pub fn new(node: Arc<NodeState>) -> Self {
        Self {
            node,
            notify: Notify::new(),
        }
    }

    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl ShutdownHook for DaemonShutdown {
    fn request_shutdown(&self, hard: bool) {
        info!(hard, "shutdown requested");
        self.node.begin_shutdown();
        self.notify.notify_one();
    }
}

/// Node identity comes from configuration plus a fresh per-process id.
pub fn build_node(config: &Config) -> Result<Arc<NodeState>, Error> {
    let identity = NodeIdentity {
        node_id: Uuid::new_v4(),
        scope: config.node.scope.clone(),
        service_name: config.node.service_name.clone(),
        running_version: config.node.running_version()?,
        hosting: config.node.hosting(),
        platform: Platform::current(),
    };
    Ok(Arc::new(NodeState::new(
        identity,
        config.node.remote_admin_enabled,
    )))
}

/// Manager plus the bridge task feeding its events into the log. The bridge
/// finishes once every sender clone is dropped; one-shot commands await it
/// so nothing queued is lost.
pub fn build_manager(config: &Config) -> Result<(Arc<UpdateManager>, JoinHandle<()>), Error> {
    let node = build_node(config)?;
    let registry = Arc::new(PluginRegistry::new());
    let (tx, rx) = ism_events::channel();
    let bridge = spawn_event_bridge(rx);
    let manager = Arc::new(UpdateManager::with_events(config, node, registry, tx));
    Ok((manager, bridge))
}

pub fn spawn_event_bridge(mut rx: EventReceiver) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            log_event(&event);
        }
    })
}

/// Forward one event to `tracing` at the level the event asks for.
fn log_event(event: &AppEvent) {
    let domain = event.domain();
    let detail = serde_json::to_string(event).unwrap_or_else(|_| format!("{event:?}"));
    let level = event.log_level();
    if level == Level::ERROR {
        error!(target: "ism", domain, "{detail}");
    } else if level == Level::WARN {
        warn!(target: "ism", domain, "{detail}");
    } else if level == Level::DEBUG {
        debug!(target: "ism", domain, "{detail}");
    } else {
        info!(target: "ism", domain, "{detail}");
    }
}

/// Entry point for the relaunch verbs a previous instance hands over.
///
/// The handed-over base directory, service name and hosting code win over
/// both the config file and the environment; after the optional wipe the
/// process continues as a normal daemon run.
pub async fn run_relaunch(
    verb: RestartVerb,
    base_dir: PathBuf,
    service_name: String,
    hosting_code: u8,
) {
    info!(%verb, base = %base_dir.display(), "relaunch verb received, settling");
    tokio::time::sleep(RELAUNCH_GRACE).await;

    let mut config = match Config::load_or_default(None).await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "config unreadable during relaunch, using defaults");
            Config::default()
        }
    };
    if let Err(e) = config.merge_env() {
        warn!(error = %e, "bad environment overrides ignored");
    }
    config.paths.base_dir = base_dir;
    config.node.service_name = service_name;
    config.node.hosting_code = hosting_code;

    if verb == RestartVerb::WipeNode {
        let cache = config.cache_dir();
        match tokio::fs::remove_dir_all(&cache).await {
            Ok(()) => info!(cache = %cache.display(), "cache directory wiped"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(cache = %cache.display(), error = %e, "cannot wipe cache directory");
            }
        }
    }

    if let Err(e) = run(config).await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

/// Daemon mode: wire everything, spawn the background tasks, wait for
/// ctrl-c or an internal shutdown request, then wind down.
pub async fn run(config: Config) -> Result<(), Error> {
    let node = build_node(&config)?;
    {
        let identity = node.identity();
        info!(
            node_id = %identity.node_id,
            service = %identity.service_name,
            version = %identity.running_version,
            hosting = %identity.hosting,
            "starting ismd v{}",
            env!("CARGO_PKG_VERSION")
        );
    }

    let registry = Arc::new(PluginRegistry::new());
    let (tx, rx) = ism_events::channel();
    let bridge = spawn_event_bridge(rx);
    let shutdown = Arc::new(DaemonShutdown::new(Arc::clone(&node)));

    let mut manager = UpdateManager::with_events(
        &config,
        Arc::clone(&node),
        Arc::clone(&registry),
        tx.clone(),
    );

    // Provisioning is optional; without an endpoint the node runs standalone.
    let mut connector = None;
    let mut commands = None;
    if let Some(endpoint) = &config.provisioning.endpoint {
        let channel = Arc::new(HttpChannel::new(endpoint.clone())?);
        let (built, command_rx) =
            ProvisioningConnector::new(Arc::clone(&node), Arc::clone(&registry), channel);
        let built = Arc::new(
            built
                .with_registration_timeout(Duration::from_secs(
                    config.provisioning.registration_timeout_secs,
                ))
                .with_reconnect_delay(Duration::from_secs(
                    config.provisioning.reconnect_delay_secs,
                ))
                .with_events(tx.clone()),
        );
        if config.backup.upload {
            manager = manager.with_upload(Arc::clone(&built) as Arc<dyn UploadSink>);
        }
        connector = Some(built);
        commands = Some(command_rx);
    }
    let manager = Arc::new(manager);
    drop(tx);

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    if let Some(connector) = &connector {
        let runner = Arc::clone(connector);
        tasks.push(tokio::spawn(async move {
            runner.run(COMMAND_POLL_INTERVAL).await;
        }));
    }

    if let Some(command_rx) = commands.take() {
        tasks.push(tokio::spawn(command_loop(
            command_rx,
            Arc::clone(&manager),
            Arc::clone(&shutdown),
            Arc::new(ScopeTokenVerifier),
        )));
    }

    tasks.push(tokio::spawn(scan_loop(
        Arc::clone(&manager),
        connector.clone(),
        Arc::clone(&node),
        Arc::clone(&shutdown),
        config.updates.scan_interval_minutes,
        config.updates.update_extension.clone(),
        config.updates.auxiliary_extension.clone(),
    )));

    {
        let scheduler = Arc::clone(&manager);
        let minutes = config.backup.interval_minutes;
        tasks.push(tokio::spawn(async move {
            scheduler.run_backup_scheduler(minutes).await;
        }));
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => info!("ctrl-c received, shutting down"),
                Err(e) => warn!(error = %e, "ctrl-c handler failed, shutting down"),
            }
            node.begin_shutdown();
        }
        () = shutdown.wait() => {}
    }
    node.begin_shutdown();

    for task in tasks {
        task.abort();
        let _ = task.await;
    }
    // With every task gone and these handles dropped, the last event senders
    // disappear and the bridge drains what is left before finishing.
    drop(manager);
    drop(connector);
    let _ = bridge.await;

    info!("ismd stopped");
    Ok(())
}

/// Scan on a timer, publish inventory when provisioned, and apply whatever
/// the scan accepted. A period of zero runs the startup scan only.
async fn scan_loop(
    manager: Arc<UpdateManager>,
    connector: Option<Arc<ProvisioningConnector>>,
    node: Arc<NodeState>,
    shutdown: Arc<DaemonShutdown>,
    period_minutes: u64,
    update_extension: String,
    auxiliary_extension: String,
) {
    if let Some(connector) = &connector {
        // Give registration a head start so the first inventory publish lands.
        let deadline = tokio::time::Instant::now() + REGISTRATION_HEAD_START;
        while !connector.is_registered()
            && node.is_running()
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    let period = Duration::from_secs(period_minutes.saturating_mul(60));
    loop {
        if !node.is_running() {
            return;
        }

        let accepted = manager.scan_for_updates(false).await;

        if let Some(connector) = &connector {
            if connector.is_registered() {
                let snapshot = accepted.clone().unwrap_or_default();
                let report =
                    connector.build_inventory(&snapshot, &update_extension, &auxiliary_extension);
                if let Err(e) = connector.publish_inventory(&report).await {
                    warn!(error = %e, "inventory publish failed");
                }
            }
        }

        if accepted.is_some() {
            let outcome = manager.launch_updater(true, shutdown.as_ref()).await;
            info!(?outcome, "installer launch finished");
        }

        if period.is_zero() {
            info!("scan timer disabled, startup scan done");
            return;
        }
        tokio::time::sleep(period).await;
    }
}

/// Execute admin commands forwarded by the connector. The connector itself
/// never runs them.
async fn command_loop(
    mut commands: CommandReceiver,
    manager: Arc<UpdateManager>,
    shutdown: Arc<DaemonShutdown>,
    verifier: Arc<ScopeTokenVerifier>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            AdminCommand::Restart => {
                let outcome = manager.restart().await;
                info!(?outcome, "restart command handled");
                if matches!(outcome, LaunchOutcome::Spawned { .. }) {
                    shutdown.request_shutdown(true);
                }
            }
            AdminCommand::WipeNode { token } => {
                let outcome = manager
                    .restart_or_wipe(true, Some(&token), Some(verifier.as_ref()))
                    .await;
                info!(?outcome, "wipe command handled");
                if matches!(outcome, LaunchOutcome::Spawned { .. }) {
                    shutdown.request_shutdown(true);
                }
            }
            AdminCommand::Backup { title } => {
                let outcome = manager.backup_cache_folder(&title).await;
                info!(?outcome, "backup command handled");
            }
        }
    }
}
