use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use application::control;
use application::engine::Engine;
use application::hooks::REGISTRATIONS;
use application::sweep;
use infrastructure::config::AgentConfig;
use infrastructure::constants::{CONTROL_CHANNEL_CAPACITY, GRACEFUL_SHUTDOWN_TIMEOUT};
use infrastructure::logging::init_logging;

use crate::cli::Cli;
use crate::control_socket;
use crate::shutdown;

/// Run the daemon startup sequence and block until shutdown.
pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    // ── 1. Load config ──────────────────────────────────────────────
    let config = AgentConfig::load(Path::new(&cli.config))?;

    // ── 2. Initialize logging (CLI flags win over the config file) ──
    let log_level = cli.log_level.unwrap_or(config.agent.log_level);
    let log_format = cli.log_format.unwrap_or(config.agent.log_format);
    init_logging(log_level, log_format)?;

    info!(
        config_path = %cli.config,
        log_level = log_level.as_str(),
        version = env!("CARGO_PKG_VERSION"),
        "flowgate agent starting"
    );

    // ── 3. Build and seed the engine ────────────────────────────────
    let engine = Arc::new(Engine::new());

    let filter_rules = config.firewall.parsed_rules()?;
    let rule_count = filter_rules.len();
    engine.reload_filter_rules(filter_rules)?;

    let default_action = config.firewall.parsed_default_action()?;
    engine.set_default_action(default_action);

    let nat_rules = config.nat.parsed_rules()?;
    let nat_count = nat_rules.len();
    for rule in nat_rules {
        engine.add_nat_rule(rule)?;
    }

    info!(
        filter_rules = rule_count,
        nat_rules = nat_count,
        default_action = %engine.default_action(),
        hook_stages = REGISTRATIONS.len(),
        "engine initialized"
    );

    // ── 4. Spawn long-lived tasks ───────────────────────────────────
    let cancel = shutdown::create_shutdown_token();

    let (control_tx, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
    let control_task = tokio::spawn(control::run_control(
        engine.clone(),
        control_rx,
        cancel.clone(),
    ));

    let sweep_task = tokio::spawn(sweep::run_sweeper(engine.clone(), cancel.clone()));

    let socket_path = PathBuf::from(
        cli.control_socket
            .clone()
            .unwrap_or_else(|| config.agent.control_socket.clone()),
    );
    let socket_task = tokio::spawn(control_socket::serve(
        socket_path,
        control_tx,
        cancel.clone(),
    ));

    // ── 5. Wait for shutdown ────────────────────────────────────────
    cancel.cancelled().await;
    info!("shutdown requested");

    let drain = async {
        if let Ok(Err(e)) = socket_task.await {
            warn!(error = %e, "control socket exited with error");
        }
        let _ = control_task.await;
        let _ = sweep_task.await;
    };
    if tokio::time::timeout(GRACEFUL_SHUTDOWN_TIMEOUT, drain)
        .await
        .is_err()
    {
        warn!("graceful shutdown timed out");
    }

    info!("flowgate agent stopped");
    Ok(())
}
