//! `cnr` – Cops & Robots teleop console.
//!
//! This binary boots the whole panel stack:
//!
//! 1. Loads `~/.cnr/config.toml`, running a short **First-Run Wizard** when
//!    the file is absent.
//! 2. Builds the [`EventBus`] and the [`ControlPanel`] and hands the panel
//!    to a [`PanelDriver`] task.
//! 3. Starts the rosbridge forwarder and the browser control panel.
//! 4. Drops the operator into an **interactive REPL**.
//! 5. Intercepts **Ctrl-C** to send `stop` to the controlled robot, then
//!    leaves the REPL so the backend is stopped and telemetry is flushed on
//!    the normal exit path.

mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use cnr_cockpit::{BackendLauncher, CockpitServer, PanelCommand, PanelDriver, PanelHandle, WebVideoServer};
use cnr_core::ControlPanel;
use cnr_middleware::{EventBus, RosbridgeForwarder};

fn main() {
    let _telemetry = telemetry::init_tracing("cnr");

    print_banner();

    let cfg = config::with_env_overrides(match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => run_first_run_wizard(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    });

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build Tokio runtime");
            return;
        }
    };

    let Some(handle) = boot(&runtime, &cfg) else {
        return;
    };

    // Shared by the Ctrl-C handler and the REPL loop.
    let shutdown = Arc::new(AtomicBool::new(false));
    install_ctrlc_handler(handle.clone(), Arc::clone(&shutdown));

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(&handle, shutdown);

    if let Err(e) = handle.blocking_apply(PanelCommand::StopBackend) {
        warn!(error = %e, "failed to stop backend on exit");
    }
    drop(handle);
    runtime.shutdown_timeout(Duration::from_secs(1));
}

/// Start every long-running task; returns the handle the REPL drives.
fn boot(runtime: &tokio::runtime::Runtime, cfg: &config::Config) -> Option<PanelHandle> {
    let bus = Arc::new(EventBus::default());

    let panel = match ControlPanel::from_names(&cfg.robots, &cfg.default_robot, bus.clone()) {
        Ok(panel) => panel,
        Err(e) => {
            println!("{}: {}", "Invalid robot configuration".red(), e);
            return None;
        }
    };

    let (driver, handle) = PanelDriver::new(
        panel,
        Arc::clone(&bus),
        Box::new(WebVideoServer::new(cfg.video_base_url.clone())),
        BackendLauncher::new(cfg.backend_command.clone(), Arc::clone(&bus)),
    );
    runtime.spawn(driver.run());

    if cfg.rosbridge_url.is_empty() {
        println!("  rosbridge : {}", "disabled".dimmed());
    } else {
        println!("  rosbridge : {}", cfg.rosbridge_url.yellow());
        let forwarder = RosbridgeForwarder::new(Arc::clone(&bus), cfg.rosbridge_url.clone());
        runtime.spawn(forwarder.run_with_retry());
    }

    let server = CockpitServer::new(handle.clone(), Arc::clone(&bus))
        .with_port(cfg.webui_port)
        .with_command_rate(cfg.command_rate_per_sec);
    println!(
        "  panel     : {}",
        format!("http://localhost:{}", server.port()).bold()
    );
    runtime.spawn(async move {
        if let Err(e) = server.run().await {
            error!(error = %e, "control panel server failed");
        }
    });

    info!(robots = cfg.robots.len(), default_robot = %cfg.default_robot, "panel booted");
    Some(handle)
}

fn install_ctrlc_handler(handle: PanelHandle, shutdown: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping the controlled robot …".yellow().bold());
        match handle.blocking_apply(PanelCommand::Command("stop".to_string())) {
            Ok(state) => println!(
                "{} {}",
                "  ✓ stop sent to".green(),
                state.panel.control.unwrap_or_default().bold()
            ),
            Err(e) => println!("{}: {}", "  ✗ failed to send stop".red(), e),
        }
        println!("{}", "  ✓ Exiting.".green());
        shutdown.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to install Ctrl-C handler; robots will not be stopped on Ctrl-C");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard() -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║         cnr First-Run Wizard         ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Press Enter to accept the defaults.\n");

    let mut cfg = config::Config::default();

    let robots = prompt_line(
        &format!("  Robots (comma separated) [{}]: ", cfg.robots.join(", ")),
        &cfg.robots.join(","),
    );
    let robots: Vec<String> = robots
        .split(',')
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();
    if !robots.is_empty() {
        if !robots.contains(&cfg.default_robot) {
            cfg.default_robot = robots[0].clone();
        }
        cfg.robots = robots;
    }

    cfg.rosbridge_url = prompt_line(
        &format!("  rosbridge URL, '-' to disable [{}]: ", cfg.rosbridge_url),
        &cfg.rosbridge_url,
    );
    if cfg.rosbridge_url == "-" {
        cfg.rosbridge_url.clear();
    }

    let port = prompt_line(
        &format!("  Control panel HTTP port [{}]: ", cfg.webui_port),
        &cfg.webui_port.to_string(),
    );
    if let Ok(p) = port.parse::<u16>() {
        cfg.webui_port = p;
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
    cfg
}

fn print_banner() {
    println!();
    println!("{}", r#"   ___ _ __  _ __ "#.bold().cyan());
    println!("{}", r#"  / __| '_ \| '__|"#.bold().cyan());
    println!("{}", r#" | (__| | | | |   "#.bold().cyan());
    println!("{}", r#"  \___|_| |_|_|   "#.bold().cyan());
    println!();
    println!("  {} {}", "cnr".bold(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Cops & Robots teleop console");
    println!();
}

fn prompt_line(msg: &str, default: &str) -> String {
    use std::io::{BufRead, Write};
    print!("{}", msg);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    match std::io::stdin().lock().read_line(&mut line) {
        Ok(_) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
