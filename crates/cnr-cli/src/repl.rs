//! REPL – the operator shell for the control panel.
//!
//! Every command is turned into a [`PanelCommand`] and applied through the
//! same [`PanelHandle`] the browser panel uses, so terminal and browser
//! always agree on the state.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use cnr_cockpit::{CockpitState, PanelCommand, PanelHandle};

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Help,
    Robots,
    Status,
    Quit,
    Panel(PanelCommand),
}

/// Parse one input line.  The error is a message for the operator.
pub fn parse(line: &str) -> Result<ReplCommand, String> {
    let line = line.trim();
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let arg = |usage: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {usage}"))
        } else {
            Ok(rest.to_string())
        }
    };

    let command = match cmd {
        "/help" => ReplCommand::Help,
        "/robots" => ReplCommand::Robots,
        "/status" => ReplCommand::Status,
        "/quit" | "/exit" => ReplCommand::Quit,
        "/control" => ReplCommand::Panel(PanelCommand::SelectControl(arg("/control <robot>")?)),
        "/view" => ReplCommand::Panel(PanelCommand::SelectView(arg("/view <robot>")?)),
        "/enable" => ReplCommand::Panel(PanelCommand::SetActive {
            robot: arg("/enable <robot>")?,
            active: true,
        }),
        "/disable" => ReplCommand::Panel(PanelCommand::SetActive {
            robot: arg("/disable <robot>")?,
            active: false,
        }),
        "/tab" => ReplCommand::Panel(PanelCommand::SelectTab(arg("/tab <object|area|movement>")?)),
        "/set" => {
            // Values may contain spaces ("in front of"); a bare field clears
            // it, which is how the empty specification is chosen.
            let (field, value) = match rest.split_once(char::is_whitespace) {
                Some((field, value)) => (field, value.trim()),
                None => (rest, ""),
            };
            if field.is_empty() {
                return Err("usage: /set <field> [value]".to_string());
            }
            ReplCommand::Panel(PanelCommand::SetField {
                field: field.to_string(),
                value: value.to_string(),
            })
        }
        "/submit" => ReplCommand::Panel(PanelCommand::SubmitObservation),
        "/cmd" => ReplCommand::Panel(PanelCommand::Command(arg("/cmd <payload>")?)),
        "/source" => ReplCommand::Panel(PanelCommand::SelectSource(arg("/source <vicon|gazebo>")?)),
        "/backend" => match rest {
            "start" => ReplCommand::Panel(PanelCommand::StartBackend),
            "stop" => ReplCommand::Panel(PanelCommand::StopBackend),
            _ => return Err("usage: /backend <start|stop>".to_string()),
        },
        other => return Err(format!("unknown command '{other}'")),
    };
    Ok(command)
}

/// How often the loop checks `shutdown` while waiting for input.
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Read commands from stdin until `/quit`, EOF or `shutdown` is set.
///
/// Stdin is read on a helper thread so a Ctrl-C that sets `shutdown` ends
/// the loop without waiting for the operator to press Enter.
pub fn run(handle: &PanelHandle, shutdown: Arc<AtomicBool>) {
    run_lines(handle, spawn_stdin_reader(), &shutdown);
}

fn run_lines(handle: &PanelHandle, lines: Receiver<io::Result<String>>, shutdown: &AtomicBool) {
    let mut stdout = io::stdout();
    let mut prompt = true;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if prompt {
            print!("{} ", "cnr>".bold().cyan());
            stdout.flush().ok();
            prompt = false;
        }

        let line = match lines.recv_timeout(SHUTDOWN_POLL) {
            Ok(Ok(line)) => line,
            Ok(Err(e)) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        prompt = true;
        if line.trim().is_empty() {
            continue;
        }

        match parse(&line) {
            Ok(ReplCommand::Help) => cmd_help(),
            Ok(ReplCommand::Robots) => apply(handle, PanelCommand::Snapshot, print_robots),
            Ok(ReplCommand::Status) => apply(handle, PanelCommand::Snapshot, print_status),
            Ok(ReplCommand::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Ok(ReplCommand::Panel(command)) => {
                let submitted = command == PanelCommand::SubmitObservation;
                let sent = match &command {
                    PanelCommand::Command(payload) => Some(payload.clone()),
                    _ => None,
                };
                apply(handle, command, |state| {
                    if submitted && let Some(message) = &state.last_observation {
                        println!("  {} {}", "✓ Published".green(), message.bold());
                    } else if let Some(payload) = &sent {
                        let target = state.panel.control.as_deref().unwrap_or("-");
                        println!("  {} '{}' → {}", "✓ Sent".green(), payload, target.bold());
                    } else {
                        print_status(state);
                    }
                });
            }
            Err(message) => println!(
                "{} {}. Type {} for available commands.",
                "Error:".red(),
                message.yellow(),
                "/help".bold()
            ),
        }
    }
}

/// Forward stdin lines to a channel.  The channel disconnects on EOF.
fn spawn_stdin_reader() -> Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.send(line).is_err() || failed {
                break;
            }
        }
    });
    rx
}

fn apply(handle: &PanelHandle, command: PanelCommand, render: impl FnOnce(&CockpitState)) {
    match handle.blocking_apply(command) {
        Ok(state) => render(&state),
        Err(e) => println!("{} {}", "Error:".red(), e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rendering
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Panel Commands".bold().underline());
    println!("  {}               – list robots and their flags", "/robots".bold().cyan());
    println!("  {}      – give a robot teleop control", "/control <robot>".bold().cyan());
    println!("  {}         – show a robot's camera", "/view <robot>".bold().cyan());
    println!("  {} – toggle a robot's active flag", "/enable|/disable <r>".bold().cyan());
    println!("  {}      – switch observation tab", "/tab <category>".bold().cyan());
    println!("  {} – set a field of the active tab", "/set <field> [value]".bold().cyan());
    println!("  {}               – publish the observation", "/submit".bold().cyan());
    println!("  {}       – send a command to the controlled robot", "/cmd <payload>".bold().cyan());
    println!("  {} – choose the data source", "/source <vicon|gazebo>".bold().cyan());
    println!("  {} – launch or stop the backend", "/backend <start|stop>".bold().cyan());
    println!("  {}               – show the whole panel", "/status".bold().cyan());
    println!("  {}          – exit", "/quit  /exit".bold().cyan());
    println!();
}

fn print_robots(state: &CockpitState) {
    for robot in &state.panel.robots {
        let control = if robot.has_control() { "●".green() } else { "○".dimmed() };
        let view = if robot.has_view() { "◉".cyan() } else { "○".dimmed() };
        let name = if robot.is_active() {
            robot.display_name().bold()
        } else {
            robot.display_name().dimmed()
        };
        println!("  {control} {view} {name:<10} {}", robot.command_topic().dimmed());
    }
}

fn print_status(state: &CockpitState) {
    print_robots(state);
    if let Some(url) = &state.view_url {
        println!("  view    : {}", url.dimmed());
    }
    println!(
        "  backend : {} ({})",
        state.source.to_string().yellow(),
        if state.backend_running { "running".green() } else { "stopped".dimmed() }
    );
    if let Some(active) = state
        .panel
        .categories
        .iter()
        .find(|c| c.category.kind() == state.panel.active_tab)
    {
        println!("  tab     : {}", state.panel.active_tab.to_string().bold());
        println!("  preview : {}", active.message.bold());
    }
}
