//! Burble application binary - composition root.
//!
//! Ties together the widget crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Open the persistent client state snapshot
//! 3. Fetch the widget theme from the gateway
//! 4. Wire the reconciler over the gateway, session, and store
//! 5. Drive the shell from an interactive command loop
//!
//! The session transport is the in-process simulated one, so the binary is
//! usable offline against any gateway stub.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tokio::sync::broadcast::error::RecvError;

use burble_core::config::BurbleConfig;
use burble_core::events::WidgetEvent;
use burble_core::types::{FormFields, WidgetTheme};
use burble_gateway::{Gateway, HttpGateway};
use burble_reconciler::{AgentIdentity, Reconciler};
use burble_session::SimulatedSession;
use burble_shell::WidgetShell;
use burble_store::StateStore;

use cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_state_path(state_path: &str) -> PathBuf {
    if state_path.starts_with("~/") || state_path.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&state_path[2..])
    } else {
        PathBuf::from(state_path)
    }
}

fn print_help() {
    println!("Commands:");
    println!("  mic              toggle the call on or off");
    println!("  say <text>       send a chat message over the live call");
    println!("  form k=v [k=v]   submit the intake form and start the call");
    println!("  mute / unmute    speaker mute controls");
    println!("  min / open       minimize or expand the widget");
    println!("  hide / show      simulate the hosting tab going to background");
    println!("  status           print the current widget status");
    println!("  refresh          simulate a page reload and exit");
    println!("  close            end the call and collapse the widget");
    println!("  quit             exit");
}

fn parse_form(args: &[&str]) -> FormFields {
    let mut form = FormFields::new();
    for pair in args {
        if let Some((key, value)) = pair.split_once('=') {
            form.insert(key.to_string(), value.to_string());
        }
    }
    form
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = BurbleConfig::load_or_default(&config_file);

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting burble v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let base_url = args.resolve_base_url(&config.gateway.base_url);
    let schema = args.resolve_schema(&config.gateway.schema_name);
    let agent = args.resolve_agent(&config.gateway.agent_code);

    // Persistent client state.
    let state_path = resolve_state_path(&config.storage.state_path);
    let store = Arc::new(StateStore::open(&state_path)?);

    // Gateway and theme.
    let gateway = Arc::new(HttpGateway::new(&base_url));
    let theme = match gateway.widget_settings(&schema, &agent).await {
        Ok(theme) => theme,
        Err(e) => {
            tracing::warn!(error = %e, "Widget settings unavailable; using defaults");
            WidgetTheme::default()
        }
    };
    tracing::info!(bot_name = %theme.bot_name, auto_start = theme.auto_start, "Theme loaded");

    // Reconciler over the simulated transport.
    let session = Arc::new(SimulatedSession::new());
    let reconciler = Arc::new(Reconciler::new(
        gateway,
        session,
        store,
        AgentIdentity::new(agent, schema),
    ));
    let pump = reconciler.run_event_pump();

    let mut shell = WidgetShell::new(theme, Arc::clone(&reconciler));
    if let Err(e) = shell.mount().await {
        tracing::warn!(error = %e, "Mount did not fully succeed");
    }

    println!("{}", shell.status_line());
    print_help();

    let mut events = reconciler.subscribe();
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let WidgetEvent::TranscriptUpdated { text, .. } = &event {
                            println!("> {text}");
                        }
                        shell.apply_event(&event);
                        println!("[{}]", shell.status_line());
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event feed lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let parts: Vec<&str> = line.split_whitespace().collect();
                let result = match parts.as_slice() {
                    [] => Ok(()),
                    ["mic"] => shell.toggle_mic().await,
                    ["close"] => shell.close().await,
                    ["say", rest @ ..] => shell.send_message(&rest.join(" ")).await,
                    ["form", rest @ ..] => shell.submit_form(parse_form(rest)).await,
                    ["mute"] => { reconciler.mute_speaker().await; Ok(()) }
                    ["unmute"] => { reconciler.unmute_speaker().await; Ok(()) }
                    ["min"] => { shell.minimize().await; Ok(()) }
                    ["open"] => { shell.expand().await; Ok(()) }
                    ["hide"] => { shell.tab_hidden().await; Ok(()) }
                    ["show"] => { shell.tab_visible().await; Ok(()) }
                    ["status"] => {
                        println!("{}", shell.status_line());
                        println!(
                            "expanded: {} | muted: {} | form: {}",
                            shell.is_expanded(),
                            reconciler.is_speaker_muted(),
                            shell.form_visible()
                        );
                        Ok(())
                    }
                    ["refresh"] => {
                        // A reload keeps the conversation resumable: mark the
                        // unload, tear down, and exit without settling.
                        reconciler.begin_unload()?;
                        if reconciler.status() != burble_core::types::SessionStatus::Disconnected {
                            reconciler.end_call(burble_core::types::EndReason::Remote).await?;
                        }
                        println!("Refresh marked; restart to resume the call.");
                        break;
                    }
                    ["help"] => { print_help(); Ok(()) }
                    ["quit"] | ["exit"] => break,
                    _ => { print_help(); Ok(()) }
                };
                if let Err(e) = result {
                    println!("error: {e}");
                }
            }
        }
    }

    pump.abort();
    Ok(())
}
