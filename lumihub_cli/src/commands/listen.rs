//! Listen command - watch the multicast group and print gateway traffic

use anyhow::Result;
use colored::Colorize;
use lumihub_core::{Hub, HubEvent};

use super::{error, info, success, warn};
use crate::config::Config;

pub async fn run(port: Option<u16>, key: Option<String>, show_keys: bool) -> Result<()> {
    let mut config = Config::load()?;
    if key.is_some() {
        config.key = key;
    }

    let hub_config = config.hub_config(port, false)?;
    let listen_port = hub_config.port;
    let has_secret = hub_config.key.is_some() || !hub_config.keys.is_empty();

    if show_keys && !has_secret {
        warn("No shared secret configured; command keys cannot be derived");
        println!(
            "  {} Set one with: {}",
            "→".cyan(),
            "lumihub config set-key <secret>".dimmed()
        );
    }

    let hub = Hub::new(hub_config);
    let mut events = hub.subscribe();
    let addr = hub.listen()?;

    info(&format!("Port: {}", listen_port.to_string().cyan()));
    println!();
    println!(
        "{}",
        format!("Listening for gateway reports on {addr}...")
            .green()
            .bold()
    );
    println!("{}", "Press Ctrl+C to stop".dimmed());
    println!();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    HubEvent::Device { sensor, name } => {
                        let label = name.unwrap_or_else(|| sensor.model.clone());
                        success(&format!(
                            "New device: {} {} ({})",
                            label.cyan().bold(),
                            sensor.sid.dimmed(),
                            sensor.ip
                        ));
                        // only gateways broadcast tokens, so only they have keys
                        if show_keys && sensor.model == "gateway" {
                            match hub.derive_key(sensor.ip) {
                                Ok(command_key) => {
                                    println!(
                                        "  {} command key: {}",
                                        "→".cyan(),
                                        command_key.magenta()
                                    );
                                }
                                Err(e) => warn(&format!("Key for {}: {e}", sensor.ip)),
                            }
                        }
                    }
                    HubEvent::Message(msg) => {
                        let data = msg
                            .data
                            .as_ref()
                            .map(|d| d.to_string())
                            .unwrap_or_default();
                        println!(
                            "  {} {} {} {}",
                            "•".green(),
                            msg.cmd.bold(),
                            msg.sid.as_deref().unwrap_or("-").dimmed(),
                            data.dimmed()
                        );
                    }
                    HubEvent::Browse { ip } => {
                        info(&format!("Gateway announced itself from {ip}"));
                    }
                    HubEvent::Warning(message) => warn(&message),
                    HubEvent::Error(message) => error(&message),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                info("Shutting down...");
                break;
            }
        }
    }

    hub.stop()?;
    success("LumiHub listener stopped");
    Ok(())
}
