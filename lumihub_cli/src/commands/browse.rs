//! Browse command - discover gateways on the local network

use std::collections::HashSet;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use lumihub_core::{Hub, HubEvent};

use super::{error, info, success};
use crate::config::Config;

pub async fn run(timeout: u64, port: Option<u16>) -> Result<()> {
    let config = Config::load()?;
    let hub_config = config.hub_config(port, true)?;

    let hub = Hub::new(hub_config);
    let mut events = hub.subscribe();
    hub.listen()?;

    info(&format!("Browsing for gateways ({timeout}s)..."));
    println!();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout);
    let mut found: HashSet<IpAddr> = HashSet::new();

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::time::sleep_until(deadline) => break,
            _ = tokio::signal::ctrl_c() => break,
        };

        match event {
            Some(HubEvent::Browse { ip }) => {
                if found.insert(ip) {
                    println!("  {} gateway at {}", "•".green(), ip.to_string().cyan());
                }
            }
            Some(HubEvent::Error(message)) => error(&message),
            Some(_) => {}
            None => break,
        }
    }

    hub.stop()?;
    println!();

    if found.is_empty() {
        println!("{}", "No gateways found.".dimmed());
        println!();
        println!(
            "  {} Make sure the gateway's LAN protocol is enabled in the app.",
            "→".cyan()
        );
    } else {
        success(&format!("Found {} gateway(s)", found.len()));
    }
    Ok(())
}
