//! `rollcall status` — query a running daemon over its liveness HTTP surface.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{json, Value};

/// Arguments for `rollcall status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Host the daemon's liveness endpoint listens on.
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port the daemon's liveness endpoint listens on.
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Emit the raw JSON payload.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let url = status_url(&self.host, self.port);
        let payload = match ureq::get(&url).timeout(Duration::from_secs(5)).call() {
            Ok(response) => response
                .into_json::<Value>()
                .with_context(|| format!("invalid status payload from {url}"))?,
            Err(ureq::Error::Transport(_)) => json!({ "running": false, "url": url }),
            Err(err) => return Err(err).with_context(|| format!("failed to query {url}")),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
            return Ok(());
        }

        print_status(&payload);
        Ok(())
    }
}

/// A wildcard bind address is reachable locally via loopback.
fn status_url(host: &str, port: u16) -> String {
    let host = match host {
        "0.0.0.0" | "" => "127.0.0.1",
        "::" => "[::1]",
        other => other,
    };
    format!("http://{host}:{port}/status")
}

fn print_status(payload: &Value) {
    if payload["running"] != Value::Bool(true) {
        println!("{} daemon is not running", "●".red());
        return;
    }

    println!(
        "{} daemon running since {} ({} passes, {} failed)",
        "●".green(),
        payload["started_at_unix"],
        payload["passes"],
        payload["failures"],
    );
    match payload.get("last_pass").filter(|p| !p.is_null()) {
        Some(pass) => println!(
            "  last pass: {} rows, {} ranges written, trigger {}, {} ms",
            pass["rows"], pass["written"], pass["trigger"], pass["duration_ms"],
        ),
        None => println!("  last pass: never"),
    }
    if let Some(error) = payload["last_error"].as_str() {
        println!("  {} {}", "last error:".red(), error);
    }
}
