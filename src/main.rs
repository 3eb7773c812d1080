mod attendance;
mod calc;
mod config;
mod db;
mod error;
mod ipc;
mod logging;
mod records;
mod reports;
#[cfg(test)]
mod test_support;

use clap::Parser;
use std::io::{self, BufRead, Write};

fn main() {
    let cli = config::Cli::parse();
    logging::init(cli.log_format);

    let mut state = ipc::AppState::new(cli.report_settings());
    if let Some(path) = cli.workspace.clone() {
        if let Err(e) = ipc::select_workspace(&mut state, path) {
            tracing::error!(error = ?e, "failed to open startup workspace");
        }
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "campusd ready");

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        }

        let resp = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<ipc::Request>(&line) {
                Ok(req) => ipc::handle_request(&mut state, req),
                // No id to echo back.
                Err(e) => ipc::err("", "bad_json", 400, e.to_string(), None),
            },
            Err(e) => {
                tracing::warn!(error = %e, "request line is not valid UTF-8");
                ipc::err("", "bad_json", 400, format!("request is not valid UTF-8: {}", e), None)
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::info!("campusd shutting down");
}
