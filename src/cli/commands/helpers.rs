//! Shared helper functions for CLI commands.

use std::path::Path;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::events::SpiderEvent;

/// Parse a bind address that can be:
/// - Just a port: "3030" -> 127.0.0.1:3030
/// - Just a host: "0.0.0.0" -> 0.0.0.0:3030
/// - Host and port: "0.0.0.0:3030" -> 0.0.0.0:3030
pub fn parse_bind_address(bind: &str) -> anyhow::Result<(String, u16)> {
    if bind.is_empty() {
        anyhow::bail!("empty bind address");
    }

    // Try parsing as just a port number
    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }

    // Try parsing as host:port
    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    // Must be just a host, use default port
    Ok((bind.to_string(), 3030))
}

/// Read URLs from a file, one per line. Blank lines and `#` comments are skipped.
pub fn read_url_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    Ok(parse_url_lines(&contents))
}

fn parse_url_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Print run events under a progress bar until the run finishes.
pub async fn render_events(mut rx: UnboundedReceiver<SpiderEvent>, total: usize) {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░"),
    );

    while let Some(event) = rx.recv().await {
        match event {
            SpiderEvent::Log(line) => pb.println(format!("  {}", style(line).dim())),
            SpiderEvent::ItemStarted { url, .. } => pb.set_message(url),
            SpiderEvent::ItemFinished { ok, .. } => {
                if !ok {
                    pb.println(format!("  {} item failed", style("✗").red()));
                }
                pb.inc(1);
            }
            SpiderEvent::Finished => break,
        }
    }
    pb.finish_and_clear();
}

/// Print log lines to stderr until the run finishes.
pub async fn print_log_lines(mut rx: UnboundedReceiver<SpiderEvent>) {
    while let Some(event) = rx.recv().await {
        match event {
            SpiderEvent::Log(line) => eprintln!("  {}", style(line).dim()),
            SpiderEvent::Finished => break,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bind_address() {
        assert_eq!(
            parse_bind_address("8080").unwrap(),
            ("127.0.0.1".to_string(), 8080)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0").unwrap(),
            ("0.0.0.0".to_string(), 3030)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0:9000").unwrap(),
            ("0.0.0.0".to_string(), 9000)
        );
        assert_eq!(
            parse_bind_address("localhost:3031").unwrap(),
            ("localhost".to_string(), 3031)
        );
        assert!(parse_bind_address("").is_err());
    }

    #[test]
    fn test_parse_url_lines() {
        let contents = "# products\nhttps://a.example/dp/B000000001\n\n  https://b.example/dp/B000000002  \n";
        assert_eq!(
            parse_url_lines(contents),
            vec![
                "https://a.example/dp/B000000001",
                "https://b.example/dp/B000000002"
            ]
        );
    }

    #[tokio::test]
    async fn test_print_log_lines_stops_at_finished() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(SpiderEvent::Log("hello".into())).unwrap();
        tx.send(SpiderEvent::Finished).unwrap();
        // sender still alive: returning proves Finished ended the loop
        print_log_lines(rx).await;
        drop(tx);
    }
}
