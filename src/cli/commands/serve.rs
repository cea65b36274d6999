//! Web server command.

use console::style;

use crate::config::Settings;

use super::helpers::parse_bind_address;

/// Start the web server.
pub async fn cmd_serve(settings: &Settings, bind: &str) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind)?;
    let addr = tokio::net::lookup_host((host.as_str(), port))
        .await?
        .next()
        .ok_or_else(|| anyhow::anyhow!("Could not resolve bind address '{}'", bind))?;

    let template = settings.template_path();
    if !template.exists() {
        println!(
            "  {} Template workbook not found at {}",
            style("!").yellow(),
            template.display()
        );
    }

    println!(
        "{} Starting amzspider server at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(settings, addr).await
}
