//! Review listing of the manifest
//!
//! Records are listed as `STATUS  owner/name`, sorted by status then
//! repository, with the status column padded to a common width.

use anyhow::{anyhow, Context, Result};
use std::io::{IsTerminal, Write};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::config::ReviewConfig;
use crate::manifest::Manifest;

/// `(status, repo)` pairs in listing order
pub fn review_rows(manifest: &Manifest) -> Vec<(&str, &str)> {
    let mut rows: Vec<(&str, &str)> = manifest
        .records
        .iter()
        .map(|r| (r.status.as_str(), r.repo.as_str()))
        .collect();
    rows.sort_unstable();
    rows
}

/// Render the listing as text, one line per record
pub fn render(manifest: &Manifest) -> String {
    let rows = review_rows(manifest);
    let width = rows.iter().map(|(status, _)| status.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (status, repo) in rows {
        out.push_str(&format!("{:<width$}  {}\n", status, repo, width = width));
    }
    out
}

/// Print the listing, through a pager when stdout is a terminal
pub fn show(manifest: &Manifest, config: &ReviewConfig, paginate: bool) -> Result<()> {
    let listing = render(manifest);

    if paginate && config.paginate && std::io::stdout().is_terminal() {
        let pager = pager_command(config);
        debug!("Paging review through: {}", pager);
        return page(&pager, &listing);
    }

    std::io::stdout()
        .write_all(listing.as_bytes())
        .context("Failed to write review listing")
}

fn pager_command(config: &ReviewConfig) -> String {
    config
        .pager
        .clone()
        .or_else(|| std::env::var("PAGER").ok().filter(|p| !p.trim().is_empty()))
        .unwrap_or_else(|| "less -FRX".to_string())
}

fn page(pager: &str, listing: &str) -> Result<()> {
    let mut parts = pager.split_whitespace();
    let program = parts.next().context("Pager command is empty")?;

    let mut child = Command::new(program)
        .args(parts)
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to start pager: {}", pager))?;

    if let Some(mut stdin) = child.stdin.take() {
        // The pager may exit before reading everything (e.g. `q` in less)
        if let Err(e) = stdin.write_all(listing.as_bytes()) {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e).context("Failed to write to pager");
            }
        }
    }

    let status = child.wait().context("Failed to wait for pager")?;
    if !status.success() {
        return Err(anyhow!("Pager `{}` exited with {}", pager, status));
    }

    Ok(())
}
