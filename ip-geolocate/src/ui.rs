//! Terminal display logic for the ip-geolocate CLI.
//!
//! Header, spinner and summary output. Progress goes to stderr so stdout
//! stays clean for `--dry-run` address lists.

use console::{style, Term};
use ip_geolocate_lib::{OutputOrder, RunSummary};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a spinner with the given message, or None if stderr isn't a TTY.
    pub fn start(message: String) -> Option<Self> {
        if !Term::stderr().is_term() {
            return None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header before lookups start.
pub fn print_header(input: &Path, address_count: usize, concurrency: usize, order: OutputOrder) {
    eprintln!(
        "{} {} {}",
        style("ip-geolocate").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "— {} address{} from {}",
            address_count,
            if address_count == 1 { "" } else { "es" },
            input.display()
        ))
        .dim(),
    );
    eprintln!(
        "{}",
        style(format!("Concurrency: {} | Order: {}", concurrency, order)).dim()
    );
    eprintln!();
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(summary: &RunSummary) {
    eprintln!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    eprintln!("  {}", summary_line(summary));
    eprintln!(
        "  {} {}",
        style("Written to").dim(),
        style(summary.output.display()).bold()
    );
}

fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{} record{} in {:.1}s  {}  {}  {}  {}",
        style(summary.total).bold(),
        if summary.total == 1 { "" } else { "s" },
        summary.duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} ok", summary.succeeded)).green(),
        style("|").dim(),
        failed_label(summary.failed),
    )
}

fn failed_label(failed: usize) -> String {
    let text = format!("{} failed", failed);
    if failed == 0 {
        style(text).dim().to_string()
    } else {
        style(text).red().to_string()
    }
}
