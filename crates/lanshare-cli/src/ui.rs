//! UI utilities for the LanShare CLI.

use std::io::{self, Write};
use std::time::Duration;

use tokio::sync::watch;

use lanshare_core::client::{TransferProgress, TransferState};
use lanshare_core::naming::format_size;
use lanshare_core::progress::ProgressTracker;

const BOX_WIDTH: usize = 41;

/// A formatted box announcing a session.
pub struct SessionBox<'a> {
    code: &'a str,
    url: &'a str,
    role: &'a str,
    qr: bool,
}

impl<'a> SessionBox<'a> {
    /// Create a new session box.
    #[must_use]
    pub const fn new(code: &'a str, url: &'a str, role: &'a str) -> Self {
        Self {
            code,
            url,
            role,
            qr: false,
        }
    }

    /// Also render the URL as a QR code.
    #[must_use]
    pub const fn with_qr(mut self, show: bool) -> Self {
        self.qr = show;
        self
    }

    /// Display the box to stdout.
    pub fn display(&self) {
        let code_line = format!("Code:  {}", self.code);

        println!("  ┌{}┐", "─".repeat(BOX_WIDTH));
        println!("  │{}│", " ".repeat(BOX_WIDTH));
        println!("  │{}│", center_in_box(&code_line, BOX_WIDTH));
        println!("  │{}│", center_in_box(self.role, BOX_WIDTH));
        println!("  │{}│", center_in_box(self.url, BOX_WIDTH));
        println!("  │{}│", " ".repeat(BOX_WIDTH));
        println!("  └{}┘", "─".repeat(BOX_WIDTH));

        if self.qr {
            match lanshare_core::qr::generate_ascii(self.url) {
                Ok(qr) => {
                    println!();
                    for line in qr.lines() {
                        println!("  {line}");
                    }
                }
                Err(e) => tracing::debug!("Skipping QR code: {e}"),
            }
        }
    }
}

fn center_in_box(content: &str, width: usize) -> String {
    let content_len = content.chars().count();
    let padding = width.saturating_sub(content_len);
    let left = padding / 2;
    let right = padding - left;
    format!("{}{}{}", " ".repeat(left), content, " ".repeat(right))
}

/// Print the CLI header.
pub fn print_header() {
    println!();
    println!("LanShare v{}", lanshare_core::VERSION);
    println!("{}", "-".repeat(37));
    println!();
}

/// Print an error chain plus any suggestion attached to it.
pub fn print_error(error: &anyhow::Error) {
    eprintln!("Error: {error}");
    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {cause}");
    }

    let core = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<lanshare_core::Error>());
    if let Some(core) = core {
        if let Some(suggestion) = core.suggestion() {
            eprintln!();
            eprintln!("  Hint: {suggestion}");
        }
    }
}

/// Render client transfer progress until the transfer ends.
pub async fn display_progress(mut rx: watch::Receiver<TransferProgress>) {
    let mut last_state = TransferState::Idle;

    loop {
        let changed = rx.changed().await;
        let progress = rx.borrow_and_update().clone();

        if progress.state != last_state {
            last_state = progress.state;
            match progress.state {
                TransferState::Transferring => {
                    println!(
                        "  Transferring {} ({})",
                        progress.file_name,
                        format_size(progress.total_bytes)
                    );
                }
                TransferState::Extracting => {
                    println!();
                    println!("  Extracting {}...", progress.file_name);
                }
                TransferState::Completed | TransferState::Failed => break,
                TransferState::Idle => {}
            }
        }

        if progress.state == TransferState::Transferring {
            print!(
                "\r  [{:>6.2}%] {} / {}    ",
                progress.percentage(),
                format_size(progress.bytes_transferred),
                format_size(progress.total_bytes)
            );
            let _ = io::stdout().flush();
        }

        if changed.is_err() {
            break;
        }
    }

    println!();
}

/// Periodically render the uploads a host is receiving.
pub async fn display_uploads(tracker: ProgressTracker) {
    let mut interval = tokio::time::interval(Duration::from_millis(500));
    let mut last = Vec::new();

    loop {
        interval.tick().await;
        let snapshot = tracker.snapshot();
        if snapshot == last {
            continue;
        }

        if snapshot.is_empty() {
            print!("\r  Waiting for uploads...{}", " ".repeat(40));
        } else {
            let active = snapshot
                .iter()
                .map(|slot| format!("{} {}", slot.label, format_size(slot.bytes)))
                .collect::<Vec<_>>()
                .join(" | ");
            print!("\r  Receiving: {active}    ");
        }
        let _ = io::stdout().flush();
        last = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_in_box() {
        let centered = center_in_box("hello", 11);
        assert_eq!(centered, "   hello   ");

        let centered = center_in_box("hi", 6);
        assert_eq!(centered, "  hi  ");
    }

    #[test]
    fn test_center_in_box_overflow() {
        assert_eq!(center_in_box("toolong", 3), "toolong");
    }

    #[tokio::test]
    async fn test_display_progress_stops_on_completion() {
        let (tx, rx) = watch::channel(TransferProgress::default());
        let display = tokio::spawn(display_progress(rx));

        tx.send_replace(TransferProgress {
            state: TransferState::Completed,
            ..TransferProgress::default()
        });

        tokio::time::timeout(Duration::from_secs(1), display)
            .await
            .expect("display should finish")
            .unwrap();
    }
}
