use std::io::Write;

use courier_core::ResponseView;

/// Prints results as they are delivered: status and timing on stderr, the
/// body on stdout.
#[derive(Debug, Default)]
pub struct TerminalView {
    pub verbose: bool,
}

impl ResponseView for TerminalView {
    fn on_loading(&self) {
        if self.verbose {
            eprintln!("Sending...");
        }
    }

    fn on_response(&self, body: &str, content_type: &str) {
        if !content_type.is_empty() {
            eprintln!("Content-Type: {content_type}");
        }
        let mut out = std::io::stdout().lock();
        // A closed pipe is not worth failing over.
        let _ = writeln!(out, "{body}");
    }

    fn on_error(&self, message: &str) {
        eprintln!("Error: {message}");
    }

    fn on_status(&self, status: Option<u16>) {
        if let Some(status) = status {
            eprintln!("Status: {status}");
        }
    }

    fn on_duration(&self, duration_ms: Option<u64>) {
        if let Some(ms) = duration_ms {
            eprintln!("Time: {ms} ms");
        }
    }
}
