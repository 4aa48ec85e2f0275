//! Terminal progress for syncs, and a log writer that prints above it.

use crate::stage::SyncStage;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

static MULTI_PROGRESS: OnceLock<MultiProgress> = OnceLock::new();

fn multi_progress() -> &'static MultiProgress {
    MULTI_PROGRESS.get_or_init(|| {
        let mp = MultiProgress::new();
        mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        mp
    })
}

/// Spinner showing the current sync stage
pub struct SyncSpinner {
    bar: ProgressBar,
}

impl SyncSpinner {
    pub fn start() -> Self {
        let bar = multi_progress().add(ProgressBar::new_spinner());
        let style = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message(SyncStage::Connecting.to_string());
        Self { bar }
    }

    pub fn stage(&self, stage: SyncStage) {
        self.bar.set_message(stage.to_string());
    }

    pub fn finish(self, message: impl Into<String>) {
        self.bar.finish_and_clear();
        let _ = multi_progress().println(message.into());
    }
}

/// Routes tracing output through the shared `MultiProgress`
#[derive(Default, Clone)]
pub struct LogWriterFactory;

/// Line-buffered writer; each complete line is printed above the spinners
pub struct LogWriter {
    pending: String,
}

impl LogWriter {
    fn print_line(line: &str) {
        let _ = multi_progress().println(line.trim_end_matches('\r'));
    }
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.push_str(&String::from_utf8_lossy(buf));

        while let Some(idx) = self.pending.find('\n') {
            Self::print_line(&self.pending[..idx]);
            self.pending.drain(..=idx);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            Self::print_line(self.pending.trim_end_matches('\n'));
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogWriterFactory {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            pending: String::new(),
        }
    }
}
