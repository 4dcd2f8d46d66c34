//! Terminal progress line for interactive runs.

use indicatif::{ProgressBar, ProgressStyle};
use plugbench_runner::{Heartbeat, ProcessOutcome, ProgressObserver};
use std::sync::Mutex;

const SPINNER_TEMPLATE: &str = "{prefix} {msg}";

/// One spinner per supervised child, advanced on each heartbeat.
#[derive(Default)]
pub struct SpinnerProgress {
    bar: Mutex<Option<ProgressBar>>,
}

pub(crate) fn spinner_message(label: &str, beat: &Heartbeat) -> String {
    format!("{} ({}s)", label, beat.elapsed.as_secs())
}

impl ProgressObserver for SpinnerProgress {
    fn on_start(&self, label: &str) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(label.to_string());
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_heartbeat(&self, label: &str, beat: &Heartbeat) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_prefix(beat.indicator.to_string());
                bar.set_message(spinner_message(label, beat));
                bar.tick();
            }
        }
    }

    fn on_finish(&self, _label: &str, _outcome: &ProcessOutcome) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}
