//! Progress rendering for the blocking core operations.

use indicatif::{ProgressBar, ProgressStyle};

/// A bar driven by the core's `(done, total)` callbacks. The total is
/// only known once the operation reports it, so the bar starts hidden.
pub struct StepBar {
    bar: ProgressBar,
}

impl StepBar {
    pub fn new(message: &'static str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:30}] {pos}/{len}")
                .expect("static template"),
        );
        bar.set_message(message);
        StepBar { bar }
    }

    pub fn update(&self, done: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}
