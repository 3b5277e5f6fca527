use indicatif::{ProgressBar, ProgressStyle};

/// Spinner showing how many files have been added and the current path
pub struct AddProgress {
    bar: ProgressBar,
}

impl AddProgress {
    pub fn new(visible: bool) -> Self {
        if !visible {
            return Self {
                bar: ProgressBar::hidden(),
            };
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{pos}] {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self { bar }
    }

    pub fn file_added(&self, count: usize, path: &str) {
        self.bar.set_position(count as u64);
        self.bar.set_message(path.to_string());
    }

    pub fn finish(&self, count: usize) {
        self.bar.finish_with_message(format!("{} files added", count));
    }
}
