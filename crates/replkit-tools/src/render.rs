//! Shared response formatting.

use std::time::Duration;

/// Section-joined response text.
pub(crate) struct Sections(Vec<String>);

impl Sections {
    pub(crate) fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push<S: Into<String>>(&mut self, section: S) {
        self.0.push(section.into());
    }

    /// Add a labeled block, skipped when the body is empty.
    pub(crate) fn push_block(&mut self, label: &str, body: &str) {
        if !body.is_empty() {
            self.0.push(format!("{label}:\n{}", body.trim_end_matches('\n')));
        }
    }

    pub(crate) fn push_elapsed(&mut self, elapsed: Duration) {
        self.0.push(format!("Execution time: {} seconds", seconds(elapsed)));
    }

    pub(crate) fn finish(self) -> String {
        if self.0.is_empty() {
            "No output".to_string()
        } else {
            self.0.join("\n")
        }
    }
}

pub(crate) fn seconds(elapsed: Duration) -> String {
    format!("{:.4}", elapsed.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_blocks_are_skipped() {
        let mut sections = Sections::new();
        sections.push_block("Standard Output", "");
        sections.push_block("Standard Error", "oops\n");
        assert_eq!(sections.finish(), "Standard Error:\noops");
    }

    #[test]
    fn no_sections_renders_placeholder() {
        assert_eq!(Sections::new().finish(), "No output");
    }

    #[test]
    fn seconds_are_fixed_precision() {
        assert_eq!(seconds(Duration::from_millis(1_234)), "1.2340");
    }
}
