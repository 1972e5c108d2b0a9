use crate::{Error, Result};

/// Accumulated reply text for one in-flight stream.
///
/// Dropped at stream end. `received_any_data` flips on the first text fragment, even an
/// empty one, and decides between a graceful end and [`Error::EmptyStream`].
#[derive(Debug, Default, Clone)]
pub struct StreamAccumulator {
    text: String,
    received_any_data: bool,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the full text so far.
    pub fn push(&mut self, fragment: &str) -> &str {
        self.received_any_data = true;
        self.text.push_str(fragment);
        &self.text
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn received_any_data(&self) -> bool {
        self.received_any_data
    }

    /// Resolve at end of input without an explicit completion signal.
    pub fn finish_at_eof(self) -> Result<String> {
        if self.received_any_data {
            Ok(self.text)
        } else {
            Err(Error::EmptyStream)
        }
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_grow_monotonically() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.push("Once"), "Once");
        assert_eq!(acc.push(" upon"), "Once upon");
        assert_eq!(acc.push(" a time"), "Once upon a time");
        assert!(acc.received_any_data());
    }

    #[test]
    fn eof_without_data_is_empty_stream() {
        assert!(matches!(
            StreamAccumulator::new().finish_at_eof(),
            Err(Error::EmptyStream)
        ));
        let mut acc = StreamAccumulator::new();
        acc.push("");
        assert_eq!(acc.finish_at_eof().unwrap(), "");
    }
}
