//! Error-code translation tables.
//!
//! Each adapter maps its native error codes to `ExchangeErrorKind`: exact
//! codes first, then message substrings, then `Rejected`.

use crate::error::{ExchangeError, ExchangeErrorKind};

#[derive(Debug, Clone, Copy)]
pub struct ErrorTable {
    exact: &'static [(&'static str, ExchangeErrorKind)],
    broad: &'static [(&'static str, ExchangeErrorKind)],
}

impl ErrorTable {
    pub const fn new(
        exact: &'static [(&'static str, ExchangeErrorKind)],
        broad: &'static [(&'static str, ExchangeErrorKind)],
    ) -> Self {
        Self { exact, broad }
    }

    pub fn lookup(&self, code: &str, message: &str) -> Option<ExchangeErrorKind> {
        if let Some((_, kind)) = self.exact.iter().find(|(c, _)| *c == code) {
            return Some(*kind);
        }
        let lower = message.to_ascii_lowercase();
        self.broad
            .iter()
            .find(|(needle, _)| lower.contains(&needle.to_ascii_lowercase()))
            .map(|(_, kind)| *kind)
    }

    pub fn translate(&self, code: &str, message: &str) -> ExchangeError {
        let kind = self.lookup(code, message).unwrap_or(ExchangeErrorKind::Rejected);
        ExchangeError::new(kind, code, message)
    }
}
