//! Textual member names in the host toolkit's syntax.
//!
//! A leading `1` marks a native slot and a leading `2` a native signal, the
//! way the toolkit's `SLOT()`/`SIGNAL()` macros encode them. Any other text is
//! a plain managed signal name.

pub const SLOT_SENTINEL: char = '1';
pub const SIGNAL_SENTINEL: char = '2';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    NativeSlot,
    NativeSignal,
    Managed,
}

/// A parsed member name borrowing from the original text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberName<'a> {
    pub kind: MemberKind,
    /// The name without its sentinel.
    pub text: &'a str,
}

impl<'a> MemberName<'a> {
    pub fn parse(raw: &'a str) -> Self {
        let (kind, text) = if let Some(rest) = raw.strip_prefix(SLOT_SENTINEL) {
            (MemberKind::NativeSlot, rest)
        } else if let Some(rest) = raw.strip_prefix(SIGNAL_SENTINEL) {
            (MemberKind::NativeSignal, rest)
        } else {
            (MemberKind::Managed, raw)
        };
        Self { kind, text }
    }

    /// The name up to any argument list.
    pub fn base_name(&self) -> &'a str {
        base_name(self.text)
    }

    pub fn is_native(&self) -> bool {
        self.kind != MemberKind::Managed
    }
}

/// The part of a signature before `(`, trimmed.
pub fn base_name(text: &str) -> &str {
    text.split('(').next().unwrap_or(text).trim()
}
