use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// CellState is an opaque label from a simulation-declared alphabet.
/// The engine never interprets labels; only `off` is special, as the value
/// of every unset, out-of-range, or not-yet-recorded cell.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CellState(Repr);

#[derive(Clone, PartialEq, Eq, Hash, Default)]
enum Repr {
    #[default]
    Off,
    Label(Arc<str>),
}

/// Shared `off` value, so lookups can hand out references for absent cells
pub(crate) static OFF: CellState = CellState::off();

impl CellState {
    pub const OFF_LABEL: &'static str = "off";

    /// Build a state from its label. `"off"` always maps to the reserved default.
    pub fn new(label: impl AsRef<str>) -> Self {
        let label = label.as_ref();
        if label == Self::OFF_LABEL {
            Self(Repr::Off)
        } else {
            Self(Repr::Label(Arc::from(label)))
        }
    }

    pub const fn off() -> Self {
        Self(Repr::Off)
    }

    pub const fn is_off(&self) -> bool {
        matches!(self.0, Repr::Off)
    }

    pub fn as_str(&self) -> &str {
        match &self.0 {
            Repr::Off => Self::OFF_LABEL,
            Repr::Label(label) => label,
        }
    }
}

impl From<&str> for CellState {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl From<String> for CellState {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl From<CellState> for String {
    fn from(state: CellState) -> Self {
        state.as_str().to_owned()
    }
}

impl PartialEq<str> for CellState {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for CellState {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_off() {
        assert!(CellState::default().is_off());
        assert_eq!(CellState::default(), CellState::off());
    }

    #[test]
    fn test_off_label_normalizes() {
        let parsed = CellState::new("off");
        assert!(parsed.is_off());
        assert_eq!(parsed, CellState::off());
    }

    #[test]
    fn test_labels_compare_by_text() {
        assert_eq!(CellState::new("green"), CellState::from(String::from("green")));
        assert_ne!(CellState::new("green"), CellState::new("blue"));
        assert_eq!(CellState::new("blue"), "blue");
        assert!(!CellState::new("on").is_off());
    }

    #[test]
    fn test_serde_uses_plain_labels() {
        let json = serde_json::to_string(&CellState::new("yellow")).unwrap();
        assert_eq!(json, "\"yellow\"");
        let back: CellState = serde_json::from_str("\"off\"").unwrap();
        assert!(back.is_off());
    }
}
