//! Expected inputs of a target
//!
//! An [`InputSchema`] lists the input slots a target declares. Validating a
//! [`WorkItem`] against it is a pure function returning a
//! [`ValidationReport`].

use crate::value::{ValueKind, WorkItem};
use serde::{Deserialize, Serialize};

/// One declared input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSlot {
    pub key: String,
    /// Expected shape, `None` accepts anything
    pub kind: Option<ValueKind>,
    /// Optional slots have a default value inside the target
    pub required: bool,
}

impl InputSlot {
    pub fn required(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: None,
            required: true,
        }
    }

    pub fn optional(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: None,
            required: false,
        }
    }

    pub fn of_kind(mut self, kind: ValueKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSchema {
    slots: Vec<InputSlot>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schema whose slots are all required and accept any kind
    pub fn required_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: keys.into_iter().map(InputSlot::required).collect(),
        }
    }

    pub fn with_slot(mut self, slot: InputSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn slots(&self) -> &[InputSlot] {
        &self.slots
    }

    /// Keys that must be present, first declaration wins
    pub fn expected_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for slot in self.slots.iter().filter(|slot| slot.required) {
            if !keys.contains(&slot.key.as_str()) {
                keys.push(&slot.key);
            }
        }
        keys
    }

    pub fn validate(&self, item: &WorkItem) -> ValidationReport {
        let mut report = ValidationReport::default();

        for slot in &self.slots {
            match item.get(&slot.key) {
                None => {
                    if slot.required && !report.missing.contains(&slot.key) {
                        report.missing.push(slot.key.clone());
                    }
                }
                Some(value) => {
                    let Some(expected) = slot.kind else { continue };
                    if !value.fits(expected)
                        && !report.wrong_kind.iter().any(|m| m.key == slot.key)
                    {
                        report.wrong_kind.push(KindMismatch {
                            key: slot.key.clone(),
                            expected,
                            actual: value.kind(),
                        });
                    }
                }
            }
        }

        report
    }
}

/// Present key whose value has the wrong shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindMismatch {
    pub key: String,
    pub expected: ValueKind,
    pub actual: ValueKind,
}

/// Result of validating one item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Missing required keys, in declaration order, without duplicates
    pub missing: Vec<String>,
    pub wrong_kind: Vec<KindMismatch>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.wrong_kind.is_empty()
    }

    /// Human-readable summary, `None` when valid
    pub fn message(&self) -> Option<String> {
        if self.is_valid() {
            return None;
        }

        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "Missing keys required for graph: {}",
                self.missing.join("; ")
            ));
        }
        if !self.wrong_kind.is_empty() {
            let mismatches: Vec<String> = self
                .wrong_kind
                .iter()
                .map(|m| format!("{} (expected {}, got {})", m.key, m.expected, m.actual))
                .collect();
            parts.push(format!("Invalid inputs: {}", mismatches.join("; ")));
        }
        Some(parts.join(". "))
    }
}
