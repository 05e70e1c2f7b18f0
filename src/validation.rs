//! Form field checks mirrored from the browser-side validation in `app.js`.
//!
//! Results are advisory: every field gets an `is-valid` / `is-invalid` class,
//! but only a missing required field stops a submission.

use std::{collections::BTreeMap, sync::OnceLock};

use regex::Regex;

pub const MIN_PASSWORD_LEN: usize = 6;

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap())
}

fn re_phone() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d\s\-\+\(\)]+$").unwrap())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Tel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Valid,
    Invalid,
}

impl FieldState {
    pub fn css_class(&self) -> &'static str {
        match self {
            FieldState::Valid => "is-valid",
            FieldState::Invalid => "is-invalid",
        }
    }
}

/// Blank optional fields are valid; format rules only apply to non-blank values.
pub fn validate_field(kind: FieldKind, required: bool, value: &str) -> FieldState {
    let value = value.trim();
    if value.is_empty() {
        return if required {
            FieldState::Invalid
        } else {
            FieldState::Valid
        };
    }

    let ok = match kind {
        FieldKind::Text => true,
        FieldKind::Email => re_email().is_match(value),
        FieldKind::Password => value.chars().count() >= MIN_PASSWORD_LEN,
        FieldKind::Tel => re_phone().is_match(value),
    };
    if ok {
        FieldState::Valid
    } else {
        FieldState::Invalid
    }
}

/// Per-field outcome of checking one submitted form.
#[derive(Debug, Default)]
pub struct FormCheck {
    states: BTreeMap<&'static str, FieldState>,
    missing_required: bool,
}

impl FormCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &'static str, kind: FieldKind, required: bool, value: &str) -> Self {
        if required && value.trim().is_empty() {
            self.missing_required = true;
        }
        self.states.insert(name, validate_field(kind, required, value));
        self
    }

    /// Only missing required fields block the submission.
    pub fn blocks_submit(&self) -> bool {
        self.missing_required
    }

    pub fn class(&self, name: &str) -> &'static str {
        self.states
            .get(name)
            .map(FieldState::css_class)
            .unwrap_or_default()
    }
}
