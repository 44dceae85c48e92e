//! Advisory shown before renaming a document or folder that carries
//! localized display names.
//!
//! This is a pure decision function: it never blocks a rename, it only
//! decides whether the user should be warned that localized names will not
//! follow the new name, and formats the warning.

use itertools::Itertools;

/// Sentinel locale under which a non-localized display name is stored.
pub const DEFAULT_LOCALE: &str = "default";

#[derive(Clone, Debug)]
pub struct RenameAdvisory {
    locale: String,
    names: Vec<(String, String)>,
}

impl RenameAdvisory {
    /// Build an advisory for a rename requested under `locale`, given the
    /// mapping from locale (including [`DEFAULT_LOCALE`]) to display name,
    /// in insertion order.
    pub fn new<I, L, N>(locale: &str, names: I) -> RenameAdvisory
    where
        I: IntoIterator<Item = (L, N)>,
        L: Into<String>,
        N: Into<String>,
    {
        RenameAdvisory {
            locale: locale.to_string(),
            names: names.into_iter()
                .map(|(l, n)| (l.into(), n.into()))
                .collect(),
        }
    }

    /// Should the user be warned about existing localized names?
    ///
    /// A default-only name never warrants a warning. If localized entries
    /// exist the user is warned, with one exception: when the only entries
    /// present are localized ones equal to the request locale and there is
    /// no default entry, there is nothing the user wouldn't already see.
    pub fn should_show(&self) -> bool {
        let mut localized = self.names.iter()
            .filter(|(locale, _)| locale != DEFAULT_LOCALE)
            .peekable();

        if localized.peek().is_none() {
            return false;
        }

        let has_default = self.names.iter()
            .any(|(locale, _)| locale == DEFAULT_LOCALE);

        has_default || localized.any(|(locale, _)| *locale != self.locale)
    }

    /// The warning for renaming a document, or `None` if no warning is due.
    pub fn document_message(&self) -> Option<String> {
        if !self.should_show() {
            return None;
        }

        Some(format!(
            "This document also has localized names which will not be \
             changed by this rename: {}.",
            self.enumerate_names(),
        ))
    }

    /// The warning for renaming a folder, or `None` if no warning is due.
    pub fn folder_message(&self) -> Option<String> {
        if !self.should_show() {
            return None;
        }

        Some(format!(
            "This folder also has localized names which will not be \
             changed by this rename: {}.",
            self.enumerate_names(),
        ))
    }

    fn enumerate_names(&self) -> String {
        self.names.iter()
            .map(|(locale, name)| format!("{}: \u{201c}{}\u{201d}", locale, name))
            .join(", ")
    }
}
