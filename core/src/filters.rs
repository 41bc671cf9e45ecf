//! Filter and retrieval settings, and their translation into request overrides.
//!
//! Document categories are tracked as the set of *excluded* keys, while
//! versions and audiences are tracked as the set of *included* keys. The
//! backend relies on the exact joins produced by [`FilterState::build_overrides`]:
//! commas for categories and versions, pipes for audiences.

use crate::errors::{ChatError, ChatResult};
use crate::types::{ImageInputMode, RequestOverrides, RetrievalMode, VectorField};

/// A selectable filter option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOption {
    pub key: &'static str,
    pub text: &'static str,
}

const fn opt(key: &'static str, text: &'static str) -> FilterOption {
    FilterOption { key, text }
}

pub const CATEGORY_OPTIONS: &[FilterOption] = &[
    opt("Tip Sheet", "Tip Sheet"),
    opt("Quick Start Guide", "Quick Start Guide"),
    opt("Reference Guide", "Reference Guide"),
    opt("FAQs", "FAQs"),
];

pub const VERSION_OPTIONS: &[FilterOption] = &[
    opt("2024Winter", "2024 Winter"),
    opt("2024Summer", "2024 Summer"),
    opt("2023Hyperdrive", "2023 Hyperdrive"),
    opt("2023Summer", "2023 Summer"),
    opt("2022Fall", "2022 Fall"),
    opt("2022Spring", "2022 Spring"),
    opt("2021Fall", "2021 Fall"),
    opt("2021Spring", "2021 Spring"),
    opt("2020Fall", "2020 Fall"),
    opt("2020Spring", "2020 Spring"),
    opt("2019", "2019"),
    opt("2018", "2018"),
    opt("2017", "2017"),
    opt("2014", "2014"),
];

pub const AUDIENCE_OPTIONS: &[FilterOption] = &[
    opt("Ambulatory Clinicians", "Ambulatory Clinicians"),
    opt("Ambulatory Providers", "Ambulatory Providers"),
    opt(
        "Ancillary Staff (PT, OT, SLP, Audiologist, Dietician, Social Worker or Chaplain)",
        "Ancillary Staff (PT, OT, SLP, Audiologist, Dietician, Social Worker or Chaplain)",
    ),
    opt("Behavioral Health Clinician", "Behavioral Health Clinician"),
    opt("Charge Entry Staff", "Charge Entry Staff"),
    opt("Claims Staff", "Claims Staff"),
    opt(
        "Clinical Staff (RN, LPN, MA or MTA)",
        "Clinical Staff (RN, LPN, MA or MTA)",
    ),
    opt("Customer Service Staff", "Customer Service Staff"),
    opt("ED Clerk", "ED Clerk"),
    opt("ED Nurse", "ED Nurse"),
    opt("ED Provider", "ED Provider"),
    opt("Front Desk", "Front Desk"),
    opt("HIM", "HIM"),
    opt("Home Health", "Home Health"),
    opt("Home Infusion", "Home Infusion"),
    opt("Hospice", "Hospice"),
    opt("Hospice IPU", "Hospice IPU"),
    opt("Informaticists", "Informaticists"),
    opt("Inpatient Peds Extended Hours", "Inpatient Peds Extended Hours"),
    opt("Insurance FollowUp Staff", "Insurance FollowUp Staff"),
    opt("Managers", "Managers"),
    opt("Medical Records/HIM Staff", "Medical Records/HIM Staff"),
    opt("Oncology Staff", "Oncology Staff"),
    opt("Other", "Other"),
    opt("Patient Access Staff", "Patient Access Staff"),
    opt("Pharmacist", "Pharmacist"),
    opt("Pharmacy Tech", "Pharmacy Tech"),
    opt(
        "Providers (Attending, Resident, NP or PA)",
        "Providers (Attending, Resident, NP or PA)",
    ),
    opt("Registration", "Registration"),
    opt("Scheduling", "Scheduling"),
    opt("Technologist", "Technologist"),
];

pub const DEFAULT_TOP: u32 = 3;

/// Which filter a toggle applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Category,
    Version,
    Audience,
}

impl FilterKind {
    pub fn name(self) -> &'static str {
        match self {
            FilterKind::Category => "category",
            FilterKind::Version => "version",
            FilterKind::Audience => "audience",
        }
    }

    pub fn options(self) -> &'static [FilterOption] {
        match self {
            FilterKind::Category => CATEGORY_OPTIONS,
            FilterKind::Version => VERSION_OPTIONS,
            FilterKind::Audience => AUDIENCE_OPTIONS,
        }
    }
}

fn all_keys(options: &[FilterOption]) -> Vec<String> {
    options.iter().map(|o| o.key.to_string()).collect()
}

/// Mutable settings-panel state
#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub prompt_template: String,
    pub top: u32,
    pub retrieval_mode: RetrievalMode,
    pub semantic_ranker: bool,
    pub semantic_captions: bool,
    pub suggest_followup_questions: bool,
    pub use_oid_security_filter: bool,
    pub use_groups_security_filter: bool,
    pub vector_fields: Vec<VectorField>,
    pub use_images: bool,
    pub image_input_mode: ImageInputMode,
    excluded_categories: Vec<String>,
    included_versions: Vec<String>,
    included_audiences: Vec<String>,
    all_categories_checked: bool,
    all_versions_checked: bool,
    all_audiences_checked: bool,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            prompt_template: String::new(),
            top: DEFAULT_TOP,
            retrieval_mode: RetrievalMode::Hybrid,
            semantic_ranker: true,
            semantic_captions: false,
            suggest_followup_questions: false,
            use_oid_security_filter: false,
            use_groups_security_filter: false,
            vector_fields: vec![VectorField::Embedding],
            use_images: false,
            image_input_mode: ImageInputMode::TextAndImages,
            excluded_categories: Vec::new(),
            included_versions: all_keys(VERSION_OPTIONS),
            included_audiences: all_keys(AUDIENCE_OPTIONS),
            all_categories_checked: true,
            all_versions_checked: true,
            all_audiences_checked: true,
        }
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluded_categories(&self) -> &[String] {
        &self.excluded_categories
    }

    pub fn included_versions(&self) -> &[String] {
        &self.included_versions
    }

    pub fn included_audiences(&self) -> &[String] {
        &self.included_audiences
    }

    /// Whether the checkbox for `key` shows as checked.
    ///
    /// For categories this means "not excluded".
    pub fn is_checked(&self, kind: FilterKind, key: &str) -> bool {
        match kind {
            FilterKind::Category => !self.excluded_categories.iter().any(|k| k == key),
            FilterKind::Version => self.included_versions.iter().any(|k| k == key),
            FilterKind::Audience => self.included_audiences.iter().any(|k| k == key),
        }
    }

    /// Flip a single checkbox
    pub fn toggle(&mut self, kind: FilterKind, key: &str) -> ChatResult<()> {
        if !kind.options().iter().any(|o| o.key == key) {
            return Err(ChatError::UnknownOption {
                filter: kind.name(),
                key: key.to_string(),
            });
        }

        let set = match kind {
            FilterKind::Category => &mut self.excluded_categories,
            FilterKind::Version => &mut self.included_versions,
            FilterKind::Audience => &mut self.included_audiences,
        };
        if let Some(pos) = set.iter().position(|k| k == key) {
            set.remove(pos);
        } else {
            set.push(key.to_string());
        }
        Ok(())
    }

    /// "Check all / uncheck all" for one filter; replaces the whole set
    pub fn toggle_all(&mut self, kind: FilterKind) {
        match kind {
            FilterKind::Category => {
                self.excluded_categories = if self.all_categories_checked {
                    all_keys(CATEGORY_OPTIONS)
                } else {
                    Vec::new()
                };
                self.all_categories_checked = !self.all_categories_checked;
            }
            FilterKind::Version => {
                self.included_versions = if self.all_versions_checked {
                    Vec::new()
                } else {
                    all_keys(VERSION_OPTIONS)
                };
                self.all_versions_checked = !self.all_versions_checked;
            }
            FilterKind::Audience => {
                self.included_audiences = if self.all_audiences_checked {
                    Vec::new()
                } else {
                    all_keys(AUDIENCE_OPTIONS)
                };
                self.all_audiences_checked = !self.all_audiences_checked;
            }
        }
    }

    /// Set every box of one filter to checked (`true`) or unchecked
    pub fn set_all(&mut self, kind: FilterKind, checked: bool) {
        // toggle_all flips from the recorded flag, so align it first
        match kind {
            FilterKind::Category => self.all_categories_checked = !checked,
            FilterKind::Version => self.all_versions_checked = !checked,
            FilterKind::Audience => self.all_audiences_checked = !checked,
        }
        self.toggle_all(kind);
        tracing::debug!(filter = kind.name(), checked, "Replaced filter selection");
    }

    /// Update the retrieve count from the raw text of the input field
    pub fn set_top(&mut self, raw: &str) {
        self.top = raw.trim().parse::<u32>().unwrap_or(DEFAULT_TOP);
    }

    /// Snapshot the current selection as request overrides
    pub fn build_overrides(&self) -> RequestOverrides {
        RequestOverrides {
            prompt_template: if self.prompt_template.is_empty() {
                None
            } else {
                Some(self.prompt_template.clone())
            },
            include_category: self.excluded_categories.join(","),
            include_version: self.included_versions.join(","),
            include_audience: self.included_audiences.join("|"),
            top: self.top,
            retrieval_mode: self.retrieval_mode,
            semantic_ranker: self.semantic_ranker,
            semantic_captions: self.semantic_captions,
            suggest_followup_questions: self.suggest_followup_questions,
            use_oid_security_filter: self.use_oid_security_filter,
            use_groups_security_filter: self.use_groups_security_filter,
            vector_fields: self.vector_fields.clone(),
            use_images: self.use_images,
            image_input_mode: self.image_input_mode,
        }
    }
}

/// Audience options whose display text contains `term` (case-insensitive).
///
/// Falls back to the "Other" option when nothing matches.
pub fn audience_options_matching(term: &str) -> Vec<&'static FilterOption> {
    let needle = term.to_lowercase();
    let matches: Vec<&'static FilterOption> = AUDIENCE_OPTIONS
        .iter()
        .filter(|o| o.text.to_lowercase().contains(&needle))
        .collect();
    if !matches.is_empty() {
        return matches;
    }
    AUDIENCE_OPTIONS.iter().filter(|o| o.key == "Other").collect()
}
