//! Human observation grammar and encoder.
//!
//! An operator describes a sighting by filling five cascading fields of one
//! [`CategoryKind`]:
//!
//! ```text
//! certainty  target  positivity  descriptor  specification
//! Definitely person  good        near        door
//! ```
//!
//! [`encode`] turns that selection into the sentence-shaped payload the
//! perception pipeline parses from `/human_sensor`.  Two suppression rules
//! make some fields irrelevant depending on earlier ones:
//!
//! * a `"nothing"` target has no positivity;
//! * a `"stopped"` movement has no movement quality (specification).
//!
//! [`visibility`] exposes the same rules as data so a presentation layer can
//! hide the corresponding widgets.

use std::fmt;
use std::str::FromStr;

use cnr_types::PanelError;
use serde::Serialize;

/// Target value that suppresses the positivity field.
pub const NOTHING: &str = "nothing";

/// Movement descriptor that suppresses the specification field.
pub const STOPPED: &str = "stopped";

const CERTAINTIES: &[&str] = &["Definitely", "Probably", "Maybe"];
const TARGETS: &[&str] = &["nothing", "person", "robot", "Roy", "Pris", "Zhora"];

const OBJECT_POSITIVITIES: &[&str] = &["good", "bad"];
const OBJECT_DESCRIPTORS: &[&str] = &[
    "near",
    "inside",
    "in front of",
    "behind",
    "left of",
    "right of",
    "unknown",
];
const OBJECT_SPECIFICATIONS: &[&str] = &["", "door", "desk", "chair", "bookcase", "table"];

const STATE_POSITIVITIES: &[&str] = &["is", "is not"];
const AREA_DESCRIPTORS: &[&str] = &["inside", "near", "outside"];
const AREA_SPECIFICATIONS: &[&str] = &[
    "",
    "the kitchen",
    "the hallway",
    "the study",
    "the library",
    "the billiard room",
    "the dining room",
];

const MOVEMENT_DESCRIPTORS: &[&str] = &["moving", "stopped"];
const MOVEMENT_SPECIFICATIONS: &[&str] = &["", "slowly", "moderately", "quickly"];

// ────────────────────────────────────────────────────────────────────────────
// Category and field identifiers
// ────────────────────────────────────────────────────────────────────────────

/// The three observation tabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CategoryKind {
    Object,
    Area,
    Movement,
}

impl CategoryKind {
    /// Every category in tab order.
    pub const ALL: [CategoryKind; 3] = [CategoryKind::Object, CategoryKind::Area, CategoryKind::Movement];

    pub fn name(self) -> &'static str {
        match self {
            CategoryKind::Object => "Object",
            CategoryKind::Area => "Area",
            CategoryKind::Movement => "Movement",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            CategoryKind::Object => 0,
            CategoryKind::Area => 1,
            CategoryKind::Movement => 2,
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CategoryKind {
    type Err = PanelError;

    /// Case-insensitive tab name lookup.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CategoryKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PanelError::NotFound {
                kind: "category".to_string(),
                name: s.to_string(),
            })
    }
}

/// The five ordered fields every category carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Certainty,
    Target,
    Positivity,
    Descriptor,
    Specification,
}

impl Field {
    /// Every field in sentence order.
    pub const ALL: [Field; 5] = [
        Field::Certainty,
        Field::Target,
        Field::Positivity,
        Field::Descriptor,
        Field::Specification,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::Certainty => "certainty",
            Field::Target => "target",
            Field::Positivity => "positivity",
            Field::Descriptor => "descriptor",
            Field::Specification => "specification",
        }
    }

    fn index(self) -> usize {
        match self {
            Field::Certainty => 0,
            Field::Target => 1,
            Field::Positivity => 2,
            Field::Descriptor => 3,
            Field::Specification => 4,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PanelError::NotFound {
                kind: "field".to_string(),
                name: s.to_string(),
            })
    }
}

/// The option set for `field` in `kind`.
pub fn options(kind: CategoryKind, field: Field) -> &'static [&'static str] {
    match (kind, field) {
        (_, Field::Certainty) => CERTAINTIES,
        (_, Field::Target) => TARGETS,
        (CategoryKind::Object, Field::Positivity) => OBJECT_POSITIVITIES,
        (_, Field::Positivity) => STATE_POSITIVITIES,
        (CategoryKind::Object, Field::Descriptor) => OBJECT_DESCRIPTORS,
        (CategoryKind::Area, Field::Descriptor) => AREA_DESCRIPTORS,
        (CategoryKind::Movement, Field::Descriptor) => MOVEMENT_DESCRIPTORS,
        (CategoryKind::Object, Field::Specification) => OBJECT_SPECIFICATIONS,
        (CategoryKind::Area, Field::Specification) => AREA_SPECIFICATIONS,
        (CategoryKind::Movement, Field::Specification) => MOVEMENT_SPECIFICATIONS,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SelectionCategory
// ────────────────────────────────────────────────────────────────────────────

/// The current field values of one observation category.
///
/// Values are validated against [`options`] when set through
/// [`SelectionCategory::set`] or [`SelectionCategory::with_values`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectionCategory {
    kind: CategoryKind,
    values: [String; 5],
}

impl SelectionCategory {
    /// A category holding the first option of every field, with an empty
    /// specification.
    pub fn new(kind: CategoryKind) -> Self {
        let values = Field::ALL.map(|field| match field {
            Field::Specification => String::new(),
            _ => options(kind, field)[0].to_string(),
        });
        Self { kind, values }
    }

    /// A category with all five values given in sentence order.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::InvalidOption`] for the first value outside its
    /// option set.
    pub fn with_values(kind: CategoryKind, values: [&str; 5]) -> Result<Self, PanelError> {
        let mut category = Self::new(kind);
        for (field, value) in Field::ALL.into_iter().zip(values) {
            category.set(field, value)?;
        }
        Ok(category)
    }

    pub fn kind(&self) -> CategoryKind {
        self.kind
    }

    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    /// Store `value` in `field`.
    ///
    /// # Errors
    ///
    /// Returns [`PanelError::InvalidOption`] when `value` is not one of
    /// [`options`]`(self.kind(), field)`; the stored value is unchanged.
    pub fn set(&mut self, field: Field, value: &str) -> Result<(), PanelError> {
        if !options(self.kind, field).contains(&value) {
            return Err(PanelError::InvalidOption {
                field: format!("{}.{}", self.kind, field),
                value: value.to_string(),
            });
        }
        self.values[field.index()] = value.to_string();
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Suppression rules and encoding
// ────────────────────────────────────────────────────────────────────────────

/// Which cascading fields are relevant given the earlier selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldVisibility {
    pub positivity: bool,
    pub specification: bool,
}

/// Apply the suppression rules to `category`.
pub fn visibility(category: &SelectionCategory) -> FieldVisibility {
    FieldVisibility {
        positivity: category.get(Field::Target) != NOTHING,
        specification: !(category.kind() == CategoryKind::Movement
            && category.get(Field::Descriptor) == STOPPED),
    }
}

/// Serialize `category` into its observation sentence.
///
/// Every field after `certainty` contributes a leading space and its value,
/// suppressed fields contributing an empty value.  A non-empty specification
/// is followed by one more space, and the sentence always ends in `.`.
///
/// ```
/// use cnr_core::observation::{CategoryKind, SelectionCategory, encode};
///
/// let seen = SelectionCategory::with_values(
///     CategoryKind::Object,
///     ["Definitely", "person", "good", "near", "door"],
/// ).unwrap();
/// assert_eq!(encode(&seen), "Definitely person good near door .");
/// ```
pub fn encode(category: &SelectionCategory) -> String {
    let shown = visibility(category);
    let positivity = if shown.positivity { category.get(Field::Positivity) } else { "" };
    let specification = if shown.specification { category.get(Field::Specification) } else { "" };

    let mut out = String::from(category.get(Field::Certainty));
    for value in [
        category.get(Field::Target),
        positivity,
        category.get(Field::Descriptor),
        specification,
    ] {
        out.push(' ');
        out.push_str(value);
    }
    if !specification.is_empty() {
        out.push(' ');
    }
    out.push('.');
    out
}
