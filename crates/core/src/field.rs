use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pixel rectangle `(x1, y1)-(x2, y2)` in the template's coordinate space.
/// The right and bottom edges are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[u32; 4]", into = "[u32; 4]")]
pub struct BoundingBox {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Result<Self, FieldError> {
        if x1 >= x2 || y1 >= y2 {
            return Err(FieldError::InvalidBox { x1, y1, x2, y2 });
        }
        Ok(BoundingBox { x1, y1, x2, y2 })
    }

    pub fn x1(self) -> u32 {
        self.x1
    }

    pub fn y1(self) -> u32 {
        self.y1
    }

    pub fn x2(self) -> u32 {
        self.x2
    }

    pub fn y2(self) -> u32 {
        self.y2
    }

    pub fn width(self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(self) -> u32 {
        self.y2 - self.y1
    }

    /// Whether the whole box lies inside an image of the given size.
    pub fn fits_within(self, width: u32, height: u32) -> bool {
        self.x2 <= width && self.y2 <= height
    }

    /// Intersection with an image of the given size, or `None` when empty.
    pub fn clamp_to(self, width: u32, height: u32) -> Option<BoundingBox> {
        BoundingBox::new(self.x1, self.y1, self.x2.min(width), self.y2.min(height)).ok()
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

impl TryFrom<[u32; 4]> for BoundingBox {
    type Error = FieldError;

    fn try_from([x1, y1, x2, y2]: [u32; 4]) -> Result<Self, Self::Error> {
        BoundingBox::new(x1, y1, x2, y2)
    }
}

impl From<BoundingBox> for [u32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// The semantic fields read from every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    BeneficiaryName,
    Mobile,
    Date,
    RecordNumber,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::BeneficiaryName,
        FieldKind::Mobile,
        FieldKind::Date,
        FieldKind::RecordNumber,
    ];

    /// Label printed on the document template.
    pub fn label(self) -> &'static str {
        match self {
            FieldKind::BeneficiaryName => "Name of beneficiary",
            FieldKind::Mobile => "Mobile",
            FieldKind::Date => "Date",
            FieldKind::RecordNumber => "Record No.",
        }
    }

    /// Key used in configuration files.
    pub fn key(self) -> &'static str {
        match self {
            FieldKind::BeneficiaryName => "beneficiary_name",
            FieldKind::Mobile => "mobile",
            FieldKind::Date => "date",
            FieldKind::RecordNumber => "record_number",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for FieldKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKind::ALL
            .into_iter()
            .find(|k| k.key() == s || k.label() == s)
            .ok_or_else(|| format!("Unknown field: '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub kind: FieldKind,
    pub bbox: BoundingBox,
}

impl FieldDefinition {
    pub fn name(&self) -> &'static str {
        self.kind.label()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Invalid bounding box ({x1}, {y1}, {x2}, {y2}): need x1 < x2 and y1 < y2")]
    InvalidBox { x1: u32, y1: u32, x2: u32, y2: u32 },
    #[error("Field '{0}' is defined more than once")]
    Duplicate(FieldKind),
    #[error("Field '{0}' has no region")]
    Missing(FieldKind),
}

/// Positions of the reference document template.
pub const DEFAULT_FIELD_POSITIONS: &[(FieldKind, [u32; 4])] = &[
    (FieldKind::BeneficiaryName, [515, 491, 817, 523]),
    (FieldKind::Mobile, [554, 791, 914, 876]),
    (FieldKind::Date, [1118, 243, 1365, 311]),
    (FieldKind::RecordNumber, [273, 246, 446, 295]),
];

/// Validated, ordered set of field regions. Every [`FieldKind`] appears once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    fields: Vec<FieldDefinition>,
}

impl FieldMap {
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self, FieldError> {
        for (i, def) in fields.iter().enumerate() {
            if fields[..i].iter().any(|d| d.kind == def.kind) {
                return Err(FieldError::Duplicate(def.kind));
            }
        }
        if let Some(kind) = FieldKind::ALL
            .into_iter()
            .find(|k| !fields.iter().any(|d| d.kind == *k))
        {
            return Err(FieldError::Missing(kind));
        }
        Ok(FieldMap { fields })
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter()
    }

    pub fn get(&self, kind: FieldKind) -> Option<&FieldDefinition> {
        self.fields.iter().find(|d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        let fields = DEFAULT_FIELD_POSITIONS
            .iter()
            .map(|&(kind, [x1, y1, x2, y2])| FieldDefinition {
                kind,
                bbox: BoundingBox { x1, y1, x2, y2 },
            })
            .collect();
        FieldMap { fields }
    }
}
