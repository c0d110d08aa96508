pub mod config;
pub mod field;
pub mod record;

pub use config::{BoundsPolicy, Config, ConfigError, ConfusionRule};
pub use field::{BoundingBox, FieldDefinition, FieldError, FieldKind, FieldMap, DEFAULT_FIELD_POSITIONS};
pub use record::{ExtractedRecord, NormalizedRecord, StoredRow};
