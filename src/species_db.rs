//! Enrichment data joined onto predictions by species name.
//!
//! Loaded once at startup from either a JSON object keyed by species name or
//! a CSV table, then only read. A broken or missing file degrades to an empty
//! table so the service keeps answering with bare predictions.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const UNKNOWN: &str = "Unknown";

static NO_INFO: SpeciesInfo = SpeciesInfo {
    scientific_name: None,
    venom_status: None,
    description: None,
};

#[derive(Error, Debug)]
pub enum SpeciesDbError {
    #[error("failed to read species db: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid species db json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid species db csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("unsupported species db format: {0}")]
    UnsupportedFormat(String),
}

/// Enrichment fields as stored in the table.
///
/// `None` means the field is absent and falls back to its default. A stored
/// value, including an explicit `null`, is passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpeciesInfo {
    pub scientific_name: Option<Value>,
    pub venom_status: Option<Value>,
    pub description: Option<Value>,
}

impl SpeciesInfo {
    pub fn scientific_name(&self) -> Value {
        self.scientific_name
            .clone()
            .unwrap_or_else(|| Value::from(UNKNOWN))
    }

    pub fn venom_status(&self) -> Value {
        self.venom_status
            .clone()
            .unwrap_or_else(|| Value::from(UNKNOWN))
    }

    pub fn description(&self) -> Value {
        self.description.clone().unwrap_or(Value::Null)
    }
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(rename = "Snake_Name")]
    name: String,
    #[serde(rename = "Venom_Status", default)]
    venom: Option<String>,
    #[serde(rename = "Scientific_Name", default)]
    scientific: Option<String>,
    #[serde(rename = "Description", default)]
    description: Option<String>,
}

#[derive(Debug, Default)]
pub struct SpeciesDb {
    entries: HashMap<String, SpeciesInfo>,
}

impl SpeciesDb {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads the table, picking the parser from the file extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpeciesDbError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("json") => Self::from_json(&std::fs::read_to_string(path)?),
            Some("csv") => Self::from_csv_reader(std::fs::File::open(path)?),
            _ => Err(SpeciesDbError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Like [`SpeciesDb::load`], but logs failures and falls back to an empty table.
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(db) => {
                tracing::info!("Loaded {} species records from {}", db.len(), path.display());
                db
            }
            Err(err) => {
                tracing::error!(
                    "Error loading species db from {}: {err}; continuing without enrichment",
                    path.display()
                );
                Self::empty()
            }
        }
    }

    /// Parses a JSON object keyed by species name. Entries that are not
    /// objects are skipped with a warning; the rest of the table is kept.
    pub fn from_json(contents: &str) -> Result<Self, SpeciesDbError> {
        let raw: HashMap<String, Value> = serde_json::from_str(contents)?;

        let mut entries = HashMap::with_capacity(raw.len());
        for (name, entry) in raw {
            let Value::Object(mut fields) = entry else {
                tracing::warn!("Skipping species db entry {name:?}: expected an object");
                continue;
            };
            let info = SpeciesInfo {
                scientific_name: fields.remove("scientific"),
                venom_status: fields.remove("venom"),
                description: fields.remove("description"),
            };
            entries.insert(name.trim().to_string(), info);
        }

        Ok(Self { entries })
    }

    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self, SpeciesDbError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = HashMap::new();
        for row in reader.deserialize() {
            let row: CsvRow = row?;
            if row.name.is_empty() {
                continue;
            }
            entries.insert(
                row.name,
                SpeciesInfo {
                    scientific_name: row.scientific.map(Value::from),
                    venom_status: row.venom.map(Value::from),
                    description: row.description.map(Value::from),
                },
            );
        }

        Ok(Self { entries })
    }

    /// Never fails: unknown names resolve to a record whose fields all default.
    pub fn lookup(&self, name: &str) -> &SpeciesInfo {
        self.entries.get(name.trim()).unwrap_or(&NO_INFO)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
