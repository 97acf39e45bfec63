//! Loading lunar birthdays from the records file.
//!
//! The file is a JSON object mapping a person's name to a `YYYY-M-D` lunar
//! date:
//!
//! ```json
//! { "Alice": "1990-3-15", "Bob": "1985-12-1" }
//! ```
//!
//! Entries keep their file order and repeated names are kept as separate
//! records.

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use shared_types::{BirthdayRecord, LunarDate};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::RecordError;

pub struct BirthdayRecordSource {
    path: PathBuf,
}

impl BirthdayRecordSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate every record in the file
    pub async fn load(&self) -> Result<Vec<BirthdayRecord>, RecordError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| RecordError::Read {
                path: self.path.clone(),
                source,
            })?;

        let records = parse_records(&content)?;
        tracing::info!(
            "Loaded {} birthday records from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }
}

/// Parse the records JSON, failing on the first malformed date
pub fn parse_records(json: &str) -> Result<Vec<BirthdayRecord>, RecordError> {
    let RawEntries(entries) = serde_json::from_str(json)?;

    entries
        .into_iter()
        .map(|(name, value)| match value.parse::<LunarDate>() {
            Ok(lunar_birthday) => Ok(BirthdayRecord {
                name,
                lunar_birthday,
            }),
            Err(source) => Err(RecordError::InvalidDate {
                name,
                value,
                source,
            }),
        })
        .collect()
}

/// Object entries in document order, duplicates included
struct RawEntries(Vec<(String, String)>);

impl<'de> Deserialize<'de> for RawEntries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawEntries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping names to lunar dates")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, String>()? {
                    entries.push(entry);
                }
                Ok(RawEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
