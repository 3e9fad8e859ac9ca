//! # Region Directory
//!
//! In-memory wilayah table: `code,name` rows loaded once at startup, then
//! shared read-only across requests. Lookups are linear scans in load order.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::models::Region;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

/// One entry of a name suggestion list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameSuggestion {
    pub name: String,
}

/// One entry of a code search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeMatch {
    pub code: String,
}

#[derive(Debug, Default)]
pub struct RegionDirectory {
    regions: Vec<Region>,
    skipped_rows: usize,
}

impl RegionDirectory {
    /// Reads a headerless two-column source. Rows with any other field count,
    /// or that are not valid UTF-8, are skipped and counted.
    pub fn load<R: Read>(source: R) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(source);

        let mut regions = Vec::new();
        let mut skipped_rows = 0;
        for record in reader.records() {
            match record {
                Ok(row) if row.len() == 2 => regions.push(Region {
                    code: row[0].to_string(),
                    name: row[1].to_string(),
                }),
                Ok(_) => skipped_rows += 1,
                Err(err) if err.is_io_error() => return Err(LoadError::Read(err)),
                Err(_) => skipped_rows += 1,
            }
        }

        let directory = Self {
            regions,
            skipped_rows,
        };
        directory.report();
        Ok(directory)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::load(file)
    }

    pub fn from_regions(regions: Vec<Region>) -> Self {
        Self {
            regions,
            skipped_rows: 0,
        }
    }

    fn report(&self) {
        info!(regions = self.regions.len(), "Region directory loaded");
        if self.skipped_rows > 0 {
            warn!(skipped = self.skipped_rows, "Skipped malformed region rows");
        }
        let mut seen = HashSet::new();
        let duplicates = self
            .regions
            .iter()
            .filter(|region| !seen.insert(region.code.as_str()))
            .count();
        if duplicates > 0 {
            warn!(duplicates, "Duplicate region codes; lookups return the first row");
        }
    }

    /// Names starting with `query` (case-insensitive), at most `limit`, in load order.
    pub fn suggest_by_prefix(&self, query: &str, limit: usize) -> Vec<NameSuggestion> {
        debug!(query, limit, "Suggesting regions");
        self.matching(query)
            .take(limit)
            .map(|region| NameSuggestion {
                name: region.name.clone(),
            })
            .collect()
    }

    /// Codes of every region whose name starts with `query` (case-insensitive).
    pub fn codes_by_prefix(&self, query: &str) -> Vec<CodeMatch> {
        debug!(query, "Searching region codes");
        self.matching(query)
            .map(|region| CodeMatch {
                code: region.code.clone(),
            })
            .collect()
    }

    pub fn by_code(&self, code: &str) -> Option<&Region> {
        self.regions.iter().find(|region| region.code == code)
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    fn matching<'a>(&'a self, query: &str) -> impl Iterator<Item = &'a Region> + 'a {
        let needle = query.to_lowercase();
        self.regions
            .iter()
            .filter(move |region| !needle.is_empty() && region.name.to_lowercase().starts_with(&needle))
    }
}
