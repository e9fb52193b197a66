use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::domain::melon::{Melon, MelonId};

const BUILTIN_CATALOG: &str = include_str!("../../data/melons.toml");

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no melon with id {0} exists in the catalog")]
    NotFound(MelonId),
    #[error("catalog is invalid: {0}")]
    Invalid(String),
    #[error("could not read catalog file `{path}`: {message}")]
    Read { path: PathBuf, message: String },
    #[error("could not parse catalog `{source_name}`: {message}")]
    Parse { source_name: String, message: String },
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    melons: Vec<Melon>,
}

/// Read-only melon catalog, populated once at startup.
#[derive(Clone, Debug)]
pub struct Catalog {
    melons: Vec<Melon>,
    index: HashMap<MelonId, usize>,
}

impl Catalog {
    pub fn new(melons: Vec<Melon>) -> Result<Self, CatalogError> {
        validate(&melons)?;
        let index = melons.iter().enumerate().map(|(position, melon)| (melon.id, position)).collect();
        Ok(Self { melons, index })
    }

    /// The catalog bundled with the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_toml_str(BUILTIN_CATALOG, "builtin")
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|error| CatalogError::Read {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?;
        Self::from_toml_str(&raw, &path.display().to_string())
    }

    /// Loads `path` when given, otherwise the bundled catalog.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self, CatalogError> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(raw: &str, source_name: &str) -> Result<Self, CatalogError> {
        let document = toml::from_str::<CatalogDocument>(raw).map_err(|error| {
            CatalogError::Parse { source_name: source_name.to_string(), message: error.to_string() }
        })?;
        Self::new(document.melons)
    }

    /// Every melon, in definition order.
    pub fn list_all(&self) -> &[Melon] {
        &self.melons
    }

    pub fn get_by_id(&self, id: MelonId) -> Result<&Melon, CatalogError> {
        self.index
            .get(&id)
            .and_then(|position| self.melons.get(*position))
            .ok_or(CatalogError::NotFound(id))
    }

    pub fn len(&self) -> usize {
        self.melons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.melons.is_empty()
    }
}

fn validate(melons: &[Melon]) -> Result<(), CatalogError> {
    if melons.is_empty() {
        return Err(CatalogError::Invalid("catalog must contain at least one melon".to_string()));
    }

    let mut seen = HashSet::with_capacity(melons.len());
    for melon in melons {
        if melon.id.0 == 0 {
            return Err(CatalogError::Invalid(format!(
                "melon `{}` has id 0; ids must be positive",
                melon.common_name
            )));
        }
        if !seen.insert(melon.id) {
            return Err(CatalogError::Invalid(format!("duplicate melon id {}", melon.id)));
        }
        if melon.price < Decimal::ZERO {
            return Err(CatalogError::Invalid(format!("melon {} has a negative price", melon.id)));
        }
        if melon.common_name.trim().is_empty() || melon.scientific_name.trim().is_empty() {
            return Err(CatalogError::Invalid(format!("melon {} is missing a name", melon.id)));
        }
    }

    Ok(())
}
