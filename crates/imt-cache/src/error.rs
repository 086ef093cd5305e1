use imt_schemas::Category;
use serde::Serialize;
use std::fmt;

/// A category that did not load, with the reason as logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFailure {
    pub category: Category,
    pub message: String,
}

impl CategoryFailure {
    pub fn new(category: Category, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for CategoryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)
    }
}

/// Initialization outcome surfaced to cache callers.
///
/// `Clone` so a captured failure can be handed to every later caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Neither the store nor the remote source produced any category.
    NoCategoryLoaded { failures: Vec<CategoryFailure> },
    /// The caller's token fired before any category loaded.
    Cancelled,
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::NoCategoryLoaded { failures } if failures.is_empty() => {
                write!(f, "no instrument category loaded")
            }
            CatalogError::NoCategoryLoaded { failures } => {
                write!(f, "no instrument category loaded: ")?;
                for (i, fl) in failures.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{fl}")?;
                }
                Ok(())
            }
            CatalogError::Cancelled => write!(f, "instrument catalog initialization cancelled"),
        }
    }
}

impl std::error::Error for CatalogError {}
