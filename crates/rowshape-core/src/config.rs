//! Catalog configuration

use serde::{Deserialize, Serialize};

/// Settings a hosting application passes to every catalog it creates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Compare table and column names case-sensitively
    pub case_sensitive_names: bool,
}

impl CatalogConfig {
    pub fn case_sensitive(mut self, case_sensitive_names: bool) -> Self {
        self.case_sensitive_names = case_sensitive_names;
        self
    }
}
