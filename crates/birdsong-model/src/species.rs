use crate::sanitize;

/// A species as resolved against the iNaturalist taxa lookup.
///
/// Resolved once per run and not modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Species {
    /// Accepted scientific name from the lookup (e.g., "Corvus orru").
    pub scientific_name: String,
    /// Preferred English name (e.g., "Torresian Crow").
    pub common_name: String,
    /// iNaturalist taxon id, kept as text.
    pub external_id: String,
}

impl Species {
    /// Name of the per-species output directory.
    pub fn folder_name(&self) -> String {
        sanitize::folder_name(&self.common_name)
    }
}
