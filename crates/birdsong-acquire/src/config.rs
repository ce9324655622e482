use anyhow::Result;
use std::path::PathBuf;

pub const DEFAULT_INATURALIST_URL: &str = "https://api.inaturalist.org";
pub const DEFAULT_XENO_CANTO_URL: &str = "https://xeno-canto.org";
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Which providers a run downloads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderSelection {
    #[default]
    All,
    INaturalist,
    XenoCanto,
}

impl ProviderSelection {
    pub fn includes_inaturalist(self) -> bool {
        matches!(self, Self::All | Self::INaturalist)
    }

    pub fn includes_xeno_canto(self) -> bool {
        matches!(self, Self::All | Self::XenoCanto)
    }
}

/// Everything a [`crate::pipeline::Pipeline`] needs, passed in at construction.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Root under which one folder per species is created.
    pub base_directory: PathBuf,
    /// xeno-canto API key. Only needed when xeno-canto is selected.
    pub xeno_api_key: Option<String>,
    /// iNaturalist observations requested per page.
    pub per_page: u32,
    pub inaturalist_url: String,
    pub xeno_canto_url: String,
    pub providers: ProviderSelection,
}

impl FetchConfig {
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        Self {
            base_directory: base_directory.into(),
            xeno_api_key: None,
            per_page: DEFAULT_PER_PAGE,
            inaturalist_url: DEFAULT_INATURALIST_URL.to_string(),
            xeno_canto_url: DEFAULT_XENO_CANTO_URL.to_string(),
            providers: ProviderSelection::All,
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.per_page > 0, "per_page must be at least 1");
        if self.providers.includes_xeno_canto() {
            anyhow::ensure!(
                self.xeno_api_key.as_deref().is_some_and(|k| !k.trim().is_empty()),
                "XENO_API_KEY is required when fetching from xeno-canto"
            );
        }
        Ok(())
    }
}
