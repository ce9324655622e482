use crate::config::FetchConfig;
use crate::http;
use crate::inaturalist::{self, ObservationSource};
use crate::source::{fetch_and_save, FetchSummary};
use crate::xeno_canto::RecordingSource;
use anyhow::{Context, Result};
use birdsong_model::Species;
use reqwest::Client;
use std::path::PathBuf;

/// What happened for one species.
#[derive(Debug, Clone)]
pub struct SpeciesReport {
    pub species: Species,
    pub folder: PathBuf,
    pub inaturalist: Option<FetchSummary>,
    pub xeno_canto: Option<FetchSummary>,
}

/// Resolves species and runs each selected provider against a per-species folder.
pub struct Pipeline {
    config: FetchConfig,
    client: Client,
}

impl Pipeline {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = http::build_client()?;
        Self::with_client(config, client)
    }

    pub fn with_client(config: FetchConfig, client: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    pub async fn resolve(&self, scientific_name: &str) -> Result<Species> {
        inaturalist::resolve_species(&self.client, &self.config.inaturalist_url, scientific_name).await
    }

    pub fn output_folder(&self, species: &Species) -> PathBuf {
        self.config.base_directory.join(species.folder_name())
    }

    /// Resolve `scientific_name`, create its folder, then run iNaturalist
    /// followed by xeno-canto. Both providers are queried with the resolved
    /// taxon, not the name as typed.
    ///
    /// Errors are not caught: if iNaturalist fails, xeno-canto does not run.
    /// Files written before the failure stay on disk.
    pub async fn process_species(&self, scientific_name: &str) -> Result<SpeciesReport> {
        let species = self.resolve(scientific_name).await?;
        let folder = self.output_folder(&species);

        tokio::fs::create_dir_all(&folder)
            .await
            .with_context(|| format!("Failed to create {}", folder.display()))?;
        tracing::info!(folder = %folder.display(), "Output folder ready");

        let mut report = SpeciesReport {
            species,
            folder,
            inaturalist: None,
            xeno_canto: None,
        };

        if self.config.providers.includes_inaturalist() {
            let source = ObservationSource::new(
                self.client.clone(),
                &self.config.inaturalist_url,
                &report.species.external_id,
                self.config.per_page,
            );
            report.inaturalist = Some(fetch_and_save(&source, &self.client, &report.folder).await?);
        }

        if self.config.providers.includes_xeno_canto() {
            let api_key = self
                .config
                .xeno_api_key
                .as_deref()
                .context("XENO_API_KEY is not set")?;
            let source = RecordingSource::new(
                self.client.clone(),
                &self.config.xeno_canto_url,
                &report.species.scientific_name,
                api_key,
            );
            report.xeno_canto = Some(fetch_and_save(&source, &self.client, &report.folder).await?);
        }

        Ok(report)
    }

    /// Process each species in order. The first error ends the batch.
    pub async fn run_batch<S: AsRef<str>>(&self, species: &[S]) -> Result<Vec<SpeciesReport>> {
        let mut reports = Vec::with_capacity(species.len());
        for (index, name) in species.iter().enumerate() {
            let name = name.as_ref();
            tracing::info!(species = %name, position = index + 1, total = species.len(), "Processing species");
            let report = self
                .process_species(name)
                .await
                .with_context(|| format!("Failed to process species '{name}'"))?;
            reports.push(report);
        }
        Ok(reports)
    }
}
