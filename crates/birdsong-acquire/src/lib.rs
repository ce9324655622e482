pub mod config;
pub mod http;
pub mod inaturalist;
pub mod pipeline;
pub mod source;
pub mod species_list;
pub mod xeno_canto;

pub use config::{FetchConfig, ProviderSelection};
pub use pipeline::{Pipeline, SpeciesReport};
pub use source::{fetch_and_save, FetchSummary, FetchedPage, PaginatedSource};
