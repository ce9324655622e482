use anyhow::Result;
use birdsong_acquire::config::{DEFAULT_INATURALIST_URL, DEFAULT_PER_PAGE, DEFAULT_XENO_CANTO_URL};
use birdsong_acquire::{http, inaturalist, species_list, FetchConfig, Pipeline, ProviderSelection};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Env files read before argument parsing, so their values can back `env = ...` flags.
const ENV_FILES: &[&str] = &["naturalist.env", ".env"];

#[derive(Parser)]
#[command(name = "birdsong")]
#[command(about = "Download bird recordings from iNaturalist and xeno-canto")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("BUILD_HASH"), ")"))]
struct Cli {
    /// Log level: error, warn, info, debug, trace
    #[arg(long, global = true, default_value = "info", value_enum)]
    log_level: LogLevel,

    /// Use UTC timestamps instead of local time
    #[arg(long, global = true)]
    utc: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve species and download their recordings
    Fetch {
        /// Scientific names (e.g., "Corvus orru"); defaults to the built-in list
        species: Vec<String>,

        /// File with one scientific name per line ("-" reads stdin)
        #[arg(short = 'f', long)]
        species_file: Option<String>,

        /// Providers to download from
        #[arg(short, long, value_enum, default_value = "all")]
        provider: ProviderArg,

        /// Directory under which one folder per species is created
        #[arg(short = 'O', long, env = "BASE_DIRECTORY")]
        output_dir: PathBuf,

        /// xeno-canto API key
        #[arg(long, env = "XENO_API_KEY", hide_env_values = true)]
        xeno_api_key: Option<String>,

        /// iNaturalist observations requested per page
        #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
        per_page: u32,

        #[arg(long, env = "INATURALIST_URL", default_value = DEFAULT_INATURALIST_URL)]
        inaturalist_url: String,

        #[arg(long, env = "XENO_CANTO_URL", default_value = DEFAULT_XENO_CANTO_URL)]
        xeno_canto_url: String,
    },

    /// Look up species without downloading anything
    Resolve {
        /// Scientific names to resolve
        #[arg(required = true)]
        species: Vec<String>,

        #[arg(long, env = "INATURALIST_URL", default_value = DEFAULT_INATURALIST_URL)]
        inaturalist_url: String,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ProviderArg {
    /// iNaturalist, then xeno-canto
    All,
    /// iNaturalist observations with sounds
    Inaturalist,
    /// xeno-canto recordings
    XenoCanto,
}

impl From<ProviderArg> for ProviderSelection {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::All => ProviderSelection::All,
            ProviderArg::Inaturalist => ProviderSelection::INaturalist,
            ProviderArg::XenoCanto => ProviderSelection::XenoCanto,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let loaded_env: Vec<PathBuf> = ENV_FILES
        .iter()
        .filter_map(|name| dotenvy::from_filename(name).ok())
        .collect();

    let cli = Cli::parse();

    // Map log level, keeping HTTP internals quiet at debug/trace
    let level = match cli.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn  => "warn",
        LogLevel::Info  => "info",
        LogLevel::Debug => "debug,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn",
        LogLevel::Trace => "trace,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Timestamp format: 2026-02-14 19:44:09.123 -08:00
    let time_format = "%Y-%m-%d %H:%M:%S%.3f %:z";

    if cli.utc {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::new(time_format.to_string()))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(time_format.to_string()))
            .init();
    }

    for path in &loaded_env {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    match cli.command {
        Commands::Fetch {
            species,
            species_file,
            provider,
            output_dir,
            xeno_api_key,
            per_page,
            inaturalist_url,
            xeno_canto_url,
        } => {
            let species = species_list::collect_species(&species, species_file.as_deref())?;

            let mut config = FetchConfig::new(output_dir);
            config.xeno_api_key = xeno_api_key;
            config.per_page = per_page;
            config.inaturalist_url = inaturalist_url;
            config.xeno_canto_url = xeno_canto_url;
            config.providers = provider.into();

            tracing::info!(
                species = species.len(),
                output_dir = %config.base_directory.display(),
                "Fetching recordings"
            );
            let pipeline = Pipeline::new(config)?;
            let reports = pipeline.run_batch(&species).await?;

            let downloaded: usize = reports
                .iter()
                .flat_map(|r| [r.inaturalist, r.xeno_canto])
                .flatten()
                .map(|s| s.downloaded)
                .sum();
            tracing::info!(species = reports.len(), downloaded, "Finished");
        }
        Commands::Resolve { species, inaturalist_url } => {
            let client = http::build_client()?;
            for name in &species {
                let resolved = inaturalist::resolve_species(&client, &inaturalist_url, name).await?;
                println!(
                    "{}\t{}\t{}\t{}",
                    resolved.external_id,
                    resolved.scientific_name,
                    resolved.common_name,
                    resolved.folder_name()
                );
            }
        }
    }

    Ok(())
}
