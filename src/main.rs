mod cli;

use clap::Parser;
use cli::Cli;
use export_as_rs::{ExportAsService, ExportAsSettings, ExportConfig, ExportOutput, Page};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match cli.config {
        Some(path) => ExportAsSettings::load_from_sources(path)?,
        None => ExportAsSettings::load()?,
    };
    let service = ExportAsService::from_settings(Page::from_file(&cli.page)?, &settings);

    let mut config = ExportConfig::new(cli.export_type, cli.target);
    if let Some(options) = cli.options {
        config.options.values = serde_json::from_str(&options)?;
    }
    config.download = cli.download;
    config.file_name = cli.file_name;

    let output = match cli.save {
        Some(name) => service.save(config, &name).await?,
        None => service.get(config).await?,
    };

    match output {
        ExportOutput::Downloaded => {
            tracing::info!(dir = %settings.download_dir.display(), "Export downloaded")
        }
        ExportOutput::DataUrl(url) => println!("{url}"),
        ExportOutput::Rows(rows) => println!("{}", serde_json::to_string_pretty(&rows)?),
    }

    Ok(())
}
