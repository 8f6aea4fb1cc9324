use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "export-as")]
#[command(about = "Export an element of an HTML page to another format", long_about = None)]
pub struct Cli {
    /// HTML page holding the element
    #[arg(long)]
    pub page: PathBuf,

    /// Output type: pdf, png, csv, txt, xls, xlsx, docx, doc, json or xml
    #[arg(long = "type", short = 't')]
    pub export_type: String,

    /// Id of the element to export, or literal content for pdf
    #[arg(long)]
    pub target: String,

    /// Converter options as a JSON object
    #[arg(long)]
    pub options: Option<String>,

    /// Save as `<NAME>.<type>` in the download directory
    #[arg(long, value_name = "NAME", conflicts_with_all = ["download", "file_name"])]
    pub save: Option<String>,

    /// Download instead of printing the encoded result
    #[arg(long)]
    pub download: bool,

    /// File name used with --download
    #[arg(long, requires = "download")]
    pub file_name: Option<String>,

    /// Settings file (defaults to EXPORT_AS_CONFIG or export-as.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,
}
