//! Export elements of an HTML page (usually tables) as PDF, PNG, XLSX, DOCX,
//! CSV, TXT, JSON or XML, either as data URLs or as downloaded files.

pub mod codec;
pub mod dom;
pub mod download;
pub mod error;
pub mod export_as_service;
pub mod export_config;
pub mod exporter;
pub mod render;
pub mod settings;

pub use codec::Blob;
pub use dom::Page;
pub use download::{Downloader, SaveBlob};
pub use error::ExportError;
pub use export_as_service::{ExportAsService, ExportOutput, ExportType, Handler};
pub use export_config::{ExportConfig, ExportOptions, JsonRow, PdfCallback};
pub use settings::ExportAsSettings;
