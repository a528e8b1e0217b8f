//! LLM-assisted batch file renaming.
//!
//! Queue files into a [`RenamePipeline`], let a vision-capable model read
//! each one, and rename them to a consistent pattern like
//! `{date}_{topic}.{ext}`. The pipeline extracts file content locally
//! (plain text, PDFs, spreadsheets, Word documents, images), sends it to the
//! selected provider, and fills the template from the values the model
//! returns. Nothing touches the disk until `confirm_renames`, and every
//! proposed name can be reviewed, edited, or deselected first.
//!
//! ```no_run
//! use autorename::{MemoryCredentials, MemorySettings, RenamePipeline};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), autorename::PipelineError> {
//! let credentials = MemoryCredentials::new().with("openai_api_key", "sk-...");
//! let mut pipeline = RenamePipeline::new(Arc::new(credentials), Arc::new(MemorySettings::new()));
//!
//! pipeline.add_files(["/tmp/scan001.pdf", "/tmp/IMG_4521.heic"]);
//! let analysis = pipeline.analyze_batch().await?;
//! println!("{} proposed, {} failed", analysis.analyzed, analysis.failed);
//!
//! let renames = pipeline.confirm_renames();
//! println!("{} renamed", renames.renamed);
//! # Ok(())
//! # }
//! ```
//!
//! Files are analyzed one at a time, in batch order. A failure on one item
//! parks it in an error state with its message and the rest of the batch
//! continues.

pub mod batch;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod mover;
pub mod pipeline;
pub mod provider;
pub mod settings;
pub mod template;

pub use batch::{Batch, FileItem, ItemEvent, ItemStatus, TokenUsage};
pub use credentials::{
    CredentialStore, EnvCredentials, KeyringCredentials, MemoryCredentials, StandardCredentials,
};
pub use error::{ExtractError, PipelineError, ProviderError};
pub use extract::FileContent;
pub use mover::{FileMover, FsMover};
pub use pipeline::{AnalysisReport, RenamePipeline, RenameReport};
pub use provider::{
    build_provider, AnalysisProvider, AnalysisResult, AnthropicProvider, OpenAiProvider,
    ProviderKind,
};
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore};
pub use template::{RenameTemplate, DEFAULT_TEMPLATE};
