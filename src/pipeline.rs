//! Batch orchestration: queue files, analyze them, confirm the renames.
//!
//! [`RenamePipeline`] owns the batch and runs the two user-visible
//! operations. `analyze_batch` extracts each pending file's content, asks the
//! active provider for template values, and records a proposed name per item.
//! `confirm_renames` then moves the selected ready items on disk. Both
//! operations isolate per-item failures: one bad file lands in `Error` with
//! its message while the rest of the batch proceeds.

use crate::batch::{Batch, FileItem, ItemEvent, ItemStatus, TokenUsage};
use crate::credentials::CredentialStore;
use crate::error::{ExtractError, PipelineError};
use crate::extract::{self, FileContent};
use crate::mover::{FileMover, FsMover};
use crate::provider::{build_provider, AnalysisProvider, ProviderKind};
use crate::settings::SettingsStore;
use crate::template::RenameTemplate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one `analyze_batch` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisReport {
    /// Items that reached `Ready` with a proposed name.
    pub analyzed: usize,
    /// Items that landed in `Error`.
    pub failed: usize,
    /// One `"name: reason"` line per failed item, in batch order.
    pub errors: Vec<String>,
    /// Tokens consumed by the successful analyses in this run.
    pub usage: TokenUsage,
}

/// Outcome of one `confirm_renames` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    /// Items moved to their proposed name.
    pub renamed: usize,
    /// Items whose move failed.
    pub failed: usize,
    /// One `"name: reason"` line per failed item, in batch order.
    pub errors: Vec<String>,
}

/// The batch renamer: a queue of files, a naming template, and the provider
/// selection, driven by `analyze_batch` and `confirm_renames`.
pub struct RenamePipeline {
    batch: Batch,
    template: RenameTemplate,
    provider_kind: ProviderKind,
    credentials: Arc<dyn CredentialStore>,
    settings: Arc<dyn SettingsStore>,
    mover: Arc<dyn FileMover>,
    provider_override: Option<Arc<dyn AnalysisProvider>>,
    error_text: Option<String>,
    total_usage: TokenUsage,
}

impl RenamePipeline {
    pub fn new(credentials: Arc<dyn CredentialStore>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            batch: Batch::new(),
            template: RenameTemplate::default(),
            provider_kind: ProviderKind::OpenAi,
            credentials,
            settings,
            mover: Arc::new(FsMover),
            provider_override: None,
            error_text: None,
            total_usage: TokenUsage::default(),
        }
    }

    /// Replace the filesystem seam; tests use this to fail moves.
    pub fn with_mover(mut self, mover: Arc<dyn FileMover>) -> Self {
        self.mover = mover;
        self
    }

    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    pub fn template(&self) -> &RenameTemplate {
        &self.template
    }

    pub fn set_template(&mut self, template: RenameTemplate) {
        self.template = template;
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider_kind
    }

    /// Select the provider for subsequent analyses. Drops any injected
    /// provider instance, since it belonged to the previous selection.
    pub fn set_provider_kind(&mut self, kind: ProviderKind) {
        self.provider_kind = kind;
        self.provider_override = None;
    }

    /// Inject a ready-made provider instead of building one from the stored
    /// credential and model settings.
    pub fn set_provider(&mut self, provider: Arc<dyn AnalysisProvider>) {
        self.provider_override = Some(provider);
    }

    /// Error lines from the most recent operation, newline-joined.
    pub fn error_text(&self) -> Option<&str> {
        self.error_text.as_deref()
    }

    /// Tokens consumed across every successful analysis since the last
    /// batch reset.
    pub fn total_usage(&self) -> TokenUsage {
        self.total_usage
    }

    /// Mutable access to one item, for selection toggles and hand-edits of
    /// the proposed name.
    pub fn item_mut(&mut self, index: usize) -> Option<&mut FileItem> {
        self.batch.get_mut(index)
    }

    /// Queue files for renaming, skipping paths already in the batch.
    /// Returns the number of items added.
    ///
    /// When every current item has already been renamed, the batch is a
    /// finished session: it is cleared, along with the error text and usage
    /// counter, before the new files are added.
    pub fn add_files<I, P>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if self.batch.all_renamed() {
            info!("[Pipeline] Previous batch complete, starting fresh");
            self.batch.clear();
            self.error_text = None;
            self.total_usage = TokenUsage::default();
        }

        let mut added = 0;
        for path in paths {
            if self.batch.push(FileItem::new(path.into())) {
                added += 1;
            }
        }
        added
    }

    pub fn remove_file(&mut self, index: usize) -> Option<FileItem> {
        self.batch.remove(index)
    }

    /// Drop every item along with the error text and usage counter.
    pub fn clear(&mut self) {
        self.batch.clear();
        self.error_text = None;
        self.total_usage = TokenUsage::default();
    }

    /// Send every errored item back to `Pending` for another analysis pass.
    /// Returns the number of items requeued.
    pub fn requeue_errored(&mut self) -> usize {
        let mut count = 0;
        for item in self.batch.iter_mut() {
            if matches!(item.status, ItemStatus::Error(_)) {
                item.apply(ItemEvent::Requeue);
                count += 1;
            }
        }
        count
    }

    /// Analyze every pending item sequentially, filling in proposed names.
    ///
    /// Fails up front, without touching any item, when no API key is
    /// configured for the selected provider. After that, per-item failures
    /// are recorded on the item and in the report while the remaining items
    /// still run.
    pub async fn analyze_batch(&mut self) -> Result<AnalysisReport, PipelineError> {
        let provider = self.active_provider()?;
        self.error_text = None;

        let template = self.template.clone();
        let mut report = AnalysisReport::default();

        for index in 0..self.batch.len() {
            let Some(item) = self.batch.get(index) else {
                continue;
            };
            if item.status != ItemStatus::Pending {
                continue;
            }
            let path = item.original_path().to_path_buf();
            let file_name = item.original_name.clone();
            let ext = item.file_extension();

            self.apply_event(index, ItemEvent::Start);
            info!("[Pipeline] Analyzing {}", file_name);

            match Self::analyze_item(provider.as_ref(), &template, &path, &file_name, &ext).await {
                Ok((proposed, usage)) => {
                    info!("[Pipeline] {} -> {}", file_name, proposed);
                    if let Some(item) = self.batch.get_mut(index) {
                        item.proposed_name = Some(proposed);
                        item.token_usage = Some(usage);
                        item.apply(ItemEvent::Analyzed);
                    }
                    self.total_usage.add(usage);
                    report.usage.add(usage);
                    report.analyzed += 1;
                }
                Err(message) => {
                    warn!("[Pipeline] Analysis failed for {}: {}", file_name, message);
                    report.errors.push(format!("{}: {}", file_name, message));
                    report.failed += 1;
                    self.apply_event(index, ItemEvent::Failed(message));
                }
            }
        }

        if !report.errors.is_empty() {
            self.error_text = Some(report.errors.join("\n"));
        }
        Ok(report)
    }

    /// Move every selected `Ready` item to its proposed name, next to the
    /// original file. Hand-edited proposed names are honored as-is.
    pub fn confirm_renames(&mut self) -> RenameReport {
        self.error_text = None;
        let mut report = RenameReport::default();

        for index in 0..self.batch.len() {
            let Some(item) = self.batch.get(index) else {
                continue;
            };
            if !item.is_selected || item.status != ItemStatus::Ready {
                continue;
            }
            let Some(proposed) = item.proposed_name.clone().filter(|name| !name.is_empty())
            else {
                continue;
            };
            let from = item.original_path().to_path_buf();
            let file_name = item.original_name.clone();
            let to = from
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
                .join(&proposed);

            match self.mover.rename(&from, &to) {
                Ok(()) => {
                    info!("[Pipeline] Renamed {} -> {}", file_name, proposed);
                    self.apply_event(index, ItemEvent::Moved);
                    report.renamed += 1;
                }
                Err(message) => {
                    warn!("[Pipeline] Rename failed for {}: {}", file_name, message);
                    report.errors.push(format!("{}: {}", file_name, message));
                    report.failed += 1;
                    self.apply_event(index, ItemEvent::Failed(message));
                }
            }
        }

        if !report.errors.is_empty() {
            self.error_text = Some(report.errors.join("\n"));
        }
        report
    }

    /// The provider to analyze with: the injected instance if one is set,
    /// otherwise one built from the stored credential and model settings.
    /// The credential check runs first either way.
    fn active_provider(&self) -> Result<Arc<dyn AnalysisProvider>, PipelineError> {
        let kind = self.provider_kind;
        let configured = self
            .credentials
            .load(kind.credential_key())
            .filter(|key| !key.is_empty())
            .is_some();
        if !configured {
            return Err(PipelineError::NoCredential {
                provider: kind.display_name(),
            });
        }
        if let Some(provider) = &self.provider_override {
            return Ok(Arc::clone(provider));
        }
        build_provider(kind, self.credentials.as_ref(), self.settings.as_ref())
            .map_err(|err| PipelineError::ProviderUnavailable(err.to_string()))
    }

    /// One item end to end: extract, analyze, render the template. The
    /// extension is injected by the pipeline so providers never have to
    /// guess it.
    async fn analyze_item(
        provider: &dyn AnalysisProvider,
        template: &RenameTemplate,
        path: &Path,
        file_name: &str,
        ext: &str,
    ) -> Result<(String, TokenUsage), String> {
        let content = Self::extract_content(path.to_path_buf())
            .await
            .map_err(|err| err.to_string())?;
        let mut result = provider
            .analyze(&content, template, file_name)
            .await
            .map_err(|err| err.to_string())?;
        result.values.insert("ext".to_string(), ext.to_string());
        Ok((template.apply(&result.values), result.usage))
    }

    /// Content extraction does blocking file and parser work, so it runs off
    /// the async executor.
    async fn extract_content(path: PathBuf) -> Result<FileContent, ExtractError> {
        tokio::task::spawn_blocking(move || extract::extract(&path))
            .await
            .map_err(|err| ExtractError::Interrupted(err.to_string()))?
    }

    fn apply_event(&mut self, index: usize, event: ItemEvent) {
        if let Some(item) = self.batch.get_mut(index) {
            item.apply(event);
        }
    }
}
