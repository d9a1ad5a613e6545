use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::Rgb;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::{JoinHandle, spawn_blocking};
use uuid::Uuid;

use crate::archive::cbz::ComicArchive;
use crate::archive::epub::EbookPackage;
use crate::archive::{ArchiveBuilder, remove_partial};
use crate::error::{Error, Result};
use crate::page::{DEFAULT_JPEG_QUALITY, WHITE, encode_page, normalize_image};
use crate::path_utils::{self, prepare_long_path, validate_base_name, validate_path};
use crate::progress::{EPUB_WRITE_PROGRESS, NoopSink, ProgressSink, Reporter, SharedSink};
use crate::types::{
    EbookMetadata, FileFormat, JobReport, JobState, PageFile, PageNaming, PageOutcome,
};
use crate::workspace::WorkDir;

/// Settings for one conversion job, built declaratively using the builder pattern.
///
/// Immutable once the job starts.
///
/// ```rust
/// # use pagebind::prelude::*;
/// let config = JobConfig::builder()
///     .target_path(PathBuf::from("./output"))
///     .file_name("My Comic")
///     .output_format(FileFormat::Cbz)
///     .build()
///     .expect("Invalid configuration");
///
/// assert_eq!(
///     config.output_path(),
///     PathBuf::from("./output/CBZ_Converted/My Comic.cbz")
/// );
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
pub struct JobConfig {
    /// Archive format to produce.
    #[builder(default = "FileFormat::Cbz")]
    pub output_format: FileFormat,

    /// Destination directory.
    pub target_path: PathBuf,

    /// Base name of the archive, without extension. Expected to be sanitized
    /// already (see [`path_utils::sanitize_base_name`]).
    pub file_name: String,

    /// Nest the archive under `CBZ_Converted/` or `EPUB_Converted/`.
    ///
    /// The subdirectory is created when missing. When `false`, `target_path`
    /// itself must already exist.
    #[builder(default = "true")]
    pub use_format_subdirectory: bool,

    /// JPEG quality for every page (1-100).
    #[builder(default = "DEFAULT_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Matte colour that transparent sources are composited onto.
    #[builder(default = "WHITE.0")]
    pub background: [u8; 3],

    /// Parent of the per-job working directory. Defaults to the system temp dir.
    #[builder(default)]
    pub work_root: Option<PathBuf>,

    /// E-book package metadata; ignored for CBZ.
    #[builder(default)]
    pub metadata: EbookMetadata,
}

impl JobConfig {
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder::default()
    }

    /// Validates the configuration against a concrete input list without
    /// touching the file system beyond existence checks.
    ///
    /// [`ConversionJob::new`] calls this, so manual invocation is optional.
    pub fn preflight_check(&self, inputs: &[PathBuf]) -> Result<&Self> {
        if inputs.is_empty() {
            return Err(Error::EmptyInput);
        }
        if self.target_path.as_os_str().is_empty() {
            return Err(Error::Other("Target path is required".to_string()));
        }
        validate_path(&self.target_path)?;
        validate_base_name(&self.file_name)?;
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Other(
                "JPEG quality must be between 1 and 100.".to_string(),
            ));
        }
        if !self.use_format_subdirectory && !self.target_path.is_dir() {
            return Err(Error::NotFound(format!(
                "Target directory does not exist: {:?}",
                self.target_path
            )));
        }
        Ok(self)
    }

    /// Directory the archive is written into.
    pub fn output_directory(&self) -> PathBuf {
        path_utils::output_directory(
            &self.target_path,
            self.output_format,
            self.use_format_subdirectory,
        )
    }

    /// `<target>[/<FORMAT>_Converted]/<name>.<ext>`
    pub fn output_path(&self) -> PathBuf {
        path_utils::output_path(
            &self.target_path,
            self.output_format,
            self.use_format_subdirectory,
            &self.file_name,
        )
    }

    /// Archive file name, e.g. `out.cbz`.
    pub fn archive_file_name(&self) -> String {
        format!("{}.{}", self.file_name, self.output_format.extension())
    }

    pub fn background_rgb(&self) -> Rgb<u8> {
        Rgb(self.background)
    }
}

impl JobConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(quality) = self.jpeg_quality {
            if !(1..=100).contains(&quality) {
                return Err("JPEG quality must be between 1 and 100.".to_string());
            }
        }
        if let Some(name) = &self.file_name {
            if let Err(e) = validate_base_name(name) {
                return Err(format!("Invalid file_name: {}", e));
            }
        }
        Ok(())
    }
}

/// Cooperative stop signal shared between a job and whoever started it.
///
/// The job polls it before each image and between archive entries; work
/// already in flight for the current image always finishes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters for the per-page outcomes of a run.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    written: usize,
    failed: usize,
}

/// One conversion of an ordered image list into a single archive.
///
/// Pages are processed strictly one at a time in input order. Per-image
/// failures are reported and skipped; directory and archive failures end
/// the job. Only one job should run per process at a time; each job still
/// gets its own working directory.
pub struct ConversionJob {
    id: Uuid,
    config: JobConfig,
    inputs: Vec<PathBuf>,
    sink: SharedSink,
    cancel: CancelToken,
    state: watch::Sender<JobState>,
}

impl ConversionJob {
    /// Creates an idle job. Refuses an empty input list or an invalid config.
    pub fn new(config: JobConfig, inputs: Vec<PathBuf>) -> Result<Self> {
        config.preflight_check(&inputs)?;
        let (state, _) = watch::channel(JobState::Idle);
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            inputs,
            sink: Arc::new(NoopSink),
            cancel: CancelToken::new(),
            state,
        })
    }

    /// Routes events to `sink` (usually the sender from [`crate::progress::event_channel`]).
    pub fn with_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Uses an existing token instead of the job's own.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    /// Runs the job in a background task and returns a handle to it.
    pub fn spawn(self) -> JobHandle {
        let id = self.id;
        let cancel = self.cancel.clone();
        let state = self.state.subscribe();
        JobHandle {
            id,
            cancel,
            state,
            task: Some(tokio::spawn(self.run())),
        }
    }

    /// Runs the job to a terminal state.
    ///
    /// Never returns an error: every failure is folded into the report,
    /// which is also delivered as the final [`ConversionEvent::Finished`](crate::progress::ConversionEvent::Finished).
    pub async fn run(self) -> JobReport {
        let ConversionJob {
            id,
            config,
            inputs,
            sink,
            cancel,
            state,
        } = self;

        state.send_replace(JobState::Running);
        let mut reporter = Reporter::new(sink, config.output_format);
        let work_dir = WorkDir::new(config.work_root.as_deref(), id);
        let mut tally = Tally::default();

        info!(
            "Job {} started: {} image(s) -> {:?}",
            id,
            inputs.len(),
            config.output_path()
        );

        let result = Self::execute(
            &config,
            &inputs,
            &work_dir,
            &cancel,
            &mut reporter,
            &mut tally,
        )
        .await;

        Self::release_work_dir(work_dir).await;

        let (final_state, output_path, message) = match result {
            Ok(path) => {
                info!(
                    "Job {} completed: {} page(s) written, {} failed",
                    id, tally.written, tally.failed
                );
                reporter.status("Conversion complete!");
                (JobState::Completed, Some(path), None)
            }
            Err(Error::Cancelled) => {
                info!("Job {} cancelled", id);
                reporter.status("Conversion cancelled");
                (JobState::Cancelled, None, Some(Error::Cancelled.to_string()))
            }
            Err(e) => {
                error!("Job {} failed: {}", id, e);
                reporter.status("Conversion failed!");
                (JobState::Failed, None, Some(e.to_string()))
            }
        };

        let report = JobReport {
            file_name: config.archive_file_name(),
            output_path,
            success: final_state == JobState::Completed,
            state: final_state,
            pages_written: tally.written,
            pages_failed: tally.failed,
            message,
        };

        state.send_replace(final_state);
        reporter.finished(report.clone());
        report
    }

    async fn execute(
        config: &JobConfig,
        inputs: &[PathBuf],
        work_dir: &WorkDir,
        cancel: &CancelToken,
        reporter: &mut Reporter,
        tally: &mut Tally,
    ) -> Result<PathBuf> {
        let format = config.output_format;
        let output_dir = config.output_directory();

        if !output_dir.exists() {
            if config.use_format_subdirectory {
                tokio::fs::create_dir_all(&output_dir)
                    .await
                    .map_err(|e| Error::structural("Cannot create output directory", e))?;
            } else {
                return Err(Error::Structural(format!(
                    "Target directory does not exist: {:?}",
                    output_dir
                )));
            }
        }
        let output_path = prepare_long_path(&output_dir)?.join(config.archive_file_name());

        reporter.status(format!("Creating {}: {}", format.label(), config.file_name));

        let naming = PageNaming::for_count(inputs.len());
        let pages_dir = work_dir.pages_dir();
        let total = inputs.len();

        for (i, source) in inputs.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let index = i + 1;

            match Self::process_image(config, source, index, naming, &pages_dir).await {
                Ok(page) => {
                    debug!("Wrote {:?} from {:?}", page.path, source);
                    tally.written += 1;
                    reporter.page(PageOutcome::converted(index, source.clone()));
                }
                Err(e) if e.is_page_level() => {
                    warn!("Skipping page {} ({:?}): {}", index, source, e);
                    tally.failed += 1;
                    reporter.page(PageOutcome::failed(index, source.clone(), e.to_string()));
                }
                Err(e) => return Err(e),
            }
            reporter.image_processed(index, total);
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let pages = work_dir
            .collect_page_files()
            .map_err(|e| Error::structural("Cannot list page files", e))?;
        let metadata = config.metadata.resolved(&config.file_name);

        let written = match format {
            FileFormat::Cbz => {
                Self::build_archive::<ComicArchive>(
                    format,
                    &output_path,
                    &pages,
                    &metadata,
                    cancel,
                    reporter,
                )
                .await?
            }
            FileFormat::Epub => {
                Self::build_archive::<EbookPackage>(
                    format,
                    &output_path,
                    &pages,
                    &metadata,
                    cancel,
                    reporter,
                )
                .await?
            }
        };

        reporter.progress(100);
        Ok(written)
    }

    /// Decodes, flattens and encodes one image on the blocking pool.
    async fn process_image(
        config: &JobConfig,
        source: &Path,
        index: usize,
        naming: PageNaming,
        pages_dir: &Path,
    ) -> Result<PageFile> {
        let source = source.to_path_buf();
        let pages_dir = pages_dir.to_path_buf();
        let background = config.background_rgb();
        let quality = config.jpeg_quality;

        spawn_blocking(move || {
            let page = normalize_image(&source, background)?;
            encode_page(&page, index, naming, &pages_dir, quality)
        })
        .await
        .map_err(|e| Error::Encode {
            page: index,
            message: format!("Image task failed: {}", e),
        })?
    }

    /// Writes `pages` into a new archive at `output_path`.
    ///
    /// A cancelled or failed build leaves no file behind.
    async fn build_archive<B>(
        format: FileFormat,
        output_path: &Path,
        pages: &[PageFile],
        metadata: &EbookMetadata,
        cancel: &CancelToken,
        reporter: &mut Reporter,
    ) -> Result<PathBuf>
    where
        B: ArchiveBuilder + Send,
    {
        reporter.status(format!("Building {} file...", format.label()));
        if format == FileFormat::Epub {
            reporter.progress(EPUB_WRITE_PROGRESS);
        }

        let mut builder = match B::new(output_path) {
            Ok(builder) => builder,
            Err(e) => {
                Self::remove_output(output_path);
                return Err(e);
            }
        };

        if let Err(e) = Self::fill_archive(&mut builder, pages, metadata, cancel).await {
            debug!(
                "Discarding partial archive after {} page(s)",
                builder.page_count()
            );
            if let Err(discard_err) = builder.discard() {
                warn!(
                    "Failed to remove partial archive {:?}: {}",
                    output_path, discard_err
                );
            }
            return Err(e);
        }

        match builder.save().await {
            Ok(path) => Ok(path),
            Err(e) => {
                Self::remove_output(output_path);
                Err(e)
            }
        }
    }

    async fn fill_archive<B>(
        builder: &mut B,
        pages: &[PageFile],
        metadata: &EbookMetadata,
        cancel: &CancelToken,
    ) -> Result<()>
    where
        B: ArchiveBuilder + Send,
    {
        builder.set_metadata(metadata).await?;
        for page in pages {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            builder.add_page(page).await?;
        }
        Ok(())
    }

    fn remove_output(output_path: &Path) {
        if let Err(e) = remove_partial(output_path) {
            warn!("Failed to remove partial archive {:?}: {}", output_path, e);
        }
    }

    /// Best-effort removal of the working directory; failures are only logged.
    async fn release_work_dir(work_dir: WorkDir) {
        let root = work_dir.path().to_path_buf();
        match spawn_blocking(move || work_dir.release()).await {
            Ok(Ok(())) => debug!("Removed working directory {:?}", root),
            Ok(Err(e)) => warn!("Failed to remove working directory {:?}: {}", root, e),
            Err(e) => warn!("Working directory cleanup task failed for {:?}: {}", root, e),
        }
    }
}

/// Handle to a job running in the background.
pub struct JobHandle {
    id: Uuid,
    cancel: CancelToken,
    state: watch::Receiver<JobState>,
    task: Option<JoinHandle<JobReport>>,
}

impl JobHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Requests a cooperative stop. The job finishes the image it is working
    /// on, skips the rest, and ends in [`JobState::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Waits until the job reaches a terminal state and returns it.
    pub async fn wait_for_terminal_state(&mut self) -> JobState {
        let reached = match self.state.wait_for(JobState::is_terminal).await {
            Ok(state) => Some(*state),
            Err(_) => None,
        };
        // Sender dropped: the job is gone, report what it last published
        reached.unwrap_or_else(|| *self.state.borrow())
    }

    /// Waits for the job and returns its report.
    pub async fn join(mut self) -> Result<JobReport> {
        match self.task.take() {
            Some(task) => Ok(task.await?),
            None => Err(Error::AsyncTaskError("Job task already joined".to_string())),
        }
    }
}
