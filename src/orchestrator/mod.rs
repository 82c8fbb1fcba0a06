//! Six-stage pipeline coordinator: Detect -> Validate & Plan -> Transcribe
//! -> Analyze -> Verify & Archive -> Cleanup (spec §2, §5, §6).

use crate::analyzer::llm::LlmClient;
use crate::analyzer::{Analyzer, AnalyzerConfig};
use crate::archive::{Archiver, Cleaner};
use crate::core::config::Config;
use crate::core::error::TranscriptionError;
use crate::core::types::{
    AnalysisRecord, AudioSource, CatalogMetadata, FailedEntry, ProjectCatalog, Session, StageSummary,
};
use crate::detect::{FileValidator, UsbDetector};
use crate::resolver::{resolve_catalog, CatalogStore};
use crate::retry::RetryPolicy;
use crate::staging::StagingManager;
use crate::store::{DocumentStoreClient, StoreConfig, StoreWriter};
use crate::transcription::{BatchPlanner, CloudBackend, DuplicateChecker, LocalBackend, TranscriptionBackend, TranscriptionService};
use crate::verify::Verifier;
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// CLI-level controls that modulate a run without changing the stage logic
/// itself (spec §6 "CLI surface").
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub skip_steps: HashSet<String>,
    pub auto_continue: bool,
}

impl RunOptions {
    fn skips(&self, step: &str) -> bool {
        self.skip_steps.contains(step)
    }
}

/// Per-stage result counts for the end-of-run summary (spec §7).
#[derive(Debug, Default)]
pub struct RunReport {
    pub detect: StageSummary,
    pub transcribe: StageSummary,
    pub analyze: StageSummary,
    pub commit: StageSummary,
    pub session: Option<Session>,
}

pub struct Orchestrator<C: DocumentStoreClient + Clone> {
    config: Config,
    state_path: std::path::PathBuf,
    catalog_store: CatalogStore,
    staging: StagingManager,
    transcription: TranscriptionService,
    dedup: DuplicateChecker,
    analyzer: Analyzer,
    store_writer: StoreWriter<C>,
    verifier: Verifier<C>,
    archiver: Archiver,
    cleaner: Cleaner,
    archive_root: std::path::PathBuf,
}

impl<C: DocumentStoreClient + Clone> Orchestrator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        state_path: std::path::PathBuf,
        archive_root: std::path::PathBuf,
        store_client: C,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let staging = StagingManager::new(config.staging.staging_dir.clone());
        let transcripts_dir = config.staging.staging_dir.join("transcripts");

        let backends = build_backends(&config);
        let transcription = TranscriptionService::new(
            backends,
            config.transcription.worker_pool_size,
            config.transcription.cpu_ceiling_percent,
            std::time::Duration::from_secs(config.transcription.cpu_backoff_secs),
            config.transcription.retry_skip_patterns.clone(),
            config.transcription.min_transcript_words,
            config.transcription.min_transcript_bytes,
        );

        let dedup = DuplicateChecker::new(transcripts_dir.clone(), config.transcription.dedup_max_age_secs);

        let icon_selector = crate::analyzer::enrich::IconSelector::new(Vec::<(String, String)>::new(), "\u{2049}\u{FE0F}");
        let analyzer = Analyzer::new(
            crate::parser::CategoryDetector::new(crate::parser::CategoryKeywords {
                task_keywords: config.category_detection.task_keywords.clone(),
                note_keywords: config.category_detection.note_keywords.clone(),
                task_imperative_verbs: config.category_detection.task_imperative_verbs.clone(),
                note_indicators: config.category_detection.note_indicators.clone(),
                task_intent_patterns: config.category_detection.task_intent_patterns.clone(),
                calendar_keywords: config.category_detection.calendar_keywords.clone(),
            }),
            llm,
            icon_selector,
            AnalyzerConfig {
                preservation_threshold: config.content_length.long_threshold,
                task_excerpt_words: config.content_length.task_excerpt_words,
                note_excerpt_words: config.content_length.note_excerpt_words,
            },
        );

        let retry_policy = RetryPolicy::new(
            config.store.max_attempts,
            std::time::Duration::from_secs_f64(config.store.base_delay_secs),
        );
        let store_writer = StoreWriter::new(
            store_client.clone(),
            retry_policy.clone(),
            StoreConfig {
                tasks_database_id: config.store.tasks_database_id.clone(),
                notes_database_id: config.store.notes_database_id.clone(),
                chunk_chars: config.store.chunk_chars,
            },
        );
        let verifier = Verifier::new(
            store_client,
            retry_policy,
            std::time::Duration::from_secs(config.store.verify_timeout_secs),
        );

        let archiver = Archiver::new(archive_root.clone());
        let cleaner = Cleaner::new(StagingManager::new(config.staging.staging_dir.clone()), transcripts_dir);

        let catalog_store = CatalogStore::new(config.project_matching.catalog_path.clone(), config.project_matching.max_age_minutes);

        Self {
            config,
            state_path,
            catalog_store,
            staging,
            transcription,
            dedup,
            analyzer,
            store_writer,
            verifier,
            archiver,
            cleaner,
            archive_root,
        }
    }

    /// Run the full six-stage pipeline once, honoring `options`. Returns a
    /// summary report even on partial failure — only a mount-unreadable or
    /// config error aborts the whole run (spec §5, §7).
    pub async fn run(&mut self, options: &RunOptions) -> RunReport {
        let now = Utc::now();
        let state_store = crate::state::StateStore::new(&self.state_path);
        let mut state = state_store.load();
        let mut session = Session::new(now);
        let retention_days = self.config.retention.retention_days as i64;
        session.archive_plan = Some(self.archiver.plan(&session.id, now, retention_days));

        let mut report = RunReport::default();

        // Stage 1: Detect
        if options.skips("detect") {
            info!("skip-steps: detect");
        } else {
            let detector = UsbDetector::new(&self.config.detection.mount_path);
            let state_ref = &state;
            match detector.scan(&|name| state_ref.is_already_processed(name, now)) {
                Ok(candidates) => {
                    report.detect.total = candidates.len();
                    let validator = FileValidator::new(
                        self.config.detection.skip_threshold_seconds,
                        self.config.detection.max_file_minutes,
                    );
                    let (valid, skipped) = validator.validate_all(&candidates);
                    report.detect.successful = valid.len();
                    report.detect.skipped = skipped.len();

                    if options.dry_run {
                        info!(count = valid.len(), "dry run: would stage and transcribe these files");
                    } else {
                        self.run_stages_2_through_6(valid, &mut session, &mut report, options).await;
                    }
                }
                Err(err) => {
                    error!(%err, "detection stage failed, aborting run");
                    report.session = Some(session);
                    return report;
                }
            }
        }

        if !options.dry_run {
            state.current_session = Some(session.clone());
            state.finalize_current_session(now);
            if let Err(err) = state_store.save(&state) {
                warn!(%err, "failed to persist pipeline state");
            }
        }

        report.session = Some(session);
        report
    }

    async fn run_stages_2_through_6(
        &mut self,
        valid: Vec<AudioSource>,
        session: &mut Session,
        report: &mut RunReport,
        options: &RunOptions,
    ) {
        // Stage 2: copy each validated source off removable media before any
        // further work touches it (spec §4.3). Staged audio path is tracked
        // by stem so Stage 5's archiver can find it later without guessing
        // at the original extension casing, and the source's original
        // recorder-mount path is tracked separately so Stage 6 deletes the
        // actual recorder file instead of the local staging copy.
        let mut staged_audio: std::collections::HashMap<String, PathBuf> = std::collections::HashMap::new();
        let mut original_audio: std::collections::HashMap<String, PathBuf> = std::collections::HashMap::new();
        let mut staged = Vec::with_capacity(valid.len());
        for mut source in valid {
            let original_path = PathBuf::from(&source.path);
            match self.staging.stage(Path::new(&source.path)) {
                Ok(staged_path) => {
                    staged_audio.insert(source.stem(), staged_path.clone());
                    original_audio.insert(source.stem(), original_path);
                    source.path = staged_path.to_string_lossy().to_string();
                    staged.push(source);
                }
                Err(err) => {
                    warn!(%err, file = %source.path, "staging failed, skipping file");
                    report.detect.failed += 1;
                    session.failed_entries.push(FailedEntry::new(source.path.clone(), err.to_string()));
                }
            }
        }

        let planner = BatchPlanner::new(
            self.config.transcription.work_budget_minutes,
            self.config.transcription.hard_max_files,
            self.config.transcription.soft_min_files,
        );
        let batches = planner.plan(staged);

        let catalog = self.load_catalog();

        for batch in batches {
            if options.skips("transcribe") {
                info!("skip-steps: transcribe");
                break;
            }

            report.transcribe.total += batch.len();
            session.recordings_processed.extend(batch.iter().map(|s| {
                std::path::Path::new(&s.path).file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
            }));

            // Stage 3: Transcribe (with stem-based dedup reuse)
            let mut transcripts = Vec::new();
            let mut needs_transcription = Vec::new();
            for source in batch {
                if let Some(text) = self.dedup.existing_transcript(&source.stem()) {
                    info!(stem = source.stem(), "reusing existing transcript");
                    transcripts.push(crate::core::types::Transcript::new(source.stem(), text, self.dedup.transcript_path(&source.stem()).to_string_lossy().to_string()));
                } else {
                    needs_transcription.push(source);
                }
            }

            let outcomes = self.transcription.run_batch(needs_transcription).await;
            for outcome in outcomes {
                match outcome.result {
                    Ok(transcript) => {
                        if let Err(err) = self.transcription.validate_transcript(&transcript) {
                            self.record_transcription_failure(session, report, &outcome.source, err);
                        } else {
                            session.transcripts_created.push(transcript.path.clone());
                            transcripts.push(transcript);
                            report.transcribe.successful += 1;
                        }
                    }
                    Err(err) => self.record_transcription_failure(session, report, &outcome.source, err),
                }
            }

            if options.skips("analyze") {
                info!("skip-steps: analyze");
                continue;
            }

            // Stage 4: Analyze
            for transcript in transcripts {
                report.analyze.total += 1;
                let mut records = self.analyzer.analyze(&transcript, &catalog).await;

                if options.skips("commit") {
                    info!("skip-steps: commit");
                    continue;
                }

                // Stage 5: Verify & Archive
                let mut all_committed = true;
                for record in &mut records {
                    report.commit.total += 1;
                    match self.store_writer.commit(record).await {
                        Ok(page_id) => {
                            session.notion_success.push(page_id.clone());
                            if let Err(err) = self.verifier.verify(&page_id).await {
                                warn!(%err, %page_id, "verification failed, will not archive source");
                                all_committed = false;
                                session.cleanup_failures.push(FailedEntry::new(page_id, err.to_string()));
                            } else {
                                report.commit.successful += 1;
                            }
                        }
                        Err(err) => {
                            warn!(%err, "store commit failed");
                            all_committed = false;
                            report.commit.failed += 1;
                            session.ai_processing_failed.push(FailedEntry::new(transcript.audio_stem.clone(), err.to_string()));
                        }
                    }
                }
                report.analyze.successful += 1;

                if all_committed && !options.skips("archive") {
                    if let (Some(staged_path), Some(original_path)) =
                        (staged_audio.get(&transcript.audio_stem), original_audio.get(&transcript.audio_stem))
                    {
                        self.archive_and_cleanup(session, &transcript, staged_path, original_path);
                    }
                }
            }
        }

        session.cleanup_ready = true;
        if !options.skips("cleanup") {
            self.cleaner.wipe_staging();
            let purged = self.cleaner.purge_expired_archives(&self.archive_root, Utc::now(), self.config.retention.retention_days as i64);
            if !purged.is_empty() {
                info!(count = purged.len(), "purged expired archive folders");
            }
        }
    }

    fn record_transcription_failure(&self, session: &mut Session, report: &mut RunReport, source: &AudioSource, err: TranscriptionError) {
        warn!(file = %source.path, %err, "transcription failed");
        report.transcribe.failed += 1;
        session.failed_transcriptions.push(source.path.clone());
        session.failed_entries.push(FailedEntry::new(source.path.clone(), err.to_string()));
    }

    /// Archives the staged (locally-readable) copy, then deletes the
    /// original recording from the recorder at `original_path` — archiving
    /// never reads back from removable media, but deletion always targets
    /// the recorder so Stage 6 actually frees space there (spec §4.9).
    fn archive_and_cleanup(
        &self,
        session: &mut Session,
        transcript: &crate::core::types::Transcript,
        staged_path: &Path,
        original_path: &Path,
    ) {
        let Some(plan) = &session.archive_plan else { return };
        if !staged_path.exists() {
            return;
        }
        match self.archiver.archive_file(staged_path, &transcript.audio_stem, &session.id, plan) {
            Ok(destination) => {
                session.archived_recordings.push(destination.to_string_lossy().to_string());
                let outcome = self.cleaner.cleanup_one(original_path, &transcript.audio_stem);
                session.cleanup_failures.extend(outcome.failures);
            }
            Err(err) => {
                warn!(%err, stem = transcript.audio_stem, "archival failed, leaving source in place");
                session.cleanup_failures.push(FailedEntry::new(transcript.audio_stem.clone(), err.to_string()));
            }
        }
    }

    fn load_catalog(&self) -> ProjectCatalog {
        let cached = self.catalog_store.load();
        if !self.catalog_store.needs_refresh(&cached, Utc::now()) {
            return cached;
        }
        // No live catalog source is wired in yet; fall through to the
        // stale-cache / hard-coded fallback chain (spec §4.6).
        let (catalog, source) = resolve_catalog(cached, || Err::<ProjectCatalog, _>("no catalog refresher configured"));
        let mut catalog = catalog;
        catalog.metadata = CatalogMetadata {
            last_fetch: Some(Utc::now()),
            source: format!("{source:?}"),
            total: catalog.projects.len(),
            ..catalog.metadata
        };
        if let Err(err) = self.catalog_store.save(&catalog) {
            warn!(%err, "failed to persist project catalog cache");
        }
        catalog
    }
}

fn build_backends(config: &Config) -> Vec<Arc<dyn TranscriptionBackend>> {
    let mut backends: Vec<Arc<dyn TranscriptionBackend>> = Vec::new();
    let mode = config.transcription.backend_mode.as_str();

    if mode == "cloud" || mode == "auto" {
        backends.push(Arc::new(CloudBackend::new(
            config.openai.base_url.clone(),
            std::env::var("GROQ_API_KEY").ok(),
            "whisper-1",
            std::time::Duration::from_secs(config.transcription.cloud_timeout_secs),
        )));
    }
    if mode == "local" || mode == "auto" {
        backends.push(Arc::new(LocalBackend::new(
            "whisper",
            config.transcription.local_model.clone(),
            config.transcription.local_language.clone(),
            config.staging.staging_dir.join("transcripts"),
        )));
    }
    backends
}
