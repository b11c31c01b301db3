//! vtp-review - command-line driver for the review and pipeline engine
//!
//! Runs pipeline stages with live progress, triages a segment page and
//! manages the persisted job for a source URL.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::StreamExt;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vtp_common::config::{load_config, read_toml_config, resolve_config_path, ViewPreferencesStore};
use vtp_common::events::{EventBus, StageId, VtpEvent};
use vtp_common::human_time::format_span;
use vtp_review::backend::BackendClient;
use vtp_review::jobs::EnterOutcome;
use vtp_review::pipeline::{PipelineOrchestrator, StageOutcome, StageRequest};
use vtp_review::review::ReviewSession;
use vtp_review::triage::{SanitizeMode, SanitizeProfile, SanitizeSettings};

const EVENT_BUS_CAPACITY: usize = 1024;

/// Command-line arguments for vtp-review
#[derive(Parser, Debug)]
#[command(name = "vtp-review")]
#[command(about = "Review and pipeline orchestration for the voice training pipeline")]
#[command(version)]
struct Args {
    /// Config file (overrides VTP_CONFIG and the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long, global = true, env = "VTP_BACKEND_URL")]
    backend_url: Option<String>,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(long, global = true, env = "VTP_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one pipeline stage
    Run {
        #[arg(long)]
        url: String,

        /// Stage: audio|sanitize|srt|train|tts or extract|transcribe|build-dataset|synthesize
        #[arg(long, value_parser = parse_stage)]
        stage: StageId,

        /// Sanitize profile
        #[arg(long, value_enum, default_value_t = ProfileArg::Balanced)]
        profile: ProfileArg,

        /// Sanitize strictness override (0-1)
        #[arg(long)]
        strictness: Option<f64>,

        /// Sanitize voice detection mode
        #[arg(long)]
        voice: bool,

        /// Run vocal separation before sanitizing
        #[arg(long)]
        extract_vocals: bool,

        /// Re-extract audio even if it exists
        #[arg(long)]
        force: bool,

        /// Text to synthesize
        #[arg(long)]
        text: Option<String>,

        #[arg(long)]
        streamer: Option<String>,

        /// How to resolve an existing job for the URL
        #[arg(long, value_enum)]
        resume: Option<ResumeArg>,
    },

    /// Load and triage a page of segments
    Review {
        #[arg(long)]
        url: String,

        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Page size (defaults to the configured one)
        #[arg(long)]
        limit: Option<usize>,

        /// Start from previously saved decisions
        #[arg(long)]
        restore: bool,

        /// Reject pending segments under the configured floors
        #[arg(long)]
        auto_reject: bool,

        /// Persist decisions afterwards
        #[arg(long)]
        save: bool,
    },

    /// Show the persisted job and stage statuses for a URL
    Job {
        #[arg(long)]
        url: String,

        /// Purge the job and recreate it empty
        #[arg(long)]
        start_over: bool,
    },

    /// Show or change persisted view preferences
    Prefs {
        #[arg(long)]
        perf_mode: Option<bool>,

        #[arg(long)]
        compact: Option<bool>,

        #[arg(long)]
        show_timeline: Option<bool>,

        #[arg(long)]
        show_trays: Option<bool>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Strict,
    Balanced,
    Lenient,
    Rapid,
    Performance,
}

impl From<ProfileArg> for SanitizeProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Strict => SanitizeProfile::Strict,
            ProfileArg::Balanced => SanitizeProfile::Balanced,
            ProfileArg::Lenient => SanitizeProfile::Lenient,
            ProfileArg::Rapid => SanitizeProfile::Rapid,
            ProfileArg::Performance => SanitizeProfile::Performance,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ResumeArg {
    Continue,
    StartOver,
}

fn parse_stage(value: &str) -> std::result::Result<StageId, String> {
    StageId::from_key(value)
        .or_else(|| StageId::ALL.into_iter().find(|s| s.to_string() == value))
        .ok_or_else(|| format!("unknown stage '{}'", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let location = resolve_config_path(args.config.as_deref());
    let configured_level = location
        .as_ref()
        .and_then(|l| read_toml_config(&l.path).ok())
        .map(|c| c.logging.level);
    let level = args
        .log_level
        .clone()
        .or(configured_level)
        .unwrap_or_else(|| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vtp_review={level},vtp_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = load_config(location.as_ref());
    if let Some(url) = &args.backend_url {
        config.backend.base_url = url.clone();
    }
    if let Some(location) = &location {
        info!(path = %location.path.display(), source = ?location.source, "Config resolved");
    }
    info!(api = %config.backend.api_base(), "Using backend");

    let client = Arc::new(BackendClient::new(&config.backend).context("Failed to build backend client")?);
    let events = EventBus::new(EVENT_BUS_CAPACITY);

    match args.command {
        Command::Run {
            url,
            stage,
            profile,
            strictness,
            voice,
            extract_vocals,
            force,
            text,
            streamer,
            resume,
        } => {
            let mut settings = SanitizeSettings::from_profile(profile.into());
            if let Some(strictness) = strictness {
                settings = settings.with_strictness(strictness);
            }
            if voice {
                settings.mode = SanitizeMode::Voice;
            }
            settings.extract_vocals = extract_vocals;

            let mut request = StageRequest::new(stage, url).with_sanitize(settings);
            if let Some(text) = text {
                request = request.with_text(text);
            }
            if let Some(streamer) = streamer {
                request = request.with_streamer(streamer);
            }
            if force {
                request = request.forced();
            }
            run_stage(client, events, request, resume).await
        }
        Command::Review {
            url,
            offset,
            limit,
            restore,
            auto_reject,
            save,
        } => {
            let prefs = ViewPreferencesStore::load(location.as_ref());
            let mut session = ReviewSession::new(url, &config.review, prefs, events);
            let limit = limit.unwrap_or(config.review.page_size);

            if !session.load_page(client.as_ref(), offset, limit).await {
                bail!(
                    "Failed to load segments: {}",
                    session.status().error.clone().unwrap_or_default()
                );
            }
            if restore && session.restore_saved(client.as_ref()).await {
                info!("Restored saved decisions");
            }
            if auto_reject {
                let rejected = session.auto_reject();
                println!("auto-rejected {} segment(s): {:?}", rejected.len(), rejected);
            }

            let pending = session.pending_view().to_vec();
            for index in pending.iter().take(20) {
                if let Some(segment) = session.catalog().get(*index) {
                    println!(
                        "  #{:<5} {:<22} snr={:>5.1} speech={:.2}",
                        segment.index,
                        format_span(segment.start, segment.end),
                        segment.snr_or_default(),
                        segment.speech_or_default(),
                    );
                }
            }
            if pending.len() > 20 {
                println!("  ... {} more pending", pending.len() - 20);
            }

            let summary = session.summary();
            println!(
                "total={} accepted={} rejected={} remaining={} reviewed={}%",
                summary.total, summary.accepted, summary.rejected, summary.remaining, summary.percent_reviewed
            );
            if let Some(notice) = &session.status().notice {
                println!("note: {}", notice);
            }
            if let Some(suggestion) = session.suggestion(&SanitizeSettings::default()) {
                println!("suggestion: {}", suggestion.message);
            }

            if save && !session.save(client.as_ref()).await {
                bail!(
                    "Failed to save review: {}",
                    session.status().error.clone().unwrap_or_default()
                );
            }
            Ok(())
        }
        Command::Job { url, start_over } => {
            let orchestrator = PipelineOrchestrator::new(client.clone(), client, events);
            match orchestrator.enter(&url).await.context("Job lookup failed")? {
                EnterOutcome::Fresh => println!("no job for {}", url),
                EnterOutcome::Resumed { job_id } => println!("job {}", job_id),
                EnterOutcome::ConflictPending { job_id } => {
                    if start_over {
                        let job = orchestrator.start_over().await.context("Start over failed")?;
                        println!("job {} purged; new job {}", job_id, job.id);
                    } else {
                        orchestrator.continue_job().await?;
                        println!("job {}", job_id);
                    }
                }
            }
            for state in orchestrator.snapshot().await {
                println!(
                    "  {:<14} {:<8} {}",
                    state.stage.to_string(),
                    state.status.to_string(),
                    state.output_path.as_deref().unwrap_or("")
                );
            }
            println!("overall {}%", orchestrator.overall_progress().await);
            Ok(())
        }
        Command::Prefs {
            perf_mode,
            compact,
            show_timeline,
            show_trays,
        } => {
            let mut store = ViewPreferencesStore::load(location.as_ref());
            let changed = store.update(|prefs| {
                if let Some(v) = perf_mode {
                    prefs.perf_mode = v;
                }
                if let Some(v) = compact {
                    prefs.compact = v;
                }
                if let Some(v) = show_timeline {
                    prefs.show_timeline = v;
                }
                if let Some(v) = show_trays {
                    prefs.show_trays = v;
                }
            });
            if changed {
                info!("View preferences updated");
            }
            println!("{:#?}", store.get());
            Ok(())
        }
    }
}

async fn run_stage(
    client: Arc<BackendClient>,
    events: EventBus,
    request: StageRequest,
    resume: Option<ResumeArg>,
) -> Result<()> {
    let stage = request.stage;
    let printer = tokio::spawn(print_events(events.clone()));
    let orchestrator = Arc::new(PipelineOrchestrator::new(client.clone(), client, events));

    if let EnterOutcome::ConflictPending { job_id } = orchestrator.enter(&request.vod_url).await? {
        match resume {
            Some(ResumeArg::Continue) => {
                orchestrator.continue_job().await?;
            }
            Some(ResumeArg::StartOver) => {
                orchestrator.start_over().await?;
            }
            None => bail!(
                "Job {} already exists for this URL; pass --resume continue or --resume start-over",
                job_id
            ),
        }
    }

    let cancel_target = Arc::clone(&orchestrator);
    let ctrl_c = tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            if let Err(e) = cancel_target.cancel(stage).await {
                warn!(error = %e, "Cancel failed");
            }
        }
    });

    let outcome = orchestrator.run_stage(&request).await;
    ctrl_c.abort();
    printer.abort();

    match outcome.context("Stage run failed")? {
        StageOutcome::Completed { output_path } => {
            println!("{} done: {}", stage, output_path.unwrap_or_default());
            Ok(())
        }
        StageOutcome::Failed { message, suggestion } => {
            if let Some(suggestion) = suggestion {
                println!("suggestion: {}", suggestion.message);
            }
            bail!("{} failed: {}", stage, message)
        }
        StageOutcome::Canceled => {
            println!("{} canceled", stage);
            Ok(())
        }
    }
}

async fn print_events(events: EventBus) {
    let stream = events.stream();
    tokio::pin!(stream);
    while let Some(event) = stream.next().await {
        match event {
            VtpEvent::StageLog { stage, line, .. } => println!("[{}] {}", stage, line),
            VtpEvent::StageProgress { stage, percent, .. } => println!("[{}] {}%", stage, percent),
            VtpEvent::StageStatusChanged {
                stage,
                new_status,
                message,
                ..
            } => match message {
                Some(message) => println!("[{}] {}: {}", stage, new_status, message),
                None => println!("[{}] {}", stage, new_status),
            },
            VtpEvent::Notice { message, .. } => println!("note: {}", message),
            _ => {}
        }
    }
}
