use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use formfill_core::{format_duration, format_file_size, JobError, JobId, UploadLimits};
use formfill_engine::{
    ensure_dir, read_upload, sniff_pdf_signature, ApiSettings, ChannelPollSink, ClientError,
    HistoryStore, JobApi, PollEngine, PollEvent, ReqwestJobApi, SettingsStore,
};
use formfill_logging::{ff_info, ff_warn};
use tokio::sync::mpsc;

use crate::cli::{Cli, Commands, HistoryAction, SettingsAction, SubmitOptions};
use crate::render;

pub async fn run(cli: Cli) -> Result<()> {
    let state_dir = match cli.state_dir {
        Some(dir) => dir,
        None => default_state_dir()?,
    };
    ensure_dir(&state_dir)
        .with_context(|| format!("cannot use state directory {}", state_dir.display()))?;
    ff_info!("Using state directory {:?}", state_dir);

    let app = App::load(&state_dir)?;
    match cli.command {
        Commands::Submit {
            file,
            options,
            max_upload_mb,
            no_watch,
        } => {
            let limits = UploadLimits::from_megabytes(max_upload_mb);
            app.submit(&file, &options, &limits, no_watch).await
        }
        Commands::Watch { job_ids } => app.watch(job_ids).await,
        Commands::Status { job_id } => app.status(&job_id).await,
        Commands::Download { job_id, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{job_id}.pdf")));
            app.download(&job_id, &output).await
        }
        Commands::History { action } => app.history(action.unwrap_or(HistoryAction::List)),
        Commands::Settings { action } => app.settings(action.unwrap_or(SettingsAction::Show)),
    }
}

fn default_state_dir() -> Result<PathBuf> {
    ProjectDirs::from("org", "formfill", "formfill")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .context("no home directory found; pass --state-dir")
}

struct App {
    settings: SettingsStore,
    history: HistoryStore,
    api: Arc<ReqwestJobApi>,
}

impl App {
    fn load(state_dir: &Path) -> Result<Self> {
        let settings = SettingsStore::load(state_dir);
        let history = HistoryStore::load(state_dir);
        let api = ReqwestJobApi::new(ApiSettings::default(), settings.clone())
            .context("failed to build HTTP client")?;
        Ok(Self {
            settings,
            history,
            api: Arc::new(api),
        })
    }

    async fn submit(
        &self,
        file: &Path,
        options: &SubmitOptions,
        limits: &UploadLimits,
        no_watch: bool,
    ) -> Result<()> {
        let options = options.to_job_options();
        options.validate().map_err(ClientError::from)?;

        let upload = read_upload(file, limits).await?;
        if !sniff_pdf_signature(file).await {
            ff_warn!("{:?} does not start with a PDF signature", file);
            eprintln!(
                "warning: {} does not look like a PDF; the server may reject it",
                file.display()
            );
        }

        println!(
            "Uploading {} ({}) to {}",
            upload.file_name,
            format_file_size(upload.bytes.len() as u64),
            self.settings.snapshot().backend_url()
        );
        let created = self
            .api
            .submit_job(&upload, Some(&options))
            .await
            .map_err(ClientError::from)?;
        ff_info!("Submitted {} as job {}", upload.file_name, created.job_id);
        println!("{}", created.job_id);

        if no_watch {
            return Ok(());
        }
        self.watch(vec![created.job_id]).await
    }

    /// Polls every job until each is terminal or the user interrupts.
    async fn watch(&self, job_ids: Vec<JobId>) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let api: Arc<dyn JobApi> = self.api.clone();
        let engine = PollEngine::new(
            api,
            self.settings.clone(),
            self.history.clone(),
            Arc::new(ChannelPollSink::new(tx)),
        );

        let mut started: HashMap<JobId, Instant> = HashMap::new();
        for job_id in job_ids {
            if engine.track(job_id.clone()) {
                started.insert(job_id, Instant::now());
            }
        }

        let outcome = follow_events(&engine, &mut rx, started, tokio::signal::ctrl_c()).await;
        engine.shutdown();

        match outcome {
            WatchOutcome::Interrupted => Ok(()),
            WatchOutcome::Finished(failures) => match failures.into_iter().next() {
                Some(error) => Err(ClientError::JobFailed(error).into()),
                None => Ok(()),
            },
        }
    }

    async fn status(&self, job_id: &JobId) -> Result<()> {
        let job = self
            .api
            .fetch_status(job_id)
            .await
            .map_err(ClientError::from)?;
        println!("{}", render::status_block(&job));
        Ok(())
    }

    async fn download(&self, job_id: &JobId, output: &Path) -> Result<()> {
        let written = self.api.download_result(job_id, output).await?;
        println!("Saved {} to {}", format_file_size(written), output.display());
        Ok(())
    }

    fn history(&self, action: HistoryAction) -> Result<()> {
        match action {
            HistoryAction::List => {
                println!("{}", render::history_table(&self.history.entries()));
            }
            HistoryAction::Remove { job_id } => {
                if self.history.remove(&job_id)? {
                    println!("Removed {job_id}");
                } else {
                    println!("{job_id} is not in the history");
                }
            }
            HistoryAction::Clear => {
                self.history.clear()?;
                println!("History cleared");
            }
        }
        Ok(())
    }

    fn settings(&self, action: SettingsAction) -> Result<()> {
        match action {
            SettingsAction::Show => {}
            SettingsAction::SetUrl { url } => self.settings.set_backend_url(&url)?,
            SettingsAction::SetInterval { interval_ms } => {
                self.settings.set_poll_interval_ms(interval_ms)?
            }
            SettingsAction::Reset => self.settings.reset()?,
        }
        println!("{}", render::settings_block(&self.settings.snapshot()));
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
enum WatchOutcome {
    /// Every tracked job reached a terminal stage; carries the server-reported failures.
    Finished(Vec<JobError>),
    Interrupted,
}

/// Prints poll events until every job in `started` is terminal or `interrupt`
/// resolves. The interrupt future is polled across iterations, never recreated.
async fn follow_events<F>(
    engine: &PollEngine,
    rx: &mut mpsc::UnboundedReceiver<PollEvent>,
    mut started: HashMap<JobId, Instant>,
    interrupt: F,
) -> WatchOutcome
where
    F: Future,
{
    tokio::pin!(interrupt);
    let mut failures: Vec<JobError> = Vec::new();
    while !started.is_empty() {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = &mut interrupt => {
                ff_info!("Interrupted; leaving {} job(s) running on the server", started.len());
                return WatchOutcome::Interrupted;
            }
        };
        let Some(event) = event else { break };

        match event {
            PollEvent::Snapshot { job, .. } => {
                let elapsed = started
                    .get(&job.id)
                    .map(Instant::elapsed)
                    .unwrap_or_default();
                println!("{}", render::job_line(&job, elapsed));
            }
            PollEvent::TransientError { job_id, error } => {
                let latest = engine.latest(&job_id);
                eprintln!("{}", render::transient_notice(latest.as_ref(), &error));
            }
            PollEvent::Terminal { job, duration } => {
                started.remove(&job.id);
                match &job.error {
                    Some(error) => {
                        println!("{} failed after {}", job.id, format_duration(duration));
                        failures.push(error.clone());
                    }
                    None => println!(
                        "{} ready after {}; fetch it with `formfill download {}`",
                        job.id,
                        format_duration(duration),
                        job.id
                    ),
                }
            }
        }
    }
    WatchOutcome::Finished(failures)
}
