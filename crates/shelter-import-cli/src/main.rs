use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use clap::{Parser, Subcommand};
use log::{error, info};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use shelter_import::batch_status::{self, BatchAction};
use shelter_import::db::animal_repo::Affiliation;
use shelter_import::db::job_repo::{self, JobFilter};
use shelter_import::db::{default_database_path, Database};
use shelter_import::job::{
    requeue_unfinished, JobError, JobQueue, JobView, RetryController, RetryPolicy,
};
use shelter_import::{
    load_config, ExportRequest, FileObjectStore, ImportConfig, Importer, IntakeService,
    JobExecutor, JobProgressBroadcaster, JobTicket, LogNotifier, ObjectStore,
    ShelterImportError, Submission, SubmissionError, UploadedFile, WorkerPool,
};

/// Batch import of shelter rosters, medical history, proofs and photos.
#[derive(Parser)]
#[command(name = "shelter-import", version, about)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database path (overrides the config file)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a roster with optional medical file, proofs and photos, and
    /// wait for the import to finish
    Import {
        #[arg(long)]
        shelter_id: i64,
        #[arg(long)]
        user_id: i64,
        /// Roster CSV
        #[arg(long)]
        roster: PathBuf,
        /// Medical history CSV
        #[arg(long)]
        medical: Option<PathBuf>,
        /// Proof document named `{code}_{sequence}.{ext}` (repeatable)
        #[arg(long = "proof")]
        proofs: Vec<PathBuf>,
        /// Photo named `{code}_{sequence}.{ext}` (repeatable)
        #[arg(long = "photo")]
        photos: Vec<PathBuf>,
    },

    /// Export a shelter's animals to CSV and wait for the file
    Export {
        #[arg(long)]
        shelter_id: i64,
        #[arg(long)]
        user_id: i64,
        /// CAT or DOG
        #[arg(long)]
        species: Option<String>,
        /// Animal status; RETIRED animals are only exported when asked for
        #[arg(long)]
        status: Option<String>,
    },

    /// Run jobs left PENDING or RUNNING by an earlier process
    Recover,

    /// Show one job
    Status {
        job_id: String,
    },

    /// List jobs, newest first
    Jobs {
        /// PENDING, RUNNING, SUCCEEDED or FAILED
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        created_by: Option<i64>,
        #[arg(long, default_value_t = 20)]
        limit: u64,
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },

    /// Change the status of several animals at once
    BatchStatus {
        #[arg(long)]
        shelter_id: i64,
        #[arg(long)]
        user_id: i64,
        /// draft, submit, publish or retire
        #[arg(long)]
        action: String,
        /// Animal ids
        #[arg(required = true)]
        animals: Vec<i64>,
    },

    /// Move an animal to another shelter or to a personal owner
    Transfer {
        #[arg(long)]
        shelter_id: i64,
        #[arg(long)]
        animal_id: i64,
        #[arg(long, conflicts_with = "to_shelter", required_unless_present = "to_shelter")]
        to_owner: Option<i64>,
        #[arg(long)]
        to_shelter: Option<i64>,
    },
}

fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = tracing_log::LogTracer::init();
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> shelter_import::Result<()> {
    let config = cli.config.as_deref().map(load_config).transpose()?;
    let db = open_database(cli.database.as_deref(), config.as_ref())?;

    match cli.command {
        Commands::Import {
            shelter_id,
            user_id,
            roster,
            medical,
            proofs,
            photos,
        } => {
            let config = require_config(config, "import")?;

            let mut submission = Submission::new(shelter_id, user_id, read_upload(&roster)?);
            if let Some(path) = medical {
                submission = submission.with_medical(read_upload(&path)?);
            }
            for path in &proofs {
                submission = submission.with_proof(read_upload(path)?);
            }
            for path in &photos {
                submission = submission.with_photo(read_upload(path)?);
            }

            run_jobs(db, &config, |intake| intake.submit(submission))
        }

        Commands::Export {
            shelter_id,
            user_id,
            species,
            status,
        } => {
            let config = require_config(config, "export")?;
            let mut request = ExportRequest::new(shelter_id);
            if let Some(species) = species {
                request = request.with_species(species);
            }
            if let Some(status) = status {
                request = request.with_status(status);
            }
            run_jobs(db, &config, |intake| intake.submit_export(request, user_id))
        }

        Commands::Recover => {
            let config = require_config(config, "recover")?;
            run_jobs(db, &config, |_| Ok(None::<JobTicket>))
        }

        Commands::Status { job_id } => {
            let row = job_repo::find_by_id(&db, &job_id)?
                .ok_or_else(|| JobError::NotFound(job_id.clone()))?;
            print_json(&JobView::from_row(&row)?)
        }

        Commands::Jobs {
            status,
            created_by,
            limit,
            offset,
        } => {
            let filter = JobFilter {
                status: status.map(|s| s.to_ascii_uppercase()),
                created_by,
                limit: Some(limit),
                offset: Some(offset),
            };
            let (rows, total) = job_repo::query(&db, &filter)?;
            let jobs = rows
                .iter()
                .map(JobView::from_row)
                .collect::<Result<Vec<_>, _>>()?;
            print_json(&JobPage { total, jobs })
        }

        Commands::BatchStatus {
            shelter_id,
            user_id,
            action,
            animals,
        } => {
            let action: BatchAction = action.parse()?;
            let report = batch_status::batch_update_status(
                &db,
                &LogNotifier,
                shelter_id,
                user_id,
                &animals,
                action,
            )?;
            print_json(&report)
        }

        Commands::Transfer {
            shelter_id,
            animal_id,
            to_owner,
            to_shelter,
        } => {
            let to = match (to_owner, to_shelter) {
                (Some(owner), _) => Affiliation::Owner(owner),
                (None, Some(shelter)) => Affiliation::Shelter(shelter),
                (None, None) => {
                    return Err(shelter_import::ConfigError::Validation {
                        message: "one of --to-owner or --to-shelter is required".to_string(),
                    }
                    .into())
                }
            };
            batch_status::transfer_animal(&db, shelter_id, animal_id, to)?;
            info!("Animal {} transferred to {:?}", animal_id, to);
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct JobPage {
    total: u64,
    jobs: Vec<JobView>,
}

fn open_database(
    override_path: Option<&Path>,
    config: Option<&ImportConfig>,
) -> shelter_import::Result<Database> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(|| config.and_then(|c| c.database_path.clone()))
        .or_else(default_database_path)
        .ok_or_else(|| shelter_import::ConfigError::Validation {
            message: "no database path configured and no home directory found".to_string(),
        })?;
    Ok(Database::open(&path)?)
}

fn read_upload(path: &Path) -> shelter_import::Result<UploadedFile> {
    let bytes = std::fs::read(path).map_err(|source| ShelterImportError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    Ok(UploadedFile::new(filename, bytes))
}

fn require_config(
    config: Option<ImportConfig>,
    command: &str,
) -> shelter_import::Result<ImportConfig> {
    config.ok_or_else(|| {
        shelter_import::ConfigError::Validation {
            message: format!("--config is required for {}", command),
        }
        .into()
    })
}

/// Starts the worker pool, redelivers unfinished jobs, submits one new job
/// through `submit` and waits until every delivered job has finished.
fn run_jobs<F, T>(db: Database, config: &ImportConfig, submit: F) -> shelter_import::Result<()>
where
    F: FnOnce(&IntakeService) -> Result<T, SubmissionError>,
    T: Into<Option<JobTicket>>,
{
    let store: Arc<dyn ObjectStore> = Arc::new(FileObjectStore::new(
        &config.storage.root,
        &config.storage.public_base_url,
    ));
    let broadcaster = JobProgressBroadcaster::default();
    let mut events = broadcaster.subscribe();
    thread::spawn(move || loop {
        match events.blocking_recv() {
            Ok(event) => info!("[{}] {}: {}", event.job_id, event.phase, event.message),
            Err(RecvError::Lagged(skipped)) => info!("{} progress events skipped", skipped),
            Err(RecvError::Closed) => break,
        }
    });

    let importer = Importer::new(db.clone(), Arc::clone(&store), config.limits.clone());
    let retry = RetryController::with_thread_sleep(RetryPolicy::from_config(&config.retry));
    let executor = Arc::new(
        JobExecutor::new(db.clone(), importer, retry).with_broadcaster(broadcaster),
    );

    let pool = Arc::new(WorkerPool::new(executor, config.worker_count.max(1)));
    let queue: Arc<dyn JobQueue> = pool.clone();

    let recovered = requeue_unfinished(&db, queue.as_ref())?;
    if !recovered.requeued.is_empty() || !recovered.abandoned.is_empty() {
        info!(
            "Recovered {} unfinished job(s), failed {} that could not be queued",
            recovered.requeued.len(),
            recovered.abandoned.len()
        );
    }

    let intake = IntakeService::new(db.clone(), store, queue, config.limits.clone());
    let submitted = submit(&intake);
    drop(intake);

    let ticket: Option<JobTicket> = match submitted {
        Ok(ticket) => ticket.into(),
        Err(e) => {
            stop(pool);
            return Err(e.into());
        }
    };
    if let Some(ticket) = &ticket {
        info!("Submitted job {} ({})", ticket.job_id, ticket.status);
    }

    let mut waiting = recovered.requeued.len() + usize::from(ticket.is_some());
    let mut ticket_result = None;
    while waiting > 0 {
        let Some(outcome) = pool.recv_result() else {
            break;
        };
        waiting -= 1;
        match &ticket {
            Some(ticket) if ticket.job_id == outcome.job_id => ticket_result = Some(outcome.result),
            _ => {
                if let Err(e) = &outcome.result {
                    error!("Recovered job {} failed: {}", outcome.job_id, e);
                }
            }
        }
    }
    stop(pool);

    let Some(ticket) = ticket else {
        return print_json(&recovered);
    };
    let row = job_repo::find_by_id(&db, &ticket.job_id)?
        .ok_or_else(|| JobError::NotFound(ticket.job_id.clone()))?;
    print_json(&JobView::from_row(&row)?)?;

    match ticket_result {
        Some(result) => result.map(|_| ()).map_err(Into::into),
        None => Err(shelter_import::WorkerError::ChannelClosed.into()),
    }
}

fn stop(pool: Arc<WorkerPool>) {
    pool.shutdown();
    if let Ok(pool) = Arc::try_unwrap(pool) {
        pool.wait();
    }
}

fn print_json<T: Serialize>(value: &T) -> shelter_import::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
