use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;

use super::error::JobError;
use super::executor::{ExecutionOutcome, JobExecutor};
use super::queue::{DeadLetter, DeadLetters, JobQueue};

/// Result of one delivered job.
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: String,
    pub result: Result<ExecutionOutcome, JobError>,
}

/// Fixed set of worker threads; each worker owns a job from claim to
/// completion.
pub struct WorkerPool {
    job_sender: Sender<String>,
    result_receiver: Receiver<JobOutcome>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    dead_letters: DeadLetters,
}

impl WorkerPool {
    /// Starts `worker_count` workers.
    ///
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(executor: Arc<JobExecutor>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = bounded::<String>(worker_count * 2);
        let (result_sender, result_receiver) = unbounded::<JobOutcome>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let dead_letters = DeadLetters::default();

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_executor = Arc::clone(&executor);
            let worker_dead_letters = dead_letters.clone();

            let handle = thread::spawn(move || {
                run_worker(
                    worker_id,
                    job_rx,
                    result_tx,
                    shutdown_flag,
                    worker_executor,
                    worker_dead_letters,
                );
            });

            workers.push(handle);
        }

        info!("Started {} import workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
            shutdown,
            dead_letters,
        }
    }

    pub fn recv_result(&self) -> Option<JobOutcome> {
        self.result_receiver.recv().ok()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.snapshot()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Dropping the sender lets idle workers see a disconnected channel.
        drop(self.job_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl JobQueue for WorkerPool {
    fn submit(&self, job_id: &str) -> Result<(), WorkerError> {
        if self.is_shutdown() {
            return Err(WorkerError::ChannelClosed);
        }

        self.job_sender
            .send(job_id.to_string())
            .map_err(|_| WorkerError::ChannelClosed)
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<String>,
    result_sender: Sender<JobOutcome>,
    shutdown: Arc<AtomicBool>,
    executor: Arc<JobExecutor>,
    dead_letters: DeadLetters,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(job_id) => {
                debug!("Worker {} processing job {}", worker_id, job_id);

                let result = executor.execute(&job_id);
                if let Err(e) = &result {
                    dead_letters.push(DeadLetter::new(&job_id, e));
                }

                if let Err(e) = result_sender.send(JobOutcome { job_id, result }) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
