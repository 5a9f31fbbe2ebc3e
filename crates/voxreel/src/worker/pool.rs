use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::worker::executor::JobExecutor;

/// Background threads that poll the store for queued jobs.
///
/// Each worker sleeps for `poll_interval` between empty polls, or until
/// [`WorkerPool::wake`] is called. Jobs are never handed to a worker
/// directly; the store's atomic claim decides who runs what.
pub struct WorkerPool {
    wake_sender: Sender<()>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn start(
        executor: JobExecutor,
        worker_count: usize,
        poll_interval: Duration,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be > 0".to_string(),
            ));
        }

        let (wake_sender, wake_receiver) = bounded::<()>(worker_count);
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let executor = executor.clone();
            let wake_rx = wake_receiver.clone();
            let shutdown_flag = Arc::clone(&shutdown);

            let spawned = thread::Builder::new()
                .name(format!("voxreel-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, executor, wake_rx, shutdown_flag, poll_interval);
                });

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Stop whatever already started before reporting.
                    shutdown.store(true, Ordering::SeqCst);
                    drop(wake_sender);
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            wake_sender,
            workers,
            shutdown,
        })
    }

    /// Nudges an idle worker to poll now instead of at the next interval.
    pub fn wake(&self) {
        // A full channel already has a wake pending.
        let _ = self.wake_sender.try_send(());
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Asks workers to stop after their current job.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::SeqCst);
        for _ in 0..self.workers.len() {
            self.wake();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stops the pool and joins every worker thread.
    pub fn wait(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Disconnecting the channel releases workers blocked on it.
        drop(self.wake_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    executor: JobExecutor,
    wake_receiver: Receiver<()>,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
) {
    debug!("Worker {} started", worker_id);

    while !shutdown.load(Ordering::SeqCst) {
        match executor.process_next() {
            // Look for more work right away.
            Ok(Some(processed)) => {
                debug!("Worker {} finished job {}", worker_id, processed.job_id);
                continue;
            }
            Ok(None) => {}
            Err(e) => error!("Worker {} could not claim a job: {}", worker_id, e),
        }

        match wake_receiver.recv_timeout(poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Worker {} wake channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
