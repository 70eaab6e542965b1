//! Job management.
//!
//! Each origin handler registered with the [`JobManager`] becomes one job,
//! driven on its own worker thread. The first job to fail cancels the rest.

use crate::cue::SyncPointQueue;
use crate::error::Result;
use crate::handler::OriginHandler;
use std::sync::mpsc;
use std::sync::Arc;
use tracing::{debug, error};

/// One named job wrapping an origin handler.
pub struct Job {
    name: String,
    origin: Arc<dyn OriginHandler>,
}

impl Job {
    /// The job's display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The origin handler this job drives.
    pub fn origin(&self) -> &Arc<dyn OriginHandler> {
        &self.origin
    }
}

/// Owns the run's jobs and, when ad cues are active, the shared sync-point
/// queue all cue aligners consult.
pub struct JobManager {
    jobs: Vec<Job>,
    sync_points: Option<Arc<SyncPointQueue>>,
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.jobs.len())
            .field("sync_points", &self.sync_points.is_some())
            .finish()
    }
}

impl JobManager {
    /// Create a job manager, taking ownership of the sync points if cue
    /// alignment is active.
    pub fn new(sync_points: Option<Arc<SyncPointQueue>>) -> Self {
        Self {
            jobs: Vec::new(),
            sync_points,
        }
    }

    /// Register an origin handler as a named job.
    pub fn add(&mut self, name: &str, origin: Arc<dyn OriginHandler>) {
        self.jobs.push(Job {
            name: name.to_string(),
            origin,
        });
    }

    /// The registered jobs, in registration order.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// The shared sync-point queue, when ad cues are active.
    pub fn sync_points(&self) -> Option<&Arc<SyncPointQueue>> {
        self.sync_points.as_ref()
    }

    /// Validate the assembled graph before running.
    pub fn initialize_jobs(&self) -> Result<()> {
        for job in &self.jobs {
            job.origin.initialize()?;
        }
        Ok(())
    }

    /// Run every job to completion, one worker thread per job.
    ///
    /// Returns the first failure; remaining jobs are cancelled as soon as
    /// one fails.
    pub fn run_jobs(&self) -> Result<()> {
        let (results_tx, results_rx) = mpsc::channel();

        let first_error = std::thread::scope(|scope| {
            for (index, job) in self.jobs.iter().enumerate() {
                let results_tx = results_tx.clone();
                scope.spawn(move || {
                    debug!(job = job.name(), "job started");
                    let result = job.origin.run();
                    let _ = results_tx.send((index, result));
                });
            }
            drop(results_tx);

            let mut first_error = None;
            for (index, result) in results_rx.iter() {
                if let Err(e) = result {
                    error!(job = self.jobs[index].name(), "job failed: {e}");
                    if first_error.is_none() {
                        first_error = Some(e);
                        self.cancel_jobs();
                    }
                }
            }
            first_error
        });

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Cancel every job and stop handing out cues.
    pub fn cancel_jobs(&self) {
        if let Some(sync_points) = &self.sync_points {
            sync_points.cancel();
        }
        for job in &self.jobs {
            job.origin.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::handler::{HandlerKind, MediaHandler, StreamData};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeOrigin {
        ran: AtomicBool,
        cancelled: AtomicBool,
        fail: bool,
    }

    impl FakeOrigin {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                ran: AtomicBool::new(false),
                cancelled: AtomicBool::new(false),
                fail,
            })
        }
    }

    impl MediaHandler for FakeOrigin {
        fn kind(&self) -> HandlerKind {
            HandlerKind::Demuxer
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn is_origin(&self) -> bool {
            true
        }

        fn add_downstream(&self, _downstream: Arc<dyn MediaHandler>) -> Result<()> {
            Ok(())
        }

        fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
            Vec::new()
        }

        fn process(&self, _data: StreamData) -> Result<()> {
            Ok(())
        }

        fn flush(&self) -> Result<()> {
            Ok(())
        }
    }

    impl OriginHandler for FakeOrigin {
        fn run(&self) -> Result<()> {
            self.ran.store(true, Ordering::SeqCst);
            if self.fail {
                return Err(Error::InvalidArgument("boom".to_string()));
            }
            Ok(())
        }

        fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_run_jobs_runs_every_job() {
        let mut manager = JobManager::new(None);
        let a = FakeOrigin::new(false);
        let b = FakeOrigin::new(false);
        manager.add("A", a.clone());
        manager.add("B", b.clone());

        manager.initialize_jobs().unwrap();
        manager.run_jobs().unwrap();
        assert!(a.ran.load(Ordering::SeqCst));
        assert!(b.ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_jobs_reports_failure_and_cancels() {
        let mut manager = JobManager::new(None);
        let good = FakeOrigin::new(false);
        let bad = FakeOrigin::new(true);
        manager.add("good", good.clone());
        manager.add("bad", bad.clone());

        assert!(manager.run_jobs().is_err());
        assert!(good.cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_run_jobs_with_no_jobs_is_ok() {
        let manager = JobManager::new(None);
        assert!(manager.run_jobs().is_ok());
    }

    #[test]
    fn test_cancel_jobs_cancels_sync_points() {
        let queue = Arc::new(SyncPointQueue::new(&Default::default()));
        let manager = JobManager::new(Some(queue.clone()));
        manager.cancel_jobs();
        assert!(queue.cancelled());
    }

    #[test]
    fn test_failing_initialize_propagates() {
        struct BadInit;
        impl MediaHandler for BadInit {
            fn kind(&self) -> HandlerKind {
                HandlerKind::TextParser
            }
            fn as_any(&self) -> &dyn std::any::Any {
                self
            }
            fn is_origin(&self) -> bool {
                true
            }
            fn add_downstream(&self, _d: Arc<dyn MediaHandler>) -> Result<()> {
                Ok(())
            }
            fn downstreams(&self) -> Vec<Arc<dyn MediaHandler>> {
                Vec::new()
            }
            fn initialize(&self) -> Result<()> {
                Err(Error::InvalidArgument("not wired".to_string()))
            }
            fn process(&self, _data: StreamData) -> Result<()> {
                Ok(())
            }
            fn flush(&self) -> Result<()> {
                Ok(())
            }
        }
        impl OriginHandler for BadInit {
            fn run(&self) -> Result<()> {
                Ok(())
            }
            fn cancel(&self) {}
        }

        let mut manager = JobManager::new(None);
        manager.add("bad", Arc::new(BadInit));
        assert!(manager.initialize_jobs().is_err());
    }
}
