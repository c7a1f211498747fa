//! Concurrency shell around the executive.
//!
//! [`ExecApplication`] owns one [`Exec`], an input queue and an
//! [`InterfaceManager`], and optionally a worker thread that drains the
//! queue and steps the executive whenever input arrives. All access to the
//! executive goes through one mutex; adapters never take it and report
//! through the [`EventSink`] instead.

mod state;

pub use state::{ApplicationState, ApplicationStatus};

use crate::config::ApplicationConfig;
use crate::exec::Exec;
use crate::interface::{EventSink, InterfaceManager};
use crate::listener::{ListenerHub, ListenerId};
use crate::metrics::MetricsSnapshot;
use parking_lot::{Condvar, Mutex, MutexGuard};
use plexec_core::error::{PlexecError, Result};
use plexec_core::interface::ExternalInterface;
use plexec_core::listener::ExecListener;
use plexec_core::logging::{BufferedCollector, LogCategory, LogCollector, LogEvent};
use plexec_core::node::NodeSpec;
use plexec_core::queue::InputQueue;
use plexec_core::resource::ResourceHierarchy;
use plexec_core::sync::Semaphore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// State shared between callers and the worker thread.
struct Shared {
    exec: Mutex<Exec>,
    manager: Arc<InterfaceManager>,
    wake: Arc<Semaphore>,
    listeners: Arc<ListenerHub>,
    collector: Arc<BufferedCollector>,
    cancel: Mutex<CancellationToken>,
    stop_requested: AtomicBool,
    suspended: AtomicBool,
    status: Mutex<ApplicationStatus>,
    changed: Condvar,
    watch: watch::Sender<ApplicationStatus>,
}

impl Shared {
    /// Mutate the status, then wake blocking and async waiters.
    fn publish(&self, update: impl FnOnce(&mut ApplicationStatus)) {
        let snapshot = {
            let mut status = self.status.lock();
            update(&mut status);
            status.clone()
        };
        self.changed.notify_all();
        self.watch.send_replace(snapshot);
    }

    fn state(&self) -> ApplicationState {
        self.status.lock().state
    }

    /// Trip the token the current executive polls.
    fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    /// Drain and step until nothing is queued and nothing needs a step.
    fn run_cycle(&self, exec: &mut Exec) -> Result<bool> {
        let mut stepped = false;
        loop {
            let needs_step = self.manager.process_queue(exec)?;
            if needs_step {
                exec.step()?;
                stepped = true;
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
            if !exec.needs_step() && self.manager.queue().is_empty() {
                break;
            }
        }
        Ok(stepped)
    }

    /// One cycle under the exec lock, then publish what waiters care about.
    fn cycle_and_publish(&self) -> Result<()> {
        let (finished, steps) = {
            let mut exec = self.exec.lock();
            self.run_cycle(&mut exec)?;
            (exec.all_plans_finished(), exec.step_count())
        };
        let mark = self.manager.complete_marks();
        self.publish(|s| {
            s.plans_finished = finished;
            s.steps = steps;
            s.completed_mark = mark;
        });
        Ok(())
    }

    fn record(&self, event: LogEvent) {
        self.collector.collect(event);
    }
}

fn worker_main(shared: Arc<Shared>) {
    info!("Exec worker started");
    let halted = match worker_loop(&shared) {
        Ok(()) => None,
        Err(e) => {
            error!(error = %e, "Exec worker halted");
            shared.record(
                LogEvent::error(LogCategory::Application, "Exec worker halted")
                    .with_field("error", e.to_string()),
            );
            Some(e.to_string())
        }
    };
    shared.publish(|s| {
        s.worker_alive = false;
        if halted.is_some() {
            s.halted = halted;
        }
    });
    info!("Exec worker exited");
}

fn worker_loop(shared: &Shared) -> Result<()> {
    if !shared.suspended.load(Ordering::SeqCst) {
        shared.cycle_and_publish()?;
    }
    loop {
        shared.wake.wait();
        if shared.stop_requested.load(Ordering::SeqCst) {
            return Ok(());
        }
        if shared.suspended.load(Ordering::SeqCst) {
            continue;
        }
        shared.cycle_and_publish()?;
    }
}

fn build_exec(
    config: &ApplicationConfig,
    manager: &Arc<InterfaceManager>,
    listeners: &Arc<ListenerHub>,
    collector: &Arc<BufferedCollector>,
    cancel: &CancellationToken,
) -> Result<Exec> {
    let interface: Arc<dyn ExternalInterface> = manager.clone();
    Ok(Exec::new(config.exec.clone(), interface)?
        .with_listeners(Arc::clone(listeners))
        .with_collector(Arc::clone(collector))
        .with_cancellation_token(cancel.clone()))
}

fn load_resources(config: &ApplicationConfig, exec: &mut Exec) -> Result<()> {
    if let Some(path) = &config.resource_file {
        let hierarchy = ResourceHierarchy::from_file(path)?;
        info!(path = %path.display(), resources = hierarchy.len(), "Resource hierarchy loaded");
        exec.set_resource_hierarchy(hierarchy)?;
    }
    Ok(())
}

/// Hosts an executive, its input queue and an optional worker thread.
///
/// # Example
///
/// ```ignore
/// let app = ExecApplication::new(ApplicationConfig::default())?;
/// app.initialize()?;
/// app.start_interfaces()?;
/// app.run()?;
/// app.add_plan(plan, None);
/// app.wait_for_plan_finished()?;
/// app.stop()?;
/// app.shutdown()?;
/// ```
pub struct ExecApplication {
    config: ApplicationConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    killed: AtomicBool,
}

impl ExecApplication {
    /// Create an application in the `Uninited` state.
    pub fn new(config: ApplicationConfig) -> Result<Self> {
        let queue = Arc::new(InputQueue::with_capacity(config.queue_prealloc));
        let wake = Arc::new(Semaphore::new());
        let manager = Arc::new(InterfaceManager::new(queue, Arc::clone(&wake)));
        let listeners = Arc::new(ListenerHub::new());
        let collector = Arc::new(BufferedCollector::new(config.exec.log_buffer_capacity));
        let cancel = CancellationToken::new();
        let exec = build_exec(&config, &manager, &listeners, &collector, &cancel)?;
        let (watch, _) = watch::channel(ApplicationStatus::default());

        Ok(Self {
            config,
            shared: Arc::new(Shared {
                exec: Mutex::new(exec),
                manager,
                wake,
                listeners,
                collector,
                cancel: Mutex::new(cancel),
                stop_requested: AtomicBool::new(false),
                suspended: AtomicBool::new(false),
                status: Mutex::new(ApplicationStatus::default()),
                changed: Condvar::new(),
                watch,
            }),
            worker: Mutex::new(None),
            killed: AtomicBool::new(false),
        })
    }

    /// Move to `next`, or fail if the current state does not allow it.
    fn transition(&self, next: ApplicationState) -> Result<ApplicationState> {
        let mut result = Err(PlexecError::IllegalAppTransition {
            from: String::new(),
            to: next.to_string(),
        });
        self.shared.publish(|s| {
            if s.state.can_transition_to(next) {
                result = Ok(s.state);
                s.state = next;
            } else {
                result = Err(PlexecError::IllegalAppTransition {
                    from: s.state.to_string(),
                    to: next.to_string(),
                });
            }
        });
        let from = result?;
        info!(from = %from, to = %next, "Application state changed");
        self.shared.record(
            LogEvent::info(LogCategory::Application, format!("Application {from} -> {next}"))
                .with_field("from", from.as_str())
                .with_field("to", next.as_str()),
        );
        Ok(from)
    }

    fn require(&self, operation: &'static str, allowed: &[ApplicationState]) -> Result<()> {
        let state = self.shared.state();
        if allowed.contains(&state) {
            Ok(())
        } else {
            Err(PlexecError::AppState {
                operation,
                state: state.to_string(),
            })
        }
    }

    /// Load the configured resource hierarchy.
    #[instrument(skip(self))]
    pub fn initialize(&self) -> Result<()> {
        self.require("initialize", &[ApplicationState::Uninited])?;
        load_resources(&self.config, &mut self.shared.exec.lock())?;
        self.transition(ApplicationState::Inited)?;
        Ok(())
    }

    /// Start accepting input. Steps run only when [`step`](Self::step)
    /// is called until [`run`](Self::run) starts the worker.
    #[instrument(skip(self))]
    pub fn start_interfaces(&self) -> Result<()> {
        self.transition(ApplicationState::Ready)?;
        Ok(())
    }

    /// Drain the queue and step once. Only allowed while `Ready`.
    ///
    /// Returns whether another step is needed.
    pub fn step(&self) -> Result<bool> {
        self.require("step", &[ApplicationState::Ready])?;
        let (again, finished, steps) = {
            let mut exec = self.shared.exec.lock();
            self.shared.manager.process_queue(&mut exec)?;
            let again = exec.step()?;
            (again, exec.all_plans_finished(), exec.step_count())
        };
        let mark = self.shared.manager.complete_marks();
        self.shared.publish(|s| {
            s.plans_finished = finished;
            s.steps = steps;
            s.completed_mark = mark;
        });
        Ok(again)
    }

    /// Start the worker thread, or resume a suspended one.
    #[instrument(skip(self))]
    pub fn run(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            drop(worker);
            return self.resume();
        }
        self.require("run", &[ApplicationState::Ready])?;
        self.shared.stop_requested.store(false, Ordering::SeqCst);
        self.shared.suspended.store(false, Ordering::SeqCst);
        self.shared.publish(|s| {
            s.worker_alive = true;
            s.halted = None;
        });

        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("plexec-worker".to_string())
            .spawn(move || worker_main(shared))
            .map_err(|e| {
                self.shared.publish(|s| s.worker_alive = false);
                PlexecError::ThreadSpawn(e.to_string())
            })?;
        *worker = Some(handle);
        drop(worker);

        self.transition(ApplicationState::Running)?;
        Ok(())
    }

    /// Pause the worker. Input keeps queueing.
    #[instrument(skip(self))]
    pub fn suspend(&self) -> Result<()> {
        self.require("suspend", &[ApplicationState::Running])?;
        self.shared.suspended.store(true, Ordering::SeqCst);
        self.transition(ApplicationState::Ready)?;
        Ok(())
    }

    /// Resume a suspended worker and process whatever queued meanwhile.
    #[instrument(skip(self))]
    pub fn resume(&self) -> Result<()> {
        if self.worker.lock().is_none() {
            return Err(PlexecError::AppState {
                operation: "resume",
                state: "without a worker".to_string(),
            });
        }
        self.transition(ApplicationState::Running)?;
        self.shared.suspended.store(false, Ordering::SeqCst);
        self.shared.wake.post();
        Ok(())
    }

    /// Stop the worker.
    ///
    /// Waits up to the configured stop timeout for the current cycle to
    /// finish. A worker that does not stop in time is cancelled and
    /// detached; the application can then no longer be reset.
    #[instrument(skip(self))]
    pub fn stop(&self) -> Result<()> {
        self.require("stop", &[ApplicationState::Ready, ApplicationState::Running])?;
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.wake.post();

        if let Some(handle) = self.worker.lock().take() {
            let deadline = Instant::now() + self.config.stop_timeout();
            let exited = {
                let mut status = self.shared.status.lock();
                while status.worker_alive {
                    if self
                        .shared
                        .changed
                        .wait_until(&mut status, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                !status.worker_alive
            };
            if exited {
                if handle.join().is_err() {
                    error!("Exec worker panicked");
                }
            } else {
                warn!(
                    timeout_ms = self.config.stop_timeout_ms,
                    "Exec worker did not stop in time, cancelling"
                );
                self.shared.cancel();
                self.killed.store(true, Ordering::SeqCst);
            }
        }

        self.transition(ApplicationState::Stopped)?;
        Ok(())
    }

    /// Stop at once: cancel the current step and detach the worker.
    ///
    /// A killed application cannot be reset.
    #[instrument(skip(self))]
    pub fn kill(&self) -> Result<()> {
        self.require("kill", &[ApplicationState::Ready, ApplicationState::Running])?;
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        self.shared.cancel();
        self.shared.wake.post();
        if self.worker.lock().take().is_some() {
            debug!("Exec worker detached");
        }
        self.killed.store(true, Ordering::SeqCst);
        self.transition(ApplicationState::Stopped)?;
        Ok(())
    }

    /// Discard every plan and start over with a fresh executive.
    ///
    /// Listeners and handlers stay registered. Queued input is dropped.
    #[instrument(skip(self))]
    pub fn reset(&self) -> Result<()> {
        self.require("reset", &[ApplicationState::Stopped])?;
        if self.killed.load(Ordering::SeqCst) {
            return Err(PlexecError::AppState {
                operation: "reset",
                state: "killed".to_string(),
            });
        }

        let shared = &self.shared;
        let cancel = CancellationToken::new();
        let mut exec = build_exec(
            &self.config,
            &shared.manager,
            &shared.listeners,
            &shared.collector,
            &cancel,
        )?;
        load_resources(&self.config, &mut exec)?;
        let dropped = shared.manager.queue().flush();
        {
            let mut current = shared.exec.lock();
            *current = exec;
            *shared.cancel.lock() = cancel;
        }

        shared.stop_requested.store(false, Ordering::SeqCst);
        shared.suspended.store(false, Ordering::SeqCst);
        shared.wake.drain();
        let mark = shared.manager.complete_marks();
        shared.publish(|s| {
            s.plans_finished = false;
            s.steps = 0;
            s.completed_mark = mark;
            s.halted = None;
        });
        debug!(dropped, "Input queue flushed");

        self.transition(ApplicationState::Inited)?;
        Ok(())
    }

    /// Enter the terminal state.
    #[instrument(skip(self))]
    pub fn shutdown(&self) -> Result<()> {
        self.transition(ApplicationState::Shutdown)?;
        Ok(())
    }

    /// Queue a plan; it is inserted at the next drain.
    pub fn add_plan(&self, plan: NodeSpec, parent: Option<&str>) {
        self.shared
            .manager
            .sink()
            .add_plan(plan, parent.map(str::to_string));
    }

    /// Queue a library; it is registered at the next drain.
    pub fn add_library(&self, library: NodeSpec) {
        self.shared.manager.sink().add_library(library);
    }

    /// Producer handle for adapters.
    pub fn sink(&self) -> EventSink {
        self.shared.manager.sink()
    }

    /// The interface manager, for registering handlers.
    pub fn manager(&self) -> &Arc<InterfaceManager> {
        &self.shared.manager
    }

    /// Register a listener. It survives [`reset`](Self::reset).
    pub fn add_listener(&self, listener: Arc<dyn ExecListener>) -> ListenerId {
        self.shared.listeners.add(listener)
    }

    /// Remove a listener.
    pub fn remove_listener(&self, id: ListenerId) -> Result<()> {
        self.shared.listeners.remove(id)
    }

    /// Run `f` with the executive locked.
    pub fn with_exec<R>(&self, f: impl FnOnce(&Exec) -> R) -> R {
        f(&self.shared.exec.lock())
    }

    /// Wake the worker without queueing anything.
    pub fn notify_exec(&self) {
        self.shared.wake.post();
    }

    /// Queue a mark and block until everything queued before it has been
    /// processed and the executive is quiescent again.
    pub fn notify_and_wait_for_completion(&self) -> Result<()> {
        self.require("wait for completion", &[ApplicationState::Running])?;
        let sequence = self.shared.manager.enqueue_mark();
        let poll = self.config.poll_interval();
        let mut status = self.shared.status.lock();
        loop {
            if let Some(reason) = &status.halted {
                return Err(PlexecError::WorkerHalted(reason.clone()));
            }
            if status.completed_mark >= sequence {
                return Ok(());
            }
            if !status.worker_alive {
                return Err(PlexecError::AppState {
                    operation: "wait for completion",
                    state: status.state.to_string(),
                });
            }
            self.shared.changed.wait_for(&mut status, poll);
        }
    }

    /// Block until every root plan has finished.
    pub fn wait_for_plan_finished(&self) -> Result<()> {
        let mut status = self.shared.status.lock();
        loop {
            if let Some(done) = Self::plan_outcome(&status) {
                return done;
            }
            self.shared
                .changed
                .wait_for(&mut status, self.config.poll_interval());
        }
    }

    /// Like [`wait_for_plan_finished`](Self::wait_for_plan_finished), giving
    /// up after `timeout`. Returns false on timeout.
    pub fn wait_for_plan_finished_timeout(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        let mut status = self.shared.status.lock();
        loop {
            if let Some(done) = Self::plan_outcome(&status) {
                return done.map(|()| true);
            }
            if self
                .shared
                .changed
                .wait_until(&mut status, deadline)
                .timed_out()
            {
                return Self::plan_outcome(&status).map_or(Ok(false), |d| d.map(|()| true));
            }
        }
    }

    /// Async form of [`wait_for_plan_finished`](Self::wait_for_plan_finished).
    pub async fn wait_for_plan_finished_async(&self) -> Result<()> {
        let mut rx = self.shared.watch.subscribe();
        let status = rx
            .wait_for(|s| Self::plan_outcome(s).is_some())
            .await
            .map_err(|_| PlexecError::WorkerHalted("status channel closed".to_string()))?
            .clone();
        Self::plan_outcome(&status).unwrap_or(Ok(()))
    }

    /// `None` while still waiting; otherwise how the wait ends.
    fn plan_outcome(status: &ApplicationStatus) -> Option<Result<()>> {
        if let Some(reason) = &status.halted {
            return Some(Err(PlexecError::WorkerHalted(reason.clone())));
        }
        if status.plans_finished {
            return Some(Ok(()));
        }
        match status.state {
            ApplicationState::Stopped | ApplicationState::Shutdown => {
                Some(Err(PlexecError::AppState {
                    operation: "wait for plan",
                    state: status.state.to_string(),
                }))
            }
            _ => None,
        }
    }

    /// Block until the application is shut down.
    pub fn wait_for_shutdown(&self) {
        let mut status = self.shared.status.lock();
        while status.state != ApplicationState::Shutdown {
            self.shared
                .changed
                .wait_for(&mut status, self.config.poll_interval());
        }
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<ApplicationStatus> {
        self.shared.watch.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ApplicationState {
        self.shared.state()
    }

    /// Current status.
    pub fn status(&self) -> ApplicationStatus {
        self.status_guard().clone()
    }

    fn status_guard(&self) -> MutexGuard<'_, ApplicationStatus> {
        self.shared.status.lock()
    }

    /// Executive counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.with_exec(|exec| exec.metrics().snapshot())
    }

    /// Structured event log shared by every executive this application
    /// creates.
    pub fn collector(&self) -> &Arc<BufferedCollector> {
        &self.shared.collector
    }

    /// Configuration.
    pub fn config(&self) -> &ApplicationConfig {
        &self.config
    }
}

impl Drop for ExecApplication {
    fn drop(&mut self) {
        if self.worker.get_mut().is_some() {
            self.shared.stop_requested.store(true, Ordering::SeqCst);
            self.shared.cancel();
            self.shared.wake.post();
        }
    }
}

impl std::fmt::Debug for ExecApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecApplication")
            .field("status", &*self.status_guard())
            .field("manager", &self.shared.manager)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexec_core::node::NodeSpec;

    fn app() -> ExecApplication {
        ExecApplication::new(ApplicationConfig::default().with_stop_timeout_ms(2000)).unwrap()
    }

    #[test]
    fn lifecycle_order_is_enforced() {
        let app = app();
        assert!(matches!(
            app.start_interfaces(),
            Err(PlexecError::IllegalAppTransition { .. })
        ));
        assert!(matches!(app.step(), Err(PlexecError::AppState { .. })));

        app.initialize().unwrap();
        app.start_interfaces().unwrap();
        assert_eq!(app.state(), ApplicationState::Ready);
        assert!(app.reset().is_err());

        app.stop().unwrap();
        app.reset().unwrap();
        assert_eq!(app.state(), ApplicationState::Inited);
        app.shutdown().unwrap();
        assert!(app.initialize().is_err());
    }

    #[test]
    fn manual_step_runs_queued_plan() {
        let app = app();
        app.initialize().unwrap();
        app.start_interfaces().unwrap();
        app.add_plan(NodeSpec::empty("Root"), None);

        while app.step().unwrap() {}
        assert!(app.status().plans_finished);
        assert!(app.with_exec(|e| e.all_plans_finished()));
    }

    #[test]
    fn worker_runs_plan_to_completion() {
        let app = app();
        app.initialize().unwrap();
        app.start_interfaces().unwrap();
        app.run().unwrap();
        app.add_plan(NodeSpec::empty("Root"), None);

        assert!(
            app.wait_for_plan_finished_timeout(Duration::from_secs(5))
                .unwrap()
        );
        app.stop().unwrap();
        assert!(!app.status().worker_alive);
        assert_eq!(app.state(), ApplicationState::Stopped);
    }

    #[test]
    fn kill_prevents_reset() {
        let app = app();
        app.initialize().unwrap();
        app.start_interfaces().unwrap();
        app.run().unwrap();
        app.kill().unwrap();
        assert!(matches!(
            app.reset(),
            Err(PlexecError::AppState { operation: "reset", .. })
        ));
    }

    #[test]
    fn reset_replaces_cancelled_token() {
        let app = app();
        app.initialize().unwrap();
        app.start_interfaces().unwrap();
        app.stop().unwrap();
        app.shared.cancel();
        assert!(app.with_exec(|e| e.cancellation_token().is_cancelled()));

        app.reset().unwrap();
        assert!(!app.shared.cancel.lock().is_cancelled());
        assert!(!app.with_exec(|e| e.cancellation_token().is_cancelled()));

        app.start_interfaces().unwrap();
        app.add_plan(NodeSpec::empty("Root"), None);
        while app.step().unwrap() {}
        assert!(app.status().plans_finished);
    }
}
