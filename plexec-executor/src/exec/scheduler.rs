//! The quiescence loop.
//!
//! A step repeats scan passes until one finds nothing to do:
//!
//! 1. Compute every node's destination state, in depth-first pre-order
//!    with roots in insertion order.
//! 2. Arbitrate the commands about to enter EXECUTING. Denied commands
//!    sit out this pass holding COMMAND_DENIED, then enter EXECUTING
//!    undispatched so their own conditions end them.
//! 3. Transition every remaining eligible node, applying resource
//!    releases and variable resets as each transition happens. Exit
//!    handlers decide outcomes from the destination computed in step 1,
//!    so earlier transitions in the same pass cannot contradict it.
//!
//! Once quiescent, queued assignments are performed and commands, aborts
//! and updates are handed to the [`ExternalInterface`]. Anything that
//! changes node data there asks for another step.

use super::cache::StateCache;
use crate::config::ExecConfig;
use crate::listener::{ListenerHub, LoggingListener};
use crate::metrics::ExecMetrics;
use plexec_core::error::{PlexecError, Result};
use plexec_core::interface::ExternalInterface;
use plexec_core::listener::{ExecListener, NodeTransition};
use plexec_core::logging::{BufferedCollector, LogCategory, LogCollector, LogEvent};
use plexec_core::node::{NodeBody, NodeSpec, PlanTree};
use plexec_core::resource::{PendingCommand, ResourceArbiter, ResourceHierarchy};
use plexec_core::state::{Effects, StateTableRegistry};
use plexec_core::types::{ActionId, CommandHandle, NodeId, NodeState, RunId};
use plexec_core::value::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// The plan executive: plan tree, state tables, resource ledger and
/// external state, driven one step at a time.
///
/// Not thread-safe on its own. The application shell keeps it behind the
/// exec mutex and only the worker touches it.
pub struct Exec {
    config: ExecConfig,
    run_id: RunId,
    tree: PlanTree,
    registry: StateTableRegistry,
    arbiter: ResourceArbiter,
    cache: StateCache,
    interface: Arc<dyn ExternalInterface>,
    logger: LoggingListener,
    listeners: Arc<ListenerHub>,
    metrics: Arc<ExecMetrics>,
    collector: Arc<BufferedCollector>,
    cancel: CancellationToken,
    step_count: u64,
    needs_step: bool,
    denied: HashSet<NodeId>,
    repeated: HashSet<NodeId>,
}

impl Exec {
    /// Create an executive with the standard state tables.
    pub fn new(config: ExecConfig, interface: Arc<dyn ExternalInterface>) -> Result<Self> {
        Self::with_registry(config, interface, StateTableRegistry::standard()?)
    }

    /// Create an executive with custom state tables.
    pub fn with_registry(
        config: ExecConfig,
        interface: Arc<dyn ExternalInterface>,
        registry: StateTableRegistry,
    ) -> Result<Self> {
        registry.validate()?;
        let run_id = RunId::new();
        let collector = Arc::new(BufferedCollector::new(config.log_buffer_capacity));
        let logger = LoggingListener::new(collector.clone(), run_id);
        info!(run = %run_id, "Exec created");
        Ok(Self {
            cache: StateCache::new(config.time_state.clone()),
            config,
            run_id,
            tree: PlanTree::new(),
            registry,
            arbiter: ResourceArbiter::default(),
            interface,
            logger,
            listeners: Arc::new(ListenerHub::new()),
            metrics: Arc::new(ExecMetrics::default()),
            collector,
            cancel: CancellationToken::new(),
            step_count: 0,
            needs_step: false,
            denied: HashSet::new(),
            repeated: HashSet::new(),
        })
    }

    /// Share a listener hub, so registrations outlive this executive.
    pub fn with_listeners(mut self, listeners: Arc<ListenerHub>) -> Self {
        self.listeners = listeners;
        self
    }

    /// Log into a shared collector instead of a private one.
    pub fn with_collector(mut self, collector: Arc<BufferedCollector>) -> Self {
        self.logger = LoggingListener::new(collector.clone(), self.run_id);
        self.collector = collector;
        self
    }

    /// Poll `token` between transitions instead of a private one.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Identity of this run, carried by its log events.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Scheduler settings.
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// The plan tree.
    pub fn tree(&self) -> &PlanTree {
        &self.tree
    }

    /// The resource arbiter and its ledger.
    pub fn arbiter(&self) -> &ResourceArbiter {
        &self.arbiter
    }

    /// Lookup values, variables and messages.
    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    /// Mutable access to the state cache.
    pub fn cache_mut(&mut self) -> &mut StateCache {
        &mut self.cache
    }

    /// Listener registry.
    pub fn listeners(&self) -> &Arc<ListenerHub> {
        &self.listeners
    }

    /// Counters.
    pub fn metrics(&self) -> &Arc<ExecMetrics> {
        &self.metrics
    }

    /// Structured execution log.
    pub fn collector(&self) -> &Arc<BufferedCollector> {
        &self.collector
    }

    /// Token polled between transitions.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Steps run so far.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Check if another step could make progress without new input.
    pub fn needs_step(&self) -> bool {
        self.needs_step
    }

    /// Replace the resource hierarchy.
    pub fn set_resource_hierarchy(&mut self, hierarchy: ResourceHierarchy) -> Result<()> {
        hierarchy.validate()?;
        info!(resources = hierarchy.len(), "Resource hierarchy installed");
        self.arbiter.set_hierarchy(hierarchy);
        Ok(())
    }

    /// Current state of a node, by name.
    pub fn node_state(&self, name: &str) -> Option<NodeState> {
        let id = self.tree.find(name)?;
        self.tree.get(id).map(|n| n.state())
    }

    /// Check if every root plan has FINISHED. False while no plan is loaded.
    pub fn all_plans_finished(&self) -> bool {
        let roots = self.tree.roots();
        !roots.is_empty()
            && roots
                .iter()
                .all(|id| self.tree.get(*id).map(|n| n.state()) == Some(NodeState::Finished))
    }

    /// Insert a plan, as a new root or under a List node.
    #[instrument(skip(self, plan), fields(plan = %plan.name))]
    pub fn add_plan(&mut self, plan: &NodeSpec, parent: Option<&str>) -> Result<Vec<NodeId>> {
        let ids = self.tree.insert_plan(plan, parent)?;
        let mut effects = Effects::default();
        for id in &ids {
            self.registry
                .initialize(&mut self.tree, &self.cache, &mut effects, *id)?;
            self.registry.verify_activation(&self.tree, *id)?;
        }
        self.needs_step = true;
        info!(nodes = ids.len(), parent = ?parent, "Plan added");
        self.logger.on_plan_added(&plan.name, parent);
        self.listeners.notify_plan_added(&plan.name, parent);
        Ok(ids)
    }

    /// Register a library for LibraryNodeCall expansion.
    pub fn add_library(&mut self, library: NodeSpec) -> Result<()> {
        let name = library.name.clone();
        if self.tree.add_library(library)? {
            warn!(library = %name, "Library replaced");
        } else {
            info!(library = %name, "Library added");
        }
        self.logger.on_library_added(&name);
        self.listeners.notify_library_added(&name);
        Ok(())
    }

    /// Record a lookup value. Unchanged values do not ask for a step.
    pub fn handle_lookup(&mut self, state: &str, value: Value) -> bool {
        let applied = self.cache.update_lookup(state, value);
        self.needs_step |= applied;
        applied
    }

    /// Apply a command handle. Stale acks are ignored.
    pub fn handle_command_ack(&mut self, action: ActionId, handle: CommandHandle) -> bool {
        let applied = self.tree.apply_command_ack(action, handle);
        self.log_ack(action, applied, format!("Command handle {handle}"));
        self.needs_step |= applied;
        applied
    }

    /// Apply a command return value, writing its destination variable.
    pub fn handle_command_return(&mut self, action: ActionId, value: Value) -> bool {
        let applied = match self.tree.apply_command_return(action, value.clone()) {
            Some(destination) => {
                if let Some(variable) = destination {
                    self.cache.set_variable(variable, value);
                }
                true
            }
            None => false,
        };
        self.log_ack(action, applied, "Command returned".to_string());
        self.needs_step |= applied;
        applied
    }

    /// Apply an abort acknowledgement.
    pub fn handle_abort_ack(&mut self, action: ActionId, acknowledged: bool) -> bool {
        let applied = self.tree.apply_abort_ack(action, acknowledged);
        self.log_ack(action, applied, format!("Abort acknowledged: {acknowledged}"));
        self.needs_step |= applied;
        applied
    }

    /// Apply an update or planner request acknowledgement.
    pub fn handle_update_ack(&mut self, action: ActionId, acknowledged: bool) -> bool {
        let applied = self.tree.apply_update_ack(action, acknowledged);
        self.needs_step |= applied;
        if !applied {
            debug!(action = %action, "Stale update ack ignored");
        }
        applied
    }

    /// Ask for a step after an input that changes no node directly.
    pub(crate) fn request_step(&mut self) {
        self.needs_step = true;
    }

    fn log_ack(&self, action: ActionId, applied: bool, message: String) {
        if !applied {
            debug!(action = %action, "Stale command ack ignored");
            return;
        }
        let name = self.tree.get(action.node).map(|n| n.name().to_string());
        let mut event = LogEvent::debug(LogCategory::Command, message)
            .with_run_id(self.run_id)
            .with_field_u64("serial", action.serial);
        if let Some(name) = name {
            event = event.with_node(action.node, name);
        }
        self.collector.collect(event);
    }

    /// Run passes to quiescence, then hand queued actions to the
    /// interface.
    ///
    /// Returns true if the step changed node data after quiescence, or
    /// deferred a repeat, so that another step could make progress
    /// without new input.
    #[instrument(skip_all, fields(run = %self.run_id, step = self.step_count + 1))]
    pub fn step(&mut self) -> Result<bool> {
        self.step_count += 1;
        self.needs_step = false;
        self.repeated.clear();
        self.withdraw_denials()?;

        let mut effects = Effects::default();
        let mut passes = 0usize;
        let mut transitions = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                return Err(PlexecError::Cancelled);
            }
            let eligible = self.scan()?;
            if eligible.is_empty() {
                break;
            }
            passes += 1;
            if passes > self.config.max_passes_per_step {
                return Err(PlexecError::QuiescenceNotReached {
                    passes: self.config.max_passes_per_step,
                });
            }
            let eligible = self.arbitrate(eligible)?;
            let mut records = Vec::with_capacity(eligible.len());
            for (id, dest) in eligible {
                if self.cancel.is_cancelled() {
                    return Err(PlexecError::Cancelled);
                }
                let from = self.tree.node(id)?.state();
                self.registry
                    .transition(&mut self.tree, &self.cache, &mut effects, id, dest)?;
                self.registry.verify_activation(&self.tree, id)?;
                if dest == NodeState::Executing {
                    self.denied.remove(&id);
                }
                if from == NodeState::IterationEnded && dest == NodeState::Waiting {
                    self.repeated.insert(id);
                }
                self.apply_immediate(&mut effects);
                records.push(NodeTransition::capture(self.tree.node(id)?, from, self.step_count));
            }
            transitions += records.len() as u64;
            self.logger.on_transitions(&records);
            self.listeners.notify_transitions(&records);
        }
        self.withdraw_denials()?;

        let changed = self.flush(&mut effects)?;
        self.needs_step |= changed;
        self.metrics.record_step(passes as u64, transitions);
        debug!(passes, transitions, needs_step = self.needs_step, "Step quiescent");
        self.listeners.notify_step_complete(self.step_count);
        Ok(self.needs_step)
    }

    /// One scan: every node whose destination differs from its state.
    fn scan(&mut self) -> Result<Vec<(NodeId, NodeState)>> {
        let mut eligible = Vec::new();
        for id in self.tree.dfs_order() {
            let dest = self.registry.dest_state(&self.tree, &self.cache, id)?;
            let current = self.tree.node(id)?.state();
            if dest == NodeState::NoState || dest == current {
                continue;
            }
            if current == NodeState::IterationEnded
                && dest == NodeState::Waiting
                && self.repeated.contains(&id)
            {
                self.needs_step = true;
                continue;
            }
            eligible.push((id, dest));
        }
        Ok(eligible)
    }

    /// Hold back, for this pass, commands the arbiter denies. Commands
    /// denied in an earlier pass go through without arbitration.
    fn arbitrate(&mut self, eligible: Vec<(NodeId, NodeState)>) -> Result<Vec<(NodeId, NodeState)>> {
        let mut pending = Vec::new();
        for (id, dest) in &eligible {
            if *dest != NodeState::Executing {
                continue;
            }
            if let NodeBody::Command(body) = self.tree.node(*id)?.body() {
                if body.is_denied() {
                    continue;
                }
                pending.push(PendingCommand {
                    node: *id,
                    priority: body.priority(),
                    resources: body.resources.clone(),
                });
            }
        }
        if pending.is_empty() {
            return Ok(eligible);
        }

        let arbitration = self.arbiter.arbitrate(&pending)?;
        if arbitration.denied.is_empty() {
            return Ok(eligible);
        }
        for id in &arbitration.denied {
            self.tree.set_command_denied(*id, true)?;
            self.denied.insert(*id);
            let name = self.tree.node(*id)?.name().to_string();
            info!(node = %id, name = %name, "Command denied by resource arbitration");
            self.collector.collect(
                LogEvent::warn(LogCategory::Resource, "Command denied")
                    .with_run_id(self.run_id)
                    .with_node(*id, name),
            );
        }
        ExecMetrics::add(&self.metrics.commands_denied, arbitration.denied.len() as u64);
        Ok(eligible
            .into_iter()
            .filter(|(id, _)| !arbitration.denied.contains(id))
            .collect())
    }

    /// Clear denials left on commands that never reached EXECUTING.
    fn withdraw_denials(&mut self) -> Result<()> {
        for id in self.denied.drain() {
            self.tree.set_command_denied(id, false)?;
        }
        Ok(())
    }

    /// Releases and variable resets take effect before the next transition.
    fn apply_immediate(&mut self, effects: &mut Effects) {
        for node in effects.releases.drain(..) {
            self.arbiter.release(node);
        }
        for variable in effects.variable_resets.drain(..) {
            debug!(variable = %variable, "Variable reset");
            self.cache.reset_variable(&variable);
        }
    }

    /// Whether an action is the current one of a node in `state`.
    fn is_current(&self, action: ActionId, state: NodeState) -> bool {
        let Some(node) = self.tree.get(action.node) else {
            return false;
        };
        let serial = match node.body() {
            NodeBody::Command(body) => body.serial(),
            NodeBody::Update(body) | NodeBody::Request(body) => body.serial(),
            _ => return false,
        };
        node.state() == state && serial == action.serial
    }

    /// Perform post-quiescence effects. Returns whether node data changed.
    fn flush(&mut self, effects: &mut Effects) -> Result<bool> {
        let mut changed = false;

        for assignment in effects.assignments.drain(..) {
            if self.tree.ack_assignment(assignment.node)? {
                debug!(node = %assignment.node, variable = %assignment.variable, "Assignment performed");
                self.cache.set_variable(assignment.variable, assignment.value);
                ExecMetrics::add(&self.metrics.assignments_performed, 1);
                changed = true;
            }
        }

        let mut dispatch = Vec::new();
        let mut never_sent = HashSet::new();
        for command in effects.commands.drain(..) {
            if self.is_current(command.action, NodeState::Executing) {
                self.tree
                    .set_command_handle(command.action.node, CommandHandle::SentToSystem)?;
                self.collector.collect(
                    LogEvent::info(LogCategory::Command, format!("Command '{}' sent", command.name))
                        .with_run_id(self.run_id)
                        .with_node(command.action.node, command.node_name.clone())
                        .with_field_u64("serial", command.action.serial),
                );
                dispatch.push(command);
                changed = true;
            } else {
                never_sent.insert(command.action);
            }
        }
        if !dispatch.is_empty() {
            info!(commands = dispatch.len(), "Dispatching commands");
            ExecMetrics::add(&self.metrics.commands_dispatched, dispatch.len() as u64);
            self.interface.batch_actions(&dispatch);
        }

        for abort in effects.aborts.drain(..) {
            if never_sent.contains(&abort.action) {
                changed |= self.tree.apply_abort_ack(abort.action, true);
            } else {
                debug!(action = %abort.action, command = %abort.name, "Aborting command");
                self.interface.abort_command(&abort);
            }
        }

        for update in effects.updates.drain(..) {
            if self.is_current(update.action, NodeState::Executing) {
                self.interface.send_update(&update);
            }
        }

        Ok(changed)
    }
}

impl std::fmt::Debug for Exec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exec")
            .field("run_id", &self.run_id)
            .field("nodes", &self.tree.len())
            .field("step_count", &self.step_count)
            .field("needs_step", &self.needs_step)
            .finish_non_exhaustive()
    }
}
