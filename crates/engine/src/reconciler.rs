//! Flow reconciliation
//!
//! Brings the session to a requested page state using a declared table of
//! recovery edges. Unexpected positions (a Cancel that overshoots, a stale
//! page left by the previous scenario) become a re-plan from wherever the
//! session actually is, at most once per `reconcile` call.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FlowError, FlowResult};
use crate::navigator::Navigator;
use crate::session::Step;
use crate::state::PageState;

/// A declared transition: performing `steps` on `from` lands on `to`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEdge {
    pub from: PageState,
    pub action: String,
    pub to: PageState,
    pub steps: Vec<Step>,
}

impl RecoveryEdge {
    pub fn new(from: PageState, action: impl Into<String>, to: PageState, steps: Vec<Step>) -> Self {
        Self {
            from,
            action: action.into(),
            to,
            steps,
        }
    }
}

/// Ordered set of recovery edges. Insertion order breaks ties between
/// equally short paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryTable {
    edges: Vec<RecoveryEdge>,
}

impl RecoveryTable {
    pub fn new(edges: Vec<RecoveryEdge>) -> Self {
        Self { edges }
    }

    pub fn push(&mut self, edge: RecoveryEdge) {
        self.edges.push(edge);
    }

    pub fn edges(&self) -> &[RecoveryEdge] {
        &self.edges
    }

    pub fn edge(&self, from: PageState, action: &str) -> Option<&RecoveryEdge> {
        self.edges.iter().find(|e| e.from == from && e.action == action)
    }

    /// Shortest edge sequence from `from` to `to` (breadth-first).
    /// `Some(vec![])` when already there.
    pub fn path(&self, from: PageState, to: PageState) -> Option<Vec<&RecoveryEdge>> {
        if from == to {
            return Some(Vec::new());
        }

        let mut came_by: HashMap<PageState, usize> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(state) = queue.pop_front() {
            for (index, edge) in self.edges.iter().enumerate() {
                if edge.from != state || edge.to == from || came_by.contains_key(&edge.to) {
                    continue;
                }
                came_by.insert(edge.to, index);
                if edge.to == to {
                    return Some(self.unwind(&came_by, from, to));
                }
                queue.push_back(edge.to);
            }
        }

        None
    }

    fn unwind(&self, came_by: &HashMap<PageState, usize>, from: PageState, to: PageState) -> Vec<&RecoveryEdge> {
        let mut path = Vec::new();
        let mut state = to;
        while state != from {
            let edge = &self.edges[came_by[&state]];
            path.push(edge);
            state = edge.from;
        }
        path.reverse();
        path
    }
}

/// Drives the session to a target state through the recovery table
pub struct FlowReconciler {
    navigator: Navigator,
    table: Arc<RecoveryTable>,
    step_timeout: Duration,
}

impl FlowReconciler {
    pub fn new(navigator: Navigator, table: Arc<RecoveryTable>, step_timeout: Duration) -> Self {
        Self {
            navigator,
            table,
            step_timeout,
        }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn table(&self) -> &RecoveryTable {
        &self.table
    }

    /// Planned edge sequence from `from` to `to`, for diagnostics.
    pub fn plan(&self, from: PageState, to: PageState) -> Option<Vec<&RecoveryEdge>> {
        self.table.path(from, to)
    }

    /// Bring the session to `target`.
    ///
    /// One observation that disagrees with an edge's declared destination is
    /// absorbed by re-planning from the observed state. A second one is
    /// fatal.
    pub async fn reconcile(&self, target: PageState) -> FlowResult<()> {
        if !target.is_named() {
            return Err(FlowError::Precondition(
                "reconcile target must be a named page state".to_string(),
            ));
        }

        let mut current = self.navigator.observe().await?;
        let mut detour_used = false;

        'plan: loop {
            if current == target {
                debug!("Session already on {}", target);
                return Ok(());
            }

            let path = self.plan(current, target).ok_or_else(|| {
                FlowError::mismatch(target, current, "no recovery path in table")
            })?;

            info!(
                "Reconciling {} -> {} via [{}]",
                current,
                target,
                path.iter().map(|e| e.action.as_str()).collect::<Vec<_>>().join(", ")
            );

            for edge in path {
                let observed = self.follow(edge).await?;
                if observed != edge.to {
                    if detour_used {
                        return Err(FlowError::mismatch(
                            edge.to,
                            observed,
                            format!("after '{}' from {} (detour already taken)", edge.action, edge.from),
                        ));
                    }
                    warn!(
                        "'{}' from {} landed on {} instead of {}; re-planning once",
                        edge.action, edge.from, observed, edge.to
                    );
                    detour_used = true;
                    current = observed;
                    continue 'plan;
                }
            }

            return Ok(());
        }
    }

    /// Perform one named action from a confirmed `from` state and confirm
    /// its declared destination. No detours.
    pub async fn traverse(&self, from: PageState, action: &str) -> FlowResult<PageState> {
        let edge = self.table.edge(from, action).ok_or_else(|| {
            FlowError::Precondition(format!("no '{}' action declared from {}", action, from))
        })?;

        let observed = self.navigator.observe().await?;
        if observed != from {
            return Err(FlowError::mismatch(
                from,
                observed,
                format!("before '{}'", action),
            ));
        }

        let landed = self.follow(edge).await?;
        if landed != edge.to {
            return Err(FlowError::mismatch(
                edge.to,
                landed,
                format!("after '{}' from {}", action, from),
            ));
        }
        Ok(landed)
    }

    async fn follow(&self, edge: &RecoveryEdge) -> FlowResult<PageState> {
        debug!("Following '{}': {} -> {}", edge.action, edge.from, edge.to);
        for step in &edge.steps {
            step.perform(self.navigator.session()).await?;
        }
        self.navigator.wait_for(edge.to, self.step_timeout).await
    }
}
