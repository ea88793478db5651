//! Static single-point calculation flow.
//!
//! The flow is a plain description (one static job per structure plus the queue
//! adapter to submit them with) that an external workflow engine executes.

use std::sync::Arc;

use serde::Serialize;

use super::queue::{QueueAdapter, QueueAdapterFactory, QueueRoute};
use crate::error::{Error, Result};
use crate::structure::Structure;

/// One static single-point calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticJob {
    /// Job name, `static-<index>`.
    pub name: String,
    /// Position of the structure in the input sequence.
    pub index: usize,
    /// The structure to compute.
    pub structure: Structure,
}

/// A batch of static jobs bound to a queue adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaticFlow {
    /// Flow name (the maker's name).
    pub name: String,
    /// Jobs in input order.
    pub jobs: Vec<StaticJob>,
    /// Adapter the jobs are submitted with.
    pub queue_adapter: Arc<QueueAdapter>,
}

/// Builds [`StaticFlow`]s, picking the queue from the maker's label.
#[derive(Debug, Clone)]
pub struct SinglePointFlowMaker {
    /// Routing label; `"DFT"` routes to SLURM unless overridden.
    pub label: String,
    /// Name given to produced flows.
    pub name: String,
    /// Force a queue regardless of label.
    pub queue_override: Option<QueueRoute>,
}

impl Default for SinglePointFlowMaker {
    fn default() -> Self {
        Self {
            label: "DFT".to_string(),
            name: "VaspSinglePointMaker".to_string(),
            queue_override: None,
        }
    }
}

impl SinglePointFlowMaker {
    /// Maker with the default label and name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force jobs onto `route`.
    pub fn with_queue_override(mut self, route: QueueRoute) -> Self {
        self.queue_override = Some(route);
        self
    }

    /// Build a flow with one static job per structure.
    pub fn make(
        &self,
        factory: &QueueAdapterFactory,
        structures: &[Structure],
    ) -> Result<StaticFlow> {
        if structures.is_empty() {
            return Err(Error::EmptyInput);
        }
        let queue_adapter = factory.get(&self.label, self.queue_override)?;
        let jobs = structures
            .iter()
            .enumerate()
            .map(|(index, s)| StaticJob {
                name: format!("static-{index}"),
                index,
                structure: s.clone(),
            })
            .collect();
        Ok(StaticFlow {
            name: self.name.clone(),
            jobs,
            queue_adapter,
        })
    }

    /// Build a flow for the `selected` positions of `structures` (e.g. a DIRECT selection).
    ///
    /// Job indices refer to positions in `structures`. Repeated indices yield repeated jobs.
    pub fn make_selected(
        &self,
        factory: &QueueAdapterFactory,
        structures: &[Structure],
        selected: &[usize],
    ) -> Result<StaticFlow> {
        if selected.is_empty() {
            return Err(Error::EmptyInput);
        }
        if let Some(&bad) = selected.iter().find(|&&i| i >= structures.len()) {
            return Err(Error::Other(format!(
                "selected index {bad} out of range for {} structures",
                structures.len()
            )));
        }
        let queue_adapter = factory.get(&self.label, self.queue_override)?;
        let jobs = selected
            .iter()
            .enumerate()
            .map(|(job, &index)| StaticJob {
                name: format!("static-{job}"),
                index,
                structure: structures[index].clone(),
            })
            .collect();
        Ok(StaticFlow {
            name: self.name.clone(),
            jobs,
            queue_adapter,
        })
    }
}
