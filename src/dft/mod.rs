//! Hand-off of selected structures to DFT single-point calculations.
//!
//! - [`queue`]: route jobs to a local or SLURM queue adapter configured in YAML.
//! - [`flow`]: describe a batch of static calculations bound to an adapter.
//!
//! Nothing here runs DFT; the flow is consumed by an external workflow engine.

pub mod flow;
pub mod queue;

pub use flow::{SinglePointFlowMaker, StaticFlow, StaticJob};
pub use queue::{route_for, QueueAdapter, QueueAdapterFactory, QueueRoute, LOCAL_LABELS};
