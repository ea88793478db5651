//! Queue routing for DFT jobs: local execution or a SLURM cluster.
//!
//! Adapter parameters come from `<launch_dir>/local.yaml` and
//! `<launch_dir>/slurm.yaml`, each holding a top-level `queue_adapter` mapping:
//!
//! ```yaml
//! queue_adapter:
//!   qtype: slurm
//!   nodes: 2
//!   walltime: "12:00:00"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Labels that always run on the local machine.
pub const LOCAL_LABELS: [&str; 3] = ["DIRECT", "COMPARE", "METRICS"];

/// Where a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueRoute {
    /// The submitting machine.
    Local,
    /// A SLURM batch queue.
    Slurm,
}

impl QueueRoute {
    /// Name of the route, also the stem of its YAML file.
    pub fn as_str(self) -> &'static str {
        match self {
            QueueRoute::Local => "local",
            QueueRoute::Slurm => "slurm",
        }
    }
}

impl fmt::Display for QueueRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueRoute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(QueueRoute::Local),
            "slurm" => Ok(QueueRoute::Slurm),
            _ => Err(Error::InvalidParameter {
                name: "queue route",
                message: "must be \"local\" or \"slurm\"",
            }),
        }
    }
}

/// Route for a job `label`; an explicit override always wins.
pub fn route_for(label: &str, override_route: Option<QueueRoute>) -> QueueRoute {
    match override_route {
        Some(route) => route,
        None if LOCAL_LABELS.contains(&label) => QueueRoute::Local,
        None => QueueRoute::Slurm,
    }
}

/// Queue adapter handle: the route plus its constructor parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueAdapter {
    route: QueueRoute,
    params: Mapping,
    stub: bool,
}

impl QueueAdapter {
    /// Adapter built from a `queue_adapter` parameter mapping.
    pub fn from_params(route: QueueRoute, params: Mapping) -> Self {
        Self {
            route,
            params,
            stub: false,
        }
    }

    /// Placeholder adapter with no parameters, for runs without queue configuration.
    pub fn stub(route: QueueRoute) -> Self {
        Self {
            route,
            params: Mapping::new(),
            stub: true,
        }
    }

    /// The route this adapter serves.
    pub fn route(&self) -> QueueRoute {
        self.route
    }

    /// True for placeholder adapters.
    pub fn is_stub(&self) -> bool {
        self.stub
    }

    /// All constructor parameters.
    pub fn params(&self) -> &Mapping {
        &self.params
    }

    /// A single parameter.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// A string parameter.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }
}

impl fmt::Display for QueueAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stub {
            f.write_str("QueueAdapter<stub>")
        } else {
            write!(f, "QueueAdapter<{}>", self.route)
        }
    }
}

#[derive(Debug, Deserialize)]
struct LaunchFile {
    queue_adapter: Option<Mapping>,
}

#[derive(Debug)]
enum Source {
    LaunchDir(PathBuf),
    Stub,
}

/// Builds and caches one adapter per route.
#[derive(Debug)]
pub struct QueueAdapterFactory {
    source: Source,
    cache: Mutex<HashMap<QueueRoute, Arc<QueueAdapter>>>,
}

impl QueueAdapterFactory {
    /// Factory reading `<dir>/<route>.yaml`.
    pub fn from_launch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::LaunchDir(dir.into()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Factory handing out stub adapters.
    pub fn stub() -> Self {
        warn!("no queue configuration; using stub queue adapters");
        Self {
            source: Source::Stub,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Adapter for `label`, honouring `override_route`.
    pub fn get(
        &self,
        label: &str,
        override_route: Option<QueueRoute>,
    ) -> Result<Arc<QueueAdapter>> {
        self.adapter(route_for(label, override_route))
    }

    /// Adapter for `route`, loaded on first request.
    pub fn adapter(&self, route: QueueRoute) -> Result<Arc<QueueAdapter>> {
        let mut cache = self.cache.lock();
        if let Some(adapter) = cache.get(&route) {
            return Ok(Arc::clone(adapter));
        }
        let adapter = Arc::new(match &self.source {
            Source::Stub => QueueAdapter::stub(route),
            Source::LaunchDir(dir) => load_adapter(dir, route)?,
        });
        debug!(%route, adapter = %adapter, "queue adapter ready");
        cache.insert(route, Arc::clone(&adapter));
        Ok(adapter)
    }
}

fn load_adapter(dir: &Path, route: QueueRoute) -> Result<QueueAdapter> {
    let path = dir.join(format!("{}.yaml", route.as_str()));
    let text = std::fs::read_to_string(&path)?;
    let file: LaunchFile = serde_yaml::from_str(&text)?;
    let params = file.queue_adapter.ok_or_else(|| {
        Error::Other(format!("{}: missing `queue_adapter` mapping", path.display()))
    })?;
    Ok(QueueAdapter::from_params(route, params))
}
