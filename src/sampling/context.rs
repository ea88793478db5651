//! Process-lifetime model caches.
//!
//! A [`PipelineContext`] owns the two expensive-to-build encoders:
//!
//! - the learned latent model, loaded at most once through the configured loader
//!   (a single slot guarded by `OnceLock`, so concurrent first use is safe);
//! - power-spectrum descriptors, one per species set (guarded by a mutex).
//!
//! [`PipelineContext::global`] is the shared instance used by default. Tests and
//! hosts that need isolation construct their own.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::descriptor::{PowerSpectrum, PowerSpectrumParams};
use super::latent::{LatentModel, LatentModelLoader, NoModel, MODEL_ID};
use crate::error::Result;

static GLOBAL: OnceLock<Arc<PipelineContext>> = OnceLock::new();

/// Caches shared by every sampling call that uses this context.
pub struct PipelineContext {
    loader: Box<dyn LatentModelLoader>,
    latent: OnceLock<Option<Arc<dyn LatentModel>>>,
    unavailable_reported: AtomicBool,
    descriptor_params: PowerSpectrumParams,
    descriptors: Mutex<HashMap<BTreeSet<String>, Arc<PowerSpectrum>>>,
}

impl PipelineContext {
    /// Context with no learned model (every latent request falls back).
    pub fn new() -> Self {
        Self::with_loader(NoModel)
    }

    /// Context that obtains the learned model from `loader` on first use.
    pub fn with_loader(loader: impl LatentModelLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            latent: OnceLock::new(),
            unavailable_reported: AtomicBool::new(false),
            descriptor_params: PowerSpectrumParams::default(),
            descriptors: Mutex::new(HashMap::new()),
        }
    }

    /// Override the descriptor hyperparameters.
    #[must_use]
    pub fn with_descriptor_params(mut self, params: PowerSpectrumParams) -> Self {
        self.descriptor_params = params;
        self
    }

    /// Process-wide shared context.
    pub fn global() -> Arc<PipelineContext> {
        GLOBAL
            .get_or_init(|| Arc::new(PipelineContext::new()))
            .clone()
    }

    /// The learned model, loading it on first call.
    pub fn latent_model(&self) -> Option<&dyn LatentModel> {
        let slot = self.latent.get_or_init(|| {
            let model = self.loader.load(MODEL_ID);
            debug!(model_id = MODEL_ID, loaded = model.is_some(), "latent model initialised");
            model
        });
        if slot.is_none() && !self.unavailable_reported.swap(true, Ordering::Relaxed) {
            warn!(
                model_id = MODEL_ID,
                "latent model unavailable; using composition+geometry fallback vectors"
            );
        }
        slot.as_deref()
    }

    /// Descriptor configured for exactly `species`, built on first request.
    pub fn descriptor(&self, species: &BTreeSet<String>) -> Result<Arc<PowerSpectrum>> {
        let mut cache = self.descriptors.lock();
        if let Some(desc) = cache.get(species) {
            return Ok(Arc::clone(desc));
        }
        let desc = Arc::new(PowerSpectrum::new(species, self.descriptor_params)?);
        debug!(species = ?species, dim = desc.dim(), "power-spectrum descriptor configured");
        cache.insert(species.clone(), Arc::clone(&desc));
        Ok(desc)
    }

    /// Number of cached descriptors.
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.lock().len()
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("latent_loaded", &self.latent.get().map(Option::is_some))
            .field("descriptor_params", &self.descriptor_params)
            .field("descriptors", &self.descriptor_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::latent::ModelError;
    use crate::structure::Structure;
    use std::sync::atomic::AtomicUsize;

    struct Zeros;

    impl LatentModel for Zeros {
        fn predict_latent(&self, _: &Structure) -> std::result::Result<Vec<f64>, ModelError> {
            Ok(vec![0.0; 128])
        }
    }

    struct CountingLoader(Arc<AtomicUsize>);

    impl LatentModelLoader for CountingLoader {
        fn load(&self, model_id: &str) -> Option<Arc<dyn LatentModel>> {
            assert_eq!(model_id, MODEL_ID);
            self.0.fetch_add(1, Ordering::SeqCst);
            Some(Arc::new(Zeros))
        }
    }

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn latent_model_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = PipelineContext::with_loader(CountingLoader(Arc::clone(&calls)));
        assert!(ctx.latent_model().is_some());
        assert!(ctx.latent_model().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_first_use_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ctx = Arc::new(PipelineContext::with_loader(CountingLoader(Arc::clone(&calls))));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ctx = Arc::clone(&ctx);
                std::thread::spawn(move || ctx.latent_model().is_some())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_context_has_no_model() {
        assert!(PipelineContext::new().latent_model().is_none());
    }

    #[test]
    fn descriptors_are_keyed_by_species_set() {
        let ctx = PipelineContext::new();
        let h = ctx.descriptor(&set(&["H"])).unwrap();
        let ho = ctx.descriptor(&set(&["H", "O"])).unwrap();
        assert_ne!(h.dim(), ho.dim());
        assert_eq!(ho.species(), &["H".to_string(), "O".to_string()]);

        let again = ctx.descriptor(&set(&["O", "H"])).unwrap();
        assert!(Arc::ptr_eq(&ho, &again));
        assert_eq!(ctx.descriptor_count(), 2);
    }
}
