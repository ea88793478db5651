use std::sync::Arc;

use direct_sampler::dft::{QueueAdapterFactory, QueueRoute, SinglePointFlowMaker};
use direct_sampler::sampling::{
    LatentModel, LatentModelLoader, ModelError, PipelineContext, LATENT_DIM, MODEL_ID,
};
use direct_sampler::{sample_direct, DirectSampler, DomainTag, Error, Lattice, Structure};

fn li_cells() -> Vec<Structure> {
    (0..100)
        .map(|i| {
            let a = 3.5 + 0.01 * i as f64;
            Structure::periodic(Lattice::cubic(a), ["Li"], &[[0.0; 3]]).unwrap()
        })
        .collect()
}

/// Latent model exposing the cell volume along two axes.
struct VolumeModel;

impl LatentModel for VolumeModel {
    fn predict_latent(&self, structure: &Structure) -> Result<Vec<f64>, ModelError> {
        let v = structure.volume().unwrap_or(0.0);
        let mut out = vec![0.0; LATENT_DIM];
        out[0] = v;
        out[1] = v.sqrt();
        Ok(out)
    }
}

/// Latent model returning vectors of the wrong length.
struct TruncatedModel;

impl LatentModel for TruncatedModel {
    fn predict_latent(&self, _structure: &Structure) -> Result<Vec<f64>, ModelError> {
        Ok(vec![1.0; 3])
    }
}

struct Fixed(Arc<dyn LatentModel>);

impl LatentModelLoader for Fixed {
    fn load(&self, model_id: &str) -> Option<Arc<dyn LatentModel>> {
        assert_eq!(model_id, MODEL_ID);
        Some(Arc::clone(&self.0))
    }
}

fn context_with(model: impl LatentModel + 'static) -> Arc<PipelineContext> {
    Arc::new(PipelineContext::with_loader(Fixed(Arc::new(model))))
}

#[test]
fn battery_budget_twenty() {
    let structures = li_cells();
    let first = sample_direct(&structures, "battery", 20, 1, 0).unwrap();
    let second = sample_direct(&structures, "battery", 20, 1, 0).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 20);
    assert!(first.windows(2).all(|w| w[0] < w[1]));
    assert!(first.iter().all(|&i| i < structures.len()));
}

#[test]
fn unknown_tag_is_rejected() {
    let err = sample_direct(&li_cells(), "alloys", 10, 1, 0).unwrap_err();
    assert!(matches!(err, Error::UnknownTag { .. }));
    assert!(err.to_string().contains("battery"));
}

#[test]
fn zero_k_is_rejected() {
    assert!(matches!(
        sample_direct(&li_cells(), "battery", 10, 0, 0),
        Err(Error::InvalidParameter { name: "k", .. })
    ));
}

#[test]
fn empty_input_is_rejected() {
    assert!(matches!(
        sample_direct(&[], "battery", 10, 1, 0),
        Err(Error::EmptyInput)
    ));
}

#[test]
fn non_finite_cell_is_rejected() {
    for position in [0, 99] {
        let mut structures = li_cells();
        structures[position] =
            Structure::periodic(Lattice::cubic(f64::NAN), ["Li"], &[[0.0; 3]]).unwrap();
        let result = DirectSampler::new(DomainTag::Battery)
            .with_context(Arc::new(PipelineContext::new()))
            .sample(&structures, 20);
        assert!(matches!(
            result,
            Err(Error::InvalidParameter { name: "data", .. })
        ));
    }
}

#[test]
fn fallback_is_deterministic_and_reported() {
    let structures = li_cells();
    let run = || {
        DirectSampler::new(DomainTag::Battery)
            .with_context(Arc::new(PipelineContext::new()))
            .with_seed(7)
            .sample_report(&structures, 20)
            .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a, b);
    assert_eq!(a.fallback_encodings, structures.len());
}

#[test]
fn malformed_latents_fall_back_to_the_same_selection() {
    let structures = li_cells();
    let without_model = DirectSampler::new(DomainTag::Battery)
        .with_context(Arc::new(PipelineContext::new()))
        .sample_report(&structures, 20)
        .unwrap();
    let truncated = DirectSampler::new(DomainTag::Battery)
        .with_context(context_with(TruncatedModel))
        .sample_report(&structures, 20)
        .unwrap();

    assert_eq!(truncated.fallback_encodings, structures.len());
    assert_eq!(truncated.indices, without_model.indices);
}

#[test]
fn injected_model_is_used() {
    let structures = li_cells();
    let report = DirectSampler::new(DomainTag::PolarPerovskite)
        .with_context(context_with(VolumeModel))
        .sample_report(&structures, 10)
        .unwrap();

    assert_eq!(report.fallback_encodings, 0);
    assert_eq!(report.feature_dim, LATENT_DIM);
    assert_eq!(report.n_clusters_requested, 10);
    assert!(!report.indices.is_empty());
    assert!(report.indices.len() <= 10);
    assert!(report.indices.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn k_larger_than_one_returns_k_per_cluster() {
    let structures = li_cells();
    let report = DirectSampler::new(DomainTag::Battery)
        .with_context(Arc::new(PipelineContext::new()))
        .with_k(2)
        .sample_report(&structures, 20)
        .unwrap();

    assert_eq!(report.n_clusters_requested, 10);
    assert_eq!(report.indices.len(), 2 * report.n_clusters_formed);
    assert!(report.indices.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn molecules_use_the_descriptor() {
    let structures: Vec<Structure> = (0..12)
        .map(|i| {
            let d = 0.9 + 0.05 * i as f64;
            Structure::molecule(["O", "H", "H"], &[[0.0; 3], [d, 0.0, 0.0], [0.0, d, 0.0]]).unwrap()
        })
        .collect();

    let report = DirectSampler::new(DomainTag::Electrolyte)
        .with_context(Arc::new(PipelineContext::new()))
        .sample_report(&structures, 4)
        .unwrap();

    assert_eq!(report.fallback_encodings, 0);
    assert!(!report.indices.is_empty());
    assert!(report.indices.len() <= 4);
}

#[test]
fn selection_feeds_a_static_flow() {
    let structures = li_cells();
    let picked = DirectSampler::new(DomainTag::Battery)
        .with_context(Arc::new(PipelineContext::new()))
        .sample(&structures, 5)
        .unwrap();

    let factory = QueueAdapterFactory::stub();
    let flow = SinglePointFlowMaker::new()
        .make_selected(&factory, &structures, &picked)
        .unwrap();

    assert_eq!(flow.jobs.len(), picked.len());
    assert_eq!(flow.queue_adapter.route(), QueueRoute::Slurm);
    for (job, &i) in flow.jobs.iter().zip(&picked) {
        assert_eq!(job.index, i);
        assert_eq!(job.structure, structures[i]);
    }
}
