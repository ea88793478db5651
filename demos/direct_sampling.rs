//! DIRECT sampling of strained Li cells, then a static DFT flow for the picks.

use direct_sampler::dft::{QueueAdapterFactory, SinglePointFlowMaker};
use direct_sampler::{DirectSampler, DomainTag, Lattice, Structure};
use tracing_subscriber::EnvFilter;

fn main() -> direct_sampler::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Three families of cells around 3.5, 4.0 and 4.5 Å.
    let mut structures = Vec::new();
    for base in [3.5, 4.0, 4.5] {
        for i in 0..20 {
            let a = base + 0.002 * i as f64;
            structures.push(Structure::periodic(
                Lattice::cubic(a),
                ["Li", "Li"],
                &[[0.0; 3], [0.5, 0.5, 0.5]],
            )?);
        }
    }

    let report = DirectSampler::new(DomainTag::Battery)
        .with_k(2)
        .with_seed(0)
        .sample_report(&structures, 6)?;

    println!("=== DIRECT (battery, budget 6, k 2) ===");
    println!(
        "  features {} -> components {}; clusters requested {}, formed {}",
        report.feature_dim,
        report.n_components,
        report.n_clusters_requested,
        report.n_clusters_formed
    );
    println!("  fallback encodings: {}", report.fallback_encodings);
    for &i in &report.indices {
        let v = structures[i].volume().unwrap_or(0.0);
        println!("  structure {:2}  volume {:7.3}", i, v);
    }

    let launch = concat!(env!("CARGO_MANIFEST_DIR"), "/launch");
    let factory = QueueAdapterFactory::from_launch_dir(launch);
    let flow = SinglePointFlowMaker::new().make_selected(&factory, &structures, &report.indices)?;
    println!("\n=== {} on {} ===", flow.name, flow.queue_adapter);
    for job in &flow.jobs {
        println!("  {} <- structure {}", job.name, job.index);
    }
    Ok(())
}
