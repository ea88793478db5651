//! Encoder registry: one encoding strategy per domain tag.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::context::PipelineContext;
use super::latent::{composition_vector, FallbackReason, LatentOutcome};
use super::tags::{DomainTag, EncoderKind};
use crate::error::{Error, Result};
use crate::structure::Structure;

/// Feature vector for one structure, with how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    /// The feature vector.
    pub features: Vec<f64>,
    /// Set when the learned-latent path fell back to the composition vector.
    pub fallback: Option<FallbackReason>,
}

/// Stacked feature matrix for a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    /// One row per structure.
    pub rows: Vec<Vec<f64>>,
    /// Number of rows produced by the fallback encoder.
    pub fallback_count: usize,
}

/// The encoder assigned to a domain tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    tag: DomainTag,
}

impl Encoder {
    /// Encoder for `tag`.
    pub fn for_tag(tag: DomainTag) -> Self {
        Self { tag }
    }

    /// Encoder for a tag given as a string; unknown tags are rejected.
    pub fn for_name(tag: &str) -> Result<Self> {
        Ok(Self::for_tag(tag.parse()?))
    }

    /// The tag this encoder serves.
    pub fn tag(&self) -> DomainTag {
        self.tag
    }

    /// Encode one structure.
    ///
    /// The local descriptor is configured for this structure's own species set.
    pub fn encode(&self, ctx: &PipelineContext, structure: &Structure) -> Result<Encoded> {
        match self.tag.encoder_kind() {
            EncoderKind::Latent => encode_latent(ctx, structure),
            EncoderKind::Descriptor => {
                let desc = ctx.descriptor(&structure.species_set())?;
                Ok(Encoded {
                    features: desc.create(structure)?,
                    fallback: None,
                })
            }
        }
    }

    /// Encode a batch into a feature matrix with a common row length.
    ///
    /// The local descriptor is configured for the union of species over the batch,
    /// so every row shares one layout.
    pub fn encode_batch(
        &self,
        ctx: &PipelineContext,
        structures: &[Structure],
    ) -> Result<EncodedBatch> {
        if structures.is_empty() {
            return Err(Error::EmptyInput);
        }
        let batch = match self.tag.encoder_kind() {
            EncoderKind::Latent => {
                let mut rows = Vec::with_capacity(structures.len());
                let mut fallback_count = 0;
                for s in structures {
                    let encoded = encode_latent(ctx, s)?;
                    if encoded.fallback.is_some() {
                        fallback_count += 1;
                    }
                    rows.push(encoded.features);
                }
                EncodedBatch {
                    rows,
                    fallback_count,
                }
            }
            EncoderKind::Descriptor => {
                let species: BTreeSet<String> =
                    structures.iter().flat_map(Structure::species_set).collect();
                let desc = ctx.descriptor(&species)?;
                let rows = structures
                    .iter()
                    .map(|s| desc.create(s))
                    .collect::<Result<Vec<_>>>()?;
                EncodedBatch {
                    rows,
                    fallback_count: 0,
                }
            }
        };
        debug!(
            tag = %self.tag,
            rows = batch.rows.len(),
            dim = batch.rows.first().map_or(0, Vec::len),
            fallbacks = batch.fallback_count,
            "encoded batch"
        );
        Ok(batch)
    }
}

fn encode_latent(ctx: &PipelineContext, structure: &Structure) -> Result<Encoded> {
    match LatentOutcome::query(ctx.latent_model(), structure) {
        LatentOutcome::Model(features) => Ok(Encoded {
            features,
            fallback: None,
        }),
        LatentOutcome::Fallback(reason) => {
            // Unavailability is reported once by the context.
            if reason != FallbackReason::ModelUnavailable {
                warn!(%reason, "latent model failed; using composition+geometry fallback");
            }
            Ok(Encoded {
                features: composition_vector(structure)?,
                fallback: Some(reason),
            })
        }
    }
}
