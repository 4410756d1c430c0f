use std::sync::Arc;

use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;

use crate::error::PredictError;
use crate::labels::{label_for, NUM_CLASSES};
use crate::model::Classifier;
use crate::preprocess::preprocess;
use crate::species_db::SpeciesDb;

/// Which response body `/predict` assembles from the ranked classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ResponseShape {
    /// Best match plus the four runners-up, fully enriched.
    #[default]
    Top5,
    /// Best match only, with its venom status.
    Top1,
}

impl ResponseShape {
    fn k(self) -> usize {
        match self {
            ResponseShape::Top5 => 5,
            ResponseShape::Top1 => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SpeciesPrediction {
    pub species: String,
    pub scientific_name: Value,
    pub venom_status: Value,
    pub description: Value,
    pub confidence: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BestMatch {
    pub species: String,
    pub venom_status: Value,
    pub confidence: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum PredictionResponse {
    Ranked {
        main: SpeciesPrediction,
        others: Vec<SpeciesPrediction>,
    },
    Single(BestMatch),
}

/// Max-subtracted softmax over raw class scores.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Indices and values of the `k` largest probabilities, highest first.
///
/// Equal probabilities keep their index order. `k` is clamped to the input length.
pub fn top_k(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(k);
    indexed
}

pub fn format_confidence(probability: f32) -> String {
    format!("{:.2}%", f64::from(probability) * 100.0)
}

/// The whole request pipeline: decode, preprocess, forward, rank, enrich.
///
/// Built once at startup; every field is read-only afterwards.
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
    species_db: SpeciesDb,
    shape: ResponseShape,
}

impl Predictor {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        species_db: SpeciesDb,
        shape: ResponseShape,
    ) -> Self {
        Predictor {
            classifier,
            species_db,
            shape,
        }
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Runs one upload through the pipeline. Blocks for the duration of the
    /// forward pass.
    pub fn predict(&self, image_data: &[u8]) -> Result<PredictionResponse, PredictError> {
        let input = preprocess(image_data)?;
        let scores = self.classifier.forward(&input)?;

        if scores.len() != NUM_CLASSES {
            return Err(PredictError::Inference(format!(
                "model returned {} scores, expected {NUM_CLASSES}",
                scores.len()
            )));
        }

        let probabilities = softmax(&scores);
        let ranked = top_k(&probabilities, self.shape.k());
        tracing::debug!(?ranked, "ranked classes");

        match self.shape {
            ResponseShape::Top5 => {
                let mut predictions = ranked
                    .into_iter()
                    .map(|(index, probability)| self.enrich(index, probability))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter();
                let main = predictions
                    .next()
                    .ok_or_else(|| PredictError::Inference("model returned no scores".into()))?;

                Ok(PredictionResponse::Ranked {
                    main,
                    others: predictions.collect(),
                })
            }
            ResponseShape::Top1 => {
                let (index, probability) = ranked
                    .first()
                    .copied()
                    .ok_or_else(|| PredictError::Inference("model returned no scores".into()))?;
                let species = species_name(index)?;

                Ok(PredictionResponse::Single(BestMatch {
                    venom_status: self.species_db.lookup(species).venom_status(),
                    species: species.to_string(),
                    confidence: format_confidence(probability),
                }))
            }
        }
    }

    fn enrich(&self, index: usize, probability: f32) -> Result<SpeciesPrediction, PredictError> {
        let species = species_name(index)?;
        let info = self.species_db.lookup(species);

        Ok(SpeciesPrediction {
            species: species.to_string(),
            scientific_name: info.scientific_name(),
            venom_status: info.venom_status(),
            description: info.description(),
            confidence: format_confidence(probability),
        })
    }
}

fn species_name(index: usize) -> Result<&'static str, PredictError> {
    label_for(index)
        .ok_or_else(|| PredictError::Inference(format!("class index {index} has no label")))
}
