use std::path::PathBuf;

use ndarray::Array4;
use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};
use thiserror::Error;

use crate::error::PredictError;
use crate::labels::NUM_CLASSES;
use crate::preprocess::IMAGE_SIZE;

/// A model that maps one preprocessed image batch to raw class scores.
///
/// Implementations are shared across requests and must not need `&mut self`.
pub trait Classifier: Send + Sync {
    /// Runs a single forward pass and returns the unnormalized scores of the
    /// first (and only) batch row.
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, PredictError>;
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model_path: PathBuf,
    pub input_op: String,
    pub output_op: String,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("failed to read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tensorflow: {0}")]
    Tensorflow(String),

    #[error("operation '{0}' not found in graph")]
    MissingOperation(String),

    #[error("model has {actual} outputs but {expected} class names are defined")]
    OutputWidth { expected: usize, actual: usize },

    #[error("warm-up forward pass failed: {0}")]
    WarmUp(#[source] PredictError),
}

impl From<tensorflow::Status> for ModelError {
    fn from(status: tensorflow::Status) -> Self {
        ModelError::Tensorflow(status.to_string())
    }
}

/// Frozen TensorFlow graph of the fine-tuned backbone.
///
/// The graph is inference-only, so no gradient state is ever built. Device
/// placement is left to the linked TensorFlow runtime.
pub struct TfClassifier {
    session: Session,
    graph: Graph,
    input_op: String,
    output_op: String,
}

impl TfClassifier {
    /// Loads the graph and verifies it end to end with one warm-up pass.
    ///
    /// Any failure here is fatal for the service: without a model there is
    /// nothing to serve.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let model_bytes = std::fs::read(&config.model_path).map_err(|source| ModelError::Io {
            path: config.model_path.clone(),
            source,
        })?;

        let mut graph = Graph::new();
        graph.import_graph_def(&model_bytes, &ImportGraphDefOptions::new())?;

        let session = Session::new(&SessionOptions::new(), &graph)?;

        for name in [&config.input_op, &config.output_op] {
            if graph.operation_by_name(name)?.is_none() {
                return Err(ModelError::MissingOperation(name.clone()));
            }
        }

        let classifier = TfClassifier {
            session,
            graph,
            input_op: config.input_op.clone(),
            output_op: config.output_op.clone(),
        };
        classifier.check_output_width()?;

        tracing::info!(
            "Loaded model from {} ({} -> {})",
            config.model_path.display(),
            config.input_op,
            config.output_op
        );

        Ok(classifier)
    }

    fn check_output_width(&self) -> Result<(), ModelError> {
        let size = IMAGE_SIZE as usize;
        let blank = Array4::<f32>::zeros((1, 3, size, size));
        let scores = self.forward(&blank).map_err(ModelError::WarmUp)?;

        if scores.len() != NUM_CLASSES {
            return Err(ModelError::OutputWidth {
                expected: NUM_CLASSES,
                actual: scores.len(),
            });
        }
        Ok(())
    }

    fn operation(&self, name: &str) -> Result<tensorflow::Operation, PredictError> {
        self.graph.operation_by_name(name)?.ok_or_else(|| {
            PredictError::Inference(format!("operation '{name}' not found in graph"))
        })
    }
}

impl Classifier for TfClassifier {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, PredictError> {
        let dims: Vec<u64> = input.shape().iter().map(|&d| d as u64).collect();
        let values: Vec<f32> = input.iter().copied().collect();

        let mut input_tensor = Tensor::<f32>::new(&dims);
        input_tensor.copy_from_slice(&values);

        let input_operation = self.operation(&self.input_op)?;
        let output_operation = self.operation(&self.output_op)?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        self.session.run(&mut args)?;

        let output_tensor: Tensor<f32> = args.fetch(output_token)?;
        Ok(output_tensor.to_vec())
    }
}
