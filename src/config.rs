use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::inference::ResponseShape;
use crate::model::ModelConfig;

/// Snake species recognition service.
///
/// Every option can also be set through the environment variable shown.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Maximum accepted request body, in MiB
    #[arg(long, env = "BODY_LIMIT_MB", default_value_t = 5)]
    pub body_limit_mb: usize,

    /// Frozen TensorFlow graph of the classifier
    #[arg(long, env = "MODEL_PATH", default_value = "./model/frozen_graph.pb")]
    pub model_path: PathBuf,

    /// Where to fetch the model from when `model_path` does not exist
    #[arg(long, env = "MODEL_URL")]
    pub model_url: Option<String>,

    /// Name of the graph's input operation
    #[arg(long, env = "MODEL_INPUT_OP", default_value = "x")]
    pub input_op: String,

    /// Name of the graph's output operation
    #[arg(long, env = "MODEL_OUTPUT_OP", default_value = "Identity")]
    pub output_op: String,

    /// Species enrichment table (.json or .csv)
    #[arg(long, env = "SPECIES_DB_PATH", default_value = "./snake_db.json")]
    pub species_db: PathBuf,

    /// Where to fetch the species table from when it does not exist
    #[arg(long, env = "SPECIES_DB_URL")]
    pub species_db_url: Option<String>,

    /// Response body returned by /predict
    #[arg(long, env = "RESPONSE_SHAPE", value_enum, default_value_t = ResponseShape::Top5)]
    pub response_shape: ResponseShape,
}

impl Config {
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb * 1024 * 1024
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn model(&self) -> ModelConfig {
        ModelConfig {
            model_path: self.model_path.clone(),
            input_op: self.input_op.clone(),
            output_op: self.output_op.clone(),
        }
    }
}
