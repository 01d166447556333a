use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Matrix dimensions mismatch: {left_rows}x{left_cols} * {right_rows}x{right_cols}")]
    DimensionMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },
    #[error("Graph store is not initialized")]
    NotInitialized,
    #[error("Ingestion failed: {0}")]
    IngestionFailure(String),
    #[error("Duplicate segment id {id} in {collection} collection")]
    DuplicateSegment { collection: &'static str, id: u32 },
    #[error(
        "Write failed in chunk {failed_chunk} after {committed_chunks} committed chunks \
         ({committed_rows} rows): {reason}"
    )]
    WriteFailure {
        committed_chunks: usize,
        committed_rows: usize,
        failed_chunk: usize,
        reason: String,
    },
    #[error("Write interrupted after {committed_chunks} committed chunks ({committed_rows} rows)")]
    Interrupted {
        committed_chunks: usize,
        committed_rows: usize,
    },
    #[error("Pipeline aborted at step '{step}': {source}")]
    PipelineAborted {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
}

impl From<geojson::Error> for Error {
    fn from(err: geojson::Error) -> Self {
        Error::GeoJsonError(err.to_string())
    }
}
