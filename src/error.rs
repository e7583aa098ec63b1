use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source `{name}` not found at {path}")]
    NotFound { name: String, path: String },
    #[error("failed to read source `{name}`: {message}")]
    Read { name: String, message: String },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to load destination `{destination}`: {message}")]
    Load { destination: String, message: String },
    #[error("failed to save destination `{destination}`: {message}")]
    Save { destination: String, message: String },
    #[error("block at {top_left} runs off destination `{destination}`")]
    OutOfBounds { destination: String, top_left: String },
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("invalid cell reference `{0}`")]
    InvalidCell(String),
    #[error("unknown table `{0}`")]
    UnknownTable(String),
    #[error("no placement for table `{0}`")]
    MissingPlacement(String),
    #[error("table `{0}` is placed more than once")]
    DuplicatePlacement(String),
    #[error("layout file unreadable: {0}")]
    Unreadable(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("row {row}: required field `{field}` is absent")]
    MalformedInput { row: usize, field: String },
    #[error("row {row}: unparseable report date `{value}`")]
    MalformedDate { row: usize, value: String },
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;
