pub type ChartResult<T> = Result<T, ChartError>;

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("load error: {0}")]
    Load(String),

    #[error("geography error: {0}")]
    Geo(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ChartError {
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    pub fn geo(msg: impl Into<String>) -> Self {
        Self::Geo(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
