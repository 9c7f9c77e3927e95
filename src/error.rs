use thiserror::Error;

#[derive(Error, Debug)]
pub enum RapitestError {
    #[error("解析错误: {0}")]
    SpecError(#[from] crate::spec::SpecError),

    #[error("HTTP 请求失败: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML 解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

// Add conversion from anyhow::Error
impl From<anyhow::Error> for RapitestError {
    fn from(err: anyhow::Error) -> Self {
        RapitestError::Other(err.to_string())
    }
}

/// Result type for rapitest crate
pub type Result<T> = std::result::Result<T, RapitestError>;
