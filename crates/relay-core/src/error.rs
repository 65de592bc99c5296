use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("home context is closed")]
    HomeClosed,
    #[error("failed to spawn worker lane: {0}")]
    LaneSpawn(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::LaneSpawn(e.to_string())
    }
}
