use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MapViewError {
    #[error("invalid coordinate: ({x}, {y})")]
    InvalidCoordinate { x: f64, y: f64 },
    #[error("extent is empty or not finite")]
    DegenerateExtent,
    #[error("map surface is not initialized")]
    UninitializedSurface,
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("WebAssembly error: {0}")]
    Wasm(String),
}

impl MapViewError {
    pub fn invalid_coordinate(x: f64, y: f64) -> Self {
        Self::InvalidCoordinate { x, y }
    }
}

pub type MapViewResult<T> = Result<T, MapViewError>;
