//! Error types for map rendering

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid map layout: {0}")]
    Layout(String),

    #[error("SVG parse error: {0}")]
    Svg(String),

    #[error("PNG encoding error: {0}")]
    Png(String),

    #[error(transparent)]
    Core(#[from] burnline_core::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
