use thiserror::Error;
#[derive(Debug, Error)]
pub enum BenchError {
    #[error("canvas dimensions must be non-zero, got {width}x{height}")]
    InvalidCanvas { width: u32, height: u32 },
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
    #[error("failed to render panel: {0}")]
    Plot(String),
}
impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for BenchError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        BenchError::Plot(format!("{value:?}"))
    }
}
impl From<image::ImageError> for BenchError {
    fn from(value: image::ImageError) -> Self {
        BenchError::Plot(value.to_string())
    }
}
