use std::path::PathBuf;

use thiserror::Error;

/// Library error type for carousel operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The catalog holds no records yet (before the first scan, or after an
    /// empty one).
    #[error("no photos in catalog")]
    EmptyCatalog,

    /// The requested position lies outside the catalog bounds.
    #[error("position {position} out of range for catalog of {len}")]
    OutOfRange { position: usize, len: usize },

    /// Every record in the catalog is currently excluded.
    #[error("all photos are excluded")]
    AllExcluded,

    /// The backing file vanished between scan and read.
    #[error("photo file missing: {}", .0.display())]
    NotFound(PathBuf),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Decode/encode error while mutating an image on disk.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// JSON error from list persistence.
    #[error(transparent)]
    Persist(#[from] serde_json::Error),
}
