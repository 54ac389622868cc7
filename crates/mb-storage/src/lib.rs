pub mod error;
pub mod fs;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod serializer;
pub mod service;

pub use error::{StorageError, StorageResult};
pub use fs::FsStorage;
pub use gateway::{LAST_ACTIVE_CANVAS, PersistenceGateway};
pub use http::HttpStorage;
pub use memory::{MemoryStorage, WriteRecord};
pub use serializer::{KeyedSerializer, normalize_key};
pub use service::{
    CanvasMeta, CanvasPaths, DEFAULT_CANVAS, StorageLayout, StorageService, safe_canvas_name,
};
