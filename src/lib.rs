pub mod compatibility;
pub mod context;
pub mod dek;
pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod lock;
pub mod parser;
pub mod policy;
pub mod registry;
pub mod settings;
pub mod store;
pub mod subject;
pub mod telemetry;
pub mod types;

pub use error::{Error, ErrorCode};
pub type Result<T> = std::result::Result<T, Error>;

pub use registry::SchemaRegistryCore;
pub use settings::Settings;
pub use store::memory::MemoryStore;
pub use store::Store;
