pub mod commands;
pub mod executor;
pub mod memory;
pub mod scripts;

pub use commands::{MutationCommand, PatchGuard, PatchOperation, SchemaPayload};
pub use executor::{DocumentStore, RedisStore};
pub use memory::MemoryStore;
