pub mod memory_store;
pub mod pg_store;
pub mod store;

pub use memory_store::MemoryEntityStore;
pub use pg_store::PgEntityStore;
pub use store::{Change, ChangeSet, EntityStore, SharedStore, TaskFilter, UserFilter, WeaponFilter};
