mod memory;
mod traits;
mod users;

pub use memory::MemoryUserStore;
pub use traits::{StorageError, StorageResult};
pub use users::{normalize_identifier, NewUser, PostgresUserStore, User, UserPatch, UserStore, UserView};
