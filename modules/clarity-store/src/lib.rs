pub mod keys;
pub mod models;
pub mod pg;
pub mod traits;
pub mod vault;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use keys::KeyCache;
pub use models::*;
pub use pg::PgStore;
pub use traits::{ContactStore, KeyStore, MemoryStore, NewsStore, SubscriptionStore};
pub use vault::{KeyRef, Opened, Vault};
