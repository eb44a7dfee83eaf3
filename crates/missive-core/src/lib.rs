pub mod audit;
pub mod cleanup;
pub mod error;
pub mod hooks;
pub mod notify;
pub mod store;
pub mod threads;
pub mod unread;

pub use error::{Result, StoreError};
pub use hooks::{Hook, HookChain};
pub use store::Store;
pub use threads::{ThreadDepth, threaded_conversation};
pub use unread::{UnreadOrder, unread_count, unread_for_user};
