pub mod backend;
pub mod logging;
pub mod message;

pub use backend::BackendId;
pub use message::{IdentityKey, Message};
pub use tracing;
