//! Staff-chat threads (forum topics) that mirror ticket state.

mod http;
mod synchronizer;
mod traits;

pub use http::HttpThreadApi;
pub use synchronizer::ThreadSynchronizer;
pub use traits::{ThreadApi, ThreadApiError};
