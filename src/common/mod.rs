mod deadline;
mod peer_id;
mod provider_info;

pub(crate) use deadline::deadline_after;
pub use peer_id::*;
pub use provider_info::*;
