pub mod fixtures;
pub mod mock_transport;

pub use mock_transport::{MockReply, MockTransport};
