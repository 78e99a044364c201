//! Media server plumbing: endpoint URLs, the pub/sub socket with its heartbeat, stream
//! descriptors and the channel directory.

pub mod channels;
pub mod endpoint;
pub mod heartbeat;
pub mod protocol;
pub mod publisher;
pub mod socket;

pub use channels::{ChannelDirectory, ChannelInfo};
pub use endpoint::{OriginScheme, ServiceKind, ServiceOptions};
pub use heartbeat::HeartbeatKeeper;
pub use protocol::{MediaStreamState, MimeDescriptor, StreamEvent};
pub use publisher::{KeyframeSchedule, MediaPublisher, Resolution, VideoCodec};
pub use socket::{SocketEvent, SocketHandle, SocketMessage, SocketSender};
