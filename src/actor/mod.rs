mod single;
pub(crate) mod messages;

pub use single::{Single, SingleArgs};
pub(crate) use messages::{Start, Connect, Incoming, Disconnect, Fault, HttpRequest, Alarm, RoomResponse};
