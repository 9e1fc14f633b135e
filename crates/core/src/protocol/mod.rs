//! Wire protocol: one JSON document per text frame

mod codec;

pub use codec::{MessageCodec, MAX_MESSAGE_SIZE};

/// Close reason sent with a normal close when the server ends a session
///
/// Any other close (no frame, or another code) only drops the socket; the
/// session waits for the client to reconnect.
pub const CLOSE_SESSION_ENDED: &str = "session ended";
