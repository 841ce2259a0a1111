mod channel;
mod error;
mod ring_byte_buffer;
mod traits;

pub use self::channel::*;
pub use self::error::{Error, ErrorClass, Result};
pub use self::ring_byte_buffer::RingByteBuffer;
pub use self::traits::Transport;
