//! Concrete consumer channels

pub mod memory;
pub mod stream;

pub use memory::MemoryChannel;
pub use stream::{LineWriter, StreamChannel};
