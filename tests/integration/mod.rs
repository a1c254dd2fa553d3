pub mod buffers;
pub mod session;
pub mod transport;
