//! Content streams, upload size enforcement and the lazy read proxy.
//!
//! Content never sits in memory as a whole: uploads are passed to the store
//! as a stream wrapped in a byte counter, and reads hand out a proxy that
//! only contacts the store once the caller starts pulling bytes.

mod lazy;
mod size;
mod stream;

#[cfg(test)]
mod size_props;

pub use lazy::{LazyContent, verify_status};
pub use size::{CountingStream, SizeGuard, parse_size};
pub use stream::{ByteStream, Content};
