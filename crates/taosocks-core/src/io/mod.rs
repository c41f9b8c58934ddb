//! Stream adapters shared by the tunnel transport and the front-end decoders.

mod prefixed;

pub use prefixed::PrefixedStream;
