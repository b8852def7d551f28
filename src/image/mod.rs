//! Image identity: references and content digests


mod digest;
mod reference;

pub use digest::Descriptor;
pub use reference::Reference;
