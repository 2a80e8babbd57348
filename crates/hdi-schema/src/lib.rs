//! Shared types and output format for `hdiutil` attach responses.
//!
//! `hdiutil attach -plist` prints an XML property list describing every
//! device node it created. This crate turns that document into an ordered
//! list of [`Device`] records and picks the root device used to eject the
//! whole image.

pub mod device;
pub mod response;

// Re-exports
pub use device::{Device, root_device};
pub use response::{ParseError, parse_attach_response};
