//! Typed entities decoded from remote documents.
//!
//! Each snapshot produces fresh values; nothing here holds on to the raw
//! document it was decoded from.

mod announcement;
mod course;
mod document;
mod message;
mod role;
mod timestamp;

pub use announcement::*;
pub use course::*;
pub use document::*;
pub use message::*;
pub use role::*;
pub use timestamp::*;
