//! Host program model: types, annotations and elements
//!
//! The processor never inspects source text. It sees the program through
//! [`ProgramModel`], and every structure here compares structurally so that
//! keys built from two different occurrences of the same type are equal.

mod annotation;
mod element;
mod program;
mod types;

pub use annotation::*;
pub use element::*;
pub use program::*;
pub use types::*;
