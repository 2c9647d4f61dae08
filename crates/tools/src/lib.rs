//! Scene replay support for the `declutter` binary.

pub mod badge;
pub mod scene;
