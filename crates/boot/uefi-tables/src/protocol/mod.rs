//! Raw protocol interfaces.
//!
//! A protocol is a function table the firmware installs on a handle under a
//! GUID. These are the `#[repr(C)]` layouts only; [`api`](crate::api) wraps
//! them.
//!
//! - [`simple_text_output`] - console output and text attributes
//! - [`simple_text_input`] - keystrokes
//! - [`simple_file_system`] - volume roots
//! - [`file`] - file handles and the information records they return

pub mod file;
pub mod simple_file_system;
pub mod simple_text_input;
pub mod simple_text_output;
