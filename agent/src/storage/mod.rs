//! Agent storage

pub mod layout;
pub mod settings;
