//! REST-Handler Module

pub mod items;
pub mod schluessel;
pub mod signal;
