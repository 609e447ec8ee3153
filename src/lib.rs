//! Scroll-synchronized page outline.
//!
//! Loads a markdown article into an in-memory page, builds a nested outline
//! of its section headings, and keeps exactly one outline entry marked active
//! as headings scroll through the viewport. Code blocks are highlighted in a
//! light and a dark rendering, and the colour theme follows a stored
//! preference or the system setting.

pub mod config;
pub mod dom;
pub mod events;
pub mod headers;
pub mod highlight;
pub mod html;
pub mod observer;
pub mod outline;
pub mod page;
pub mod parse;
pub mod render;
pub mod theme;
