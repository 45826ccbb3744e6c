//! Take recording and deterministic playback of tracked scene objects.

mod frame;
mod helper;
mod mesh;
mod observer;
mod plugin;
mod store;

pub use frame::*;
pub use helper::*;
pub use mesh::*;
pub use observer::*;
pub use plugin::*;
pub use store::*;
