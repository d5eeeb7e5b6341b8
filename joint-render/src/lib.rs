pub mod layout;
pub mod render;
mod text;

pub use layout::Layout;
pub use render::{FrameStats, PhaseRenderer, Scene, SkiaRenderer};
