pub mod chart;
pub mod render;
pub mod text;

pub use chart::ChartGeometry;
pub use render::{FrameStats, FrameView, Layout, SkiaRenderer};
pub use text::{Anchor, TextStyle, Typesetter, load_font};
