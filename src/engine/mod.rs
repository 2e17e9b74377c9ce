pub mod camera;
pub mod drag;
pub mod draw;
pub mod events;
pub mod geometry;
pub mod picker;
pub mod registry;
pub mod renderer;
pub mod style;
pub mod tiles;
pub mod transforms;
