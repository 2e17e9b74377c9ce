pub mod bindings;
pub mod canvas;
pub mod surface;
#[allow(clippy::module_inception)]
pub mod view;
