mod render;

pub use render::run_render;
