pub mod animation;
pub mod ballistic;
pub mod config;
pub mod consts;
pub mod decoder;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod pixels;
pub mod render;
pub mod scheduler;
pub mod source;
pub mod tile;
pub mod viewer;
pub mod viewport;
