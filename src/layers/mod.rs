pub mod attributes;
pub mod base;
pub mod circle;
pub mod image;
pub mod macros;
pub mod manager;
pub mod marker;
pub mod polygon;
pub mod route;
