pub mod image_host;
pub mod repositories;
