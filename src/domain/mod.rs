pub mod notification;
pub mod post;
pub mod trending;
pub mod user;
