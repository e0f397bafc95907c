pub mod category;
pub mod comment;
pub mod favorite;
pub mod post;
pub mod review;
pub mod tag;
pub mod task;
pub mod user;
