pub mod auth;
pub mod categories;
pub mod comments;
pub mod favorites;
pub mod health;
pub mod posts;
pub mod reviews;
pub mod tags;
pub mod tasks;
pub mod users;
