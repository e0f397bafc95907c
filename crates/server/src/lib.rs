pub mod error;
pub mod http;
pub mod middleware;
pub mod password;
pub mod routes;
pub mod startup;
pub mod state;
pub mod uploads;

#[cfg(test)]
pub mod test_app;

pub use state::AppState;
