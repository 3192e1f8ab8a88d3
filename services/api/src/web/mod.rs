pub mod auth;
pub mod comparison;
pub mod middleware;
pub mod projects;
pub mod rest;
pub mod state;
pub mod visits;

// Re-export what the server binary needs to build the router.
pub use middleware::require_auth;
pub use rest::ApiDoc;
pub use state::AppState;
