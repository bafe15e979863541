pub mod forward;
pub mod routes;
pub mod upload;
