mod backend;
mod rest;

pub use backend::{unwrap_page, BackendClient, TokenProvider};
pub use rest::RestClient;

#[cfg(test)]
pub(crate) mod testing;
