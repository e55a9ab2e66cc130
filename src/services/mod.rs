// Linkdock services
// Services provide the data-access boundary and pure helpers: the store
// contract and its two backends, URL validation, thumbnail derivation.

pub mod local_store;
pub mod rest_store;
pub mod store;
pub mod thumbnail;
pub mod validation;
