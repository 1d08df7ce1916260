//! Public HTTP surface

pub mod routes;

pub use routes::public_router;
