//! NHL web API feed (`api-web.nhle.com`).

mod client;
mod models;

pub use self::client::NhlFeed;
