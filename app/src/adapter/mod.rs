pub mod http_api;
pub mod mqtt;
