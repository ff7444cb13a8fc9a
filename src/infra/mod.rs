// Infrastructure adapters for application ports

pub mod http_client;

pub use http_client::ReqwestHttp;
