pub mod file_source;
pub mod http_client;

pub use file_source::FileDocumentSource;
pub use http_client::ReqwestHttp;
