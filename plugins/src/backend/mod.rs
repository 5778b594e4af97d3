mod http;
mod sse;

pub use http::HttpGenerationBackend;
