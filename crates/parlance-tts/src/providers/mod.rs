pub mod espeak;
pub mod http;

pub use espeak::EspeakProvider;
pub use http::{HttpTtsConfig, HttpTtsProvider};
