// Originally derived from https://github.com/istio/ztunnel (Apache 2.0 licensed)

pub mod strng;
pub mod telemetry;

pub use strng::Strng;
