pub mod http_client;
pub mod renderer;
pub mod scheduler;
pub mod websocket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use http_client::ReqwestGameApi;
pub use renderer::TracingRenderer;
pub use scheduler::TokioScheduler;
pub use websocket::TungstenitePushTransport;
