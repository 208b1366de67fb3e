pub mod api;

pub use self::api::{ router, ApiError, AppState };

use log::info;
use std::error::Error;
use std::net::SocketAddr;

pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: String, state: AppState) -> Self {
        Self { addr, state }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("HTTP server listening on: http://{}", addr);
        info!("Routes: POST /chat (text/event-stream), GET /health");

        axum::serve(listener, router(self.state.clone())).await?;

        Ok(())
    }
}
