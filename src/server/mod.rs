pub mod api;
pub mod auth;
pub mod stream;

use log::info;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::cli::Args;
use crate::pipeline::ChatTurnPipeline;
use api::AppState;
use auth::TokenVerifier;

pub struct Server {
    addr: String,
    state: AppState,
    args: Args,
}

impl Server {
    pub fn new(
        addr: String,
        pipeline: Arc<ChatTurnPipeline>,
        verifier: Arc<dyn TokenVerifier>,
        args: Args
    ) -> Self {
        let state = AppState {
            pipeline,
            verifier,
            expose_error_details: args.expose_error_details,
        };
        Self { addr, state, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        let app = api::router(self.state.clone());

        if self.args.enable_tls {
            let (Some(cert_path), Some(key_path)) = (
                self.args.tls_cert_path.as_ref(),
                self.args.tls_key_path.as_ref(),
            ) else {
                return Err("TLS enabled but --tls-cert-path/--tls-key-path not set".into());
            };

            let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                cert_path,
                key_path
            ).await?;

            info!("Starting HTTPS server on: https://{}", addr);
            axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service()).await?;
        } else {
            info!("Starting HTTP server on: http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app.into_make_service()).await?;
        }

        Ok(())
    }
}
