use tokio::net::TcpStream;

use crate::transport::Io;
use crate::Error;

#[cfg(feature = "rustls")]
mod imp {
    use std::sync::{Arc, OnceLock};

    use tokio_rustls::rustls::crypto::ring;
    use tokio_rustls::rustls::pki_types::ServerName;
    use tokio_rustls::rustls::{ClientConfig, RootCertStore};
    use tokio_rustls::TlsConnector;

    use super::*;

    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

    fn config() -> Result<Arc<ClientConfig>, Error> {
        if let Some(config) = CONFIG.get() {
            return Ok(config.clone());
        }

        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let config = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(CONFIG.get_or_init(|| Arc::new(config)).clone())
    }

    pub(crate) async fn wrap(stream: TcpStream, host: &str) -> Result<Box<dyn Io>, Error> {
        let name = ServerName::try_from(host.to_string()).map_err(|e| Error::Tls(e.to_string()))?;

        let connector = TlsConnector::from(config()?);
        let stream = connector.connect(name, stream).await?;

        debug!("TLS handshake done: {}", host);

        Ok(Box::new(stream))
    }
}

#[cfg(not(feature = "rustls"))]
mod imp {
    use super::*;

    pub(crate) async fn wrap(_stream: TcpStream, _host: &str) -> Result<Box<dyn Io>, Error> {
        Err(Error::TlsUnavailable)
    }
}

pub(crate) use imp::wrap;
