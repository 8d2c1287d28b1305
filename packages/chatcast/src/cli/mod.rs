pub mod connect;
pub mod submit;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::Url;
use tokio_tungstenite::tungstenite;

pub use connect::connect_command;
pub use submit::submit_command;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }

    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}

/// Where a chatcast server lives, as an `http(s)://` base URL.
#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    base: Url,
}

impl ServerEndpoint {
    pub fn parse(base: &str) -> Result<Self> {
        let base = Url::parse(base).with_context(|| format!("Invalid server URL: {}", base))?;
        match base.scheme() {
            "http" | "https" => Ok(Self { base }),
            other => bail!("Unsupported URL scheme '{}' (expected http or https)", other),
        }
    }

    /// `ws(s)://host/ws/{client_id}`, with the id percent-encoded as one segment.
    pub fn ws_url(&self, client_id: &str) -> Result<Url> {
        let mut url = self.base.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|_| anyhow!("Cannot derive a WebSocket URL from {}", self.base))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Server URL cannot have a path: {}", self.base))?
            .pop_if_empty()
            .push("ws")
            .push(client_id);
        Ok(url)
    }

    pub fn submit_url(&self) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Server URL cannot have a path: {}", self.base))?
            .pop_if_empty()
            .push("submit");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_from_http() {
        let ep = ServerEndpoint::parse("http://127.0.0.1:8000").unwrap();
        assert_eq!(
            ep.ws_url("abc").unwrap().as_str(),
            "ws://127.0.0.1:8000/ws/abc"
        );
    }

    #[test]
    fn ws_url_from_https_with_prefix() {
        let ep = ServerEndpoint::parse("https://chat.example.com/room/").unwrap();
        assert_eq!(
            ep.ws_url("abc").unwrap().as_str(),
            "wss://chat.example.com/room/ws/abc"
        );
    }

    #[test]
    fn ws_url_encodes_client_id() {
        let ep = ServerEndpoint::parse("http://localhost:8000").unwrap();
        assert_eq!(
            ep.ws_url("a b/c").unwrap().as_str(),
            "ws://localhost:8000/ws/a%20b%2Fc"
        );
    }

    #[test]
    fn submit_url() {
        let ep = ServerEndpoint::parse("http://localhost:8000/").unwrap();
        assert_eq!(
            ep.submit_url().unwrap().as_str(),
            "http://localhost:8000/submit"
        );
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(ServerEndpoint::parse("ftp://localhost").is_err());
        assert!(ServerEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn connection_refused_is_unavailable() {
        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let err = ClientError::from_tungstenite(tungstenite::Error::Io(io));
        assert!(matches!(err, ClientError::Unavailable));

        let err = ClientError::from_tungstenite(tungstenite::Error::ConnectionClosed);
        assert!(matches!(err, ClientError::Other(_)));
    }
}
