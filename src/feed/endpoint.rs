/// Produces the WebSocket URL for the next connection attempt.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct FixedEndpoint(pub String);

impl EndpointResolver for FixedEndpoint {
    fn resolve(&self) -> String {
        self.0.clone()
    }
}

/// Scheme follows how the client is deployed: `wss` behind TLS, `ws` otherwise.
#[derive(Debug, Clone)]
pub struct DeploymentEndpoint {
    pub secure: bool,
    pub host: String,
    pub path: String,
}

impl EndpointResolver for DeploymentEndpoint {
    fn resolve(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        let host = self.host.trim().trim_end_matches('/');
        let path = self.path.trim();
        if path.is_empty() {
            format!("{}://{}", scheme, host)
        } else {
            format!("{}://{}/{}", scheme, host, path.trim_start_matches('/'))
        }
    }
}
