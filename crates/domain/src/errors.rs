use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed DNS packet: {0}")]
    Decode(String),

    #[error("Upstream timeout: {server}")]
    UpstreamTimeout { server: String },

    #[error("Upstream I/O error: {0}")]
    UpstreamIo(String),

    #[error("Upstream DoH returned HTTP {0}")]
    UpstreamHttp(u16),

    #[error("Invalid domain name: {0}")]
    InvalidDomainName(String),

    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid CIDR format: {0}")]
    InvalidCidr(String),

    #[error("Invalid upstream configuration: {0}")]
    InvalidUpstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Encode error: {0}")]
    Encode(String),
}

impl DomainError {
    /// Deadline-style failures keep their identity across retry decisions;
    /// everything else on the upstream path collapses into transport errors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, DomainError::UpstreamTimeout { .. })
    }

    pub fn is_http(&self) -> bool {
        matches!(self, DomainError::UpstreamHttp(_))
    }
}
