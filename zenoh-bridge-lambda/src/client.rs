//! Modbus TCP access to the heat pump.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{debug, info, warn};

/// Error type for register reads.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection to {addr} failed: {message}")]
    Connection { addr: String, message: String },
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transport failure: {0}")]
    Io(String),
    #[error("Device exception: {0}")]
    Exception(String),
}

/// Request/response access to holding registers.
///
/// Implemented by [`ModbusTcpClient`] for the real device and by scripted
/// clients in tests.
pub trait RegisterClient: Send {
    /// Establish the connection.
    fn connect(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Read `count` holding registers starting at `address`.
    fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, TransportError>> + Send;

    /// Close the connection, if open.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Modbus TCP client for a single heat pump.
///
/// Holds one connection that is reused for every read. A timeout or
/// transport failure drops it; the next read reconnects.
pub struct ModbusTcpClient {
    host: String,
    port: u16,
    unit_id: u8,
    timeout: Duration,
    ctx: Option<Context>,
}

impl ModbusTcpClient {
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            timeout,
            ctx: None,
        }
    }

    /// `host:port` of the heat pump.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_some()
    }

    fn connection_error(&self, message: impl Into<String>) -> TransportError {
        TransportError::Connection {
            addr: self.endpoint(),
            message: message.into(),
        }
    }

    /// Resolve `endpoint` and connect within `timeout`.
    ///
    /// Takes owned arguments so the future does not borrow the client.
    async fn open(
        endpoint: String,
        unit_id: u8,
        timeout: Duration,
    ) -> Result<Context, TransportError> {
        let failed = |message: String| TransportError::Connection {
            addr: endpoint.clone(),
            message,
        };

        let addr = tokio::net::lookup_host(endpoint.as_str())
            .await
            .map_err(|e| failed(format!("Invalid address: {}", e)))?
            .next()
            .ok_or_else(|| failed("Address did not resolve".to_string()))?;

        tokio::time::timeout(timeout, tcp::connect_slave(addr, Slave(unit_id)))
            .await
            .map_err(|_| failed("Connection timeout".to_string()))?
            .map_err(|e| failed(e.to_string()))
    }
}

impl RegisterClient for ModbusTcpClient {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.ctx.is_none() {
            let ctx = Self::open(self.endpoint(), self.unit_id, self.timeout).await?;
            self.ctx = Some(ctx);
            info!(endpoint = %self.endpoint(), unit_id = self.unit_id, "Modbus connected");
        }
        Ok(())
    }

    async fn read_holding_registers(
        &mut self,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, TransportError> {
        if self.ctx.is_none() {
            debug!(endpoint = %self.endpoint(), "Reconnecting to heat pump");
            self.connect().await?;
        }
        let timeout = self.timeout;
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(self.connection_error("Not connected"));
        };

        let result = tokio::time::timeout(timeout, ctx.read_holding_registers(address, count)).await;

        match result {
            Ok(Ok(Ok(words))) => Ok(words),
            Ok(Ok(Err(exception))) => Err(TransportError::Exception(format!("{:?}", exception))),
            Ok(Err(e)) => {
                warn!(endpoint = %self.endpoint(), error = %e, "Dropping Modbus connection");
                self.ctx = None;
                Err(TransportError::Io(e.to_string()))
            }
            Err(_) => {
                warn!(endpoint = %self.endpoint(), "Modbus request timed out, dropping connection");
                self.ctx = None;
                Err(TransportError::Timeout(timeout))
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                debug!(error = %e, "Error closing Modbus connection");
            }
            info!(endpoint = %self.endpoint(), "Modbus connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = ModbusTcpClient::new("192.168.1.50", 502, 1, Duration::from_secs(3));
        assert_eq!(client.endpoint(), "192.168.1.50:502");
        assert!(!client.is_connected());
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_client_futures_are_send() {
        let mut client = ModbusTcpClient::new("192.168.1.50", 502, 1, Duration::from_secs(3));
        assert_send(client.connect());
        assert_send(client.read_holding_registers(1003, 1));
        assert_send(client.close());
        assert_send(ModbusTcpClient::open(client.endpoint(), 1, Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop a listener so the port is very likely closed.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = ModbusTcpClient::new("127.0.0.1", port, 1, Duration::from_millis(500));
        let result = client.connect().await;

        assert!(matches!(result, Err(TransportError::Connection { .. })));
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_read_without_device_fails_cleanly() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = ModbusTcpClient::new("127.0.0.1", port, 1, Duration::from_millis(500));
        assert!(client.read_holding_registers(1003, 1).await.is_err());
        client.close().await;
    }
}
