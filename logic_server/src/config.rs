use std::net::SocketAddr;

use crate::error::ServerError;

pub const TCP_ADDR_VAR: &str = "LOGIC_TCP_ADDR";
pub const WS_ADDR_VAR: &str = "LOGIC_WS_ADDR";

const DEFAULT_TCP_ADDR: &str = "0.0.0.0:1337";
const DEFAULT_WS_ADDR: &str = "0.0.0.0:25917";

/// 监听地址。纯文本 TCP 给 telnet/nc 用，WebSocket 给客户端程序用。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub tcp_addr: SocketAddr,
    pub ws_addr: SocketAddr,
}

impl ServerConfig {
    pub fn from_env() -> Result<ServerConfig, ServerError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<ServerConfig, ServerError> {
        let addr = |var: &'static str, default: &str| -> Result<SocketAddr, ServerError> {
            let value = lookup(var).unwrap_or_else(|| default.to_string());
            value.parse().map_err(|_| ServerError::Config { var, value })
        };
        Ok(ServerConfig { tcp_addr: addr(TCP_ADDR_VAR, DEFAULT_TCP_ADDR)?, ws_addr: addr(WS_ADDR_VAR, DEFAULT_WS_ADDR)? })
    }
}
