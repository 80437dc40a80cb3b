//! 接收连接并把它们排队交给游戏服务器。
//!
//! TCP 和 WebSocket 两个入口共用一条到达队列。游戏服务器凑齐四人后
//! 关闭队列，之后的连接会收到一句人满提示然后被关闭。

use std::net::SocketAddr;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use logic_core::{Board, Notice, Outcome};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::GameServer;
use crate::transport::ClientLink;

pub type Arrivals = mpsc::Sender<ClientLink>;

/// 绑定两个监听地址，跑完一局游戏
pub async fn serve(config: ServerConfig) -> Result<Outcome, ServerError> {
    let tcp = TcpListener::bind(config.tcp_addr).await?;
    let ws = TcpListener::bind(config.ws_addr).await?;
    info!("TCP 监听: {}", tcp.local_addr()?);
    info!("WebSocket 监听: ws://{}/ws", ws.local_addr()?);

    let (arrivals, arrivals_rx) = mpsc::channel(1);
    let server = GameServer::new(Board::deal());
    info!(game = %server.game_id(), "新的一局游戏");

    let tcp_task = tokio::spawn(accept_tcp(tcp, arrivals.clone()));
    let app = Router::new().route("/ws", get(websocket_handler)).with_state(arrivals);
    let ws_task = tokio::spawn(async move {
        if let Err(e) = axum::serve(ws, app.into_make_service_with_connect_info::<SocketAddr>()).await {
            error!("WebSocket 服务出错: {e}");
        }
    });

    let outcome = server.run(arrivals_rx).await;
    tcp_task.abort();
    ws_task.abort();
    outcome
}

async fn accept_tcp(listener: TcpListener, arrivals: Arrivals) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!(%peer, "新的 TCP 连接");
                admit(&arrivals, ClientLink::tcp(stream, peer)).await;
            }
            Err(e) => warn!("接受 TCP 连接失败: {e}"),
        }
    }
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(arrivals): State<Arrivals>,
) -> impl IntoResponse {
    info!(%peer, "新的 WebSocket 连接");
    ws.on_upgrade(move |socket| async move { admit(&arrivals, ClientLink::websocket(socket, peer)).await })
}

/// 把连接交给游戏服务器；座位已满就告知对方并关闭
async fn admit(arrivals: &Arrivals, link: ClientLink) {
    if let Err(mpsc::error::SendError(mut link)) = arrivals.send(link).await {
        info!(peer = %link.peer, "游戏已满，拒绝连接");
        let _ = link.sink.write_line(&Notice::GameFull.to_string()).await;
        let _ = link.sink.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_late_arrival_is_told_game_is_full() {
        let (arrivals, arrivals_rx) = mpsc::channel(1);
        drop(arrivals_rx);

        let (link, mut client) = ClientLink::local();
        admit(&arrivals, link).await;
        assert_eq!(client.recv_line().await, Some("The game is full. Goodbye.".to_string()));
        assert_eq!(client.recv_line().await, None);
    }

    #[tokio::test]
    async fn test_arrival_is_queued_while_open() {
        let (arrivals, mut arrivals_rx) = mpsc::channel(1);
        let (link, _client) = ClientLink::local();
        admit(&arrivals, link).await;
        let queued = arrivals_rx.recv().await.unwrap();
        assert_eq!(queued.peer, "local");
    }
}
