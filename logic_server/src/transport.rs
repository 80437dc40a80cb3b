//! 面向行的客户端连接。
//!
//! 会话处理器只关心“读一行”和“写一行”，具体是 TCP、WebSocket
//! 还是进程内的测试客户端由这里的实现决定。

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use logic_core::Notice;

#[async_trait]
pub trait LineSource: Send {
    /// 读取下一行。`Ok(None)` 表示客户端已经关闭连接。
    async fn read_line(&mut self) -> io::Result<Option<String>>;
}

#[async_trait]
pub trait LineSink: Send {
    async fn write_line(&mut self, line: &str) -> io::Result<()>;
    async fn close(&mut self) -> io::Result<()>;
}

/// 写给客户端的文本格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineFormat {
    /// 给人看的完整文本
    #[default]
    Text,
    /// 自动玩家用的紧凑格式；没有紧凑格式的通知仍然发完整文本
    Machine,
}

impl LineFormat {
    pub fn render(self, notice: &Notice) -> String {
        match self {
            LineFormat::Text => notice.to_string(),
            LineFormat::Machine => notice.machine_line().unwrap_or_else(|| notice.to_string()),
        }
    }
}

/// 一个客户端连接的读写两半
pub struct ClientLink {
    pub peer: String,
    pub format: LineFormat,
    pub source: Box<dyn LineSource>,
    pub sink: Box<dyn LineSink>,
}

impl ClientLink {
    pub fn tcp(stream: TcpStream, peer: SocketAddr) -> ClientLink {
        let (read, write) = stream.into_split();
        ClientLink {
            peer: peer.to_string(),
            format: LineFormat::Text,
            source: Box::new(TcpSource { lines: BufReader::new(read).lines() }),
            sink: Box::new(TcpSink { write }),
        }
    }

    pub fn websocket(socket: WebSocket, peer: SocketAddr) -> ClientLink {
        let (sink, stream) = socket.split();
        ClientLink {
            peer: format!("ws://{peer}"),
            format: LineFormat::Text,
            source: Box::new(WsSource { stream }),
            sink: Box::new(WsSink { sink }),
        }
    }

    /// 进程内连接，另一端交给调用方
    pub fn local() -> (ClientLink, LocalClient) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let link = ClientLink {
            peer: "local".to_string(),
            format: LineFormat::Text,
            source: Box::new(LocalSource { lines: line_rx }),
            sink: Box::new(LocalSink { replies: Some(reply_tx) }),
        };
        (link, LocalClient { lines: line_tx, replies: reply_rx })
    }

    /// 标记为自动玩家的连接，之后收到的通知使用紧凑格式
    pub fn automated(mut self) -> ClientLink {
        self.format = LineFormat::Machine;
        self
    }
}

// --- TCP ---

struct TcpSource {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

#[async_trait]
impl LineSource for TcpSource {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        // next_line 是取消安全的，可以放进 select!
        self.lines.next_line().await
    }
}

struct TcpSink {
    write: OwnedWriteHalf,
}

#[async_trait]
impl LineSink for TcpSink {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write.write_all(line.as_bytes()).await?;
        self.write.write_all(b"\n").await?;
        self.write.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.write.shutdown().await
    }
}

// --- WebSocket ---

struct WsSource {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl LineSource for WsSource {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        while let Some(msg) = self.stream.next().await {
            match msg.map_err(io::Error::other)? {
                Message::Text(text) => return Ok(Some(text.as_str().trim_end_matches(['\r', '\n']).to_string())),
                Message::Close(_) => return Ok(None),
                // ping/pong 由 axum 处理，二进制帧忽略
                _ => continue,
            }
        }
        Ok(None)
    }
}

struct WsSink {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl LineSink for WsSink {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.sink.send(Message::Text(line.to_string().into())).await.map_err(io::Error::other)
    }

    async fn close(&mut self) -> io::Result<()> {
        self.sink.close().await.map_err(io::Error::other)
    }
}

// --- 进程内 ---

struct LocalSource {
    lines: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl LineSource for LocalSource {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.recv().await)
    }
}

struct LocalSink {
    replies: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl LineSink for LocalSink {
    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let replies = self.replies.as_ref().ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        replies.send(line.to_string()).map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))
    }

    async fn close(&mut self) -> io::Result<()> {
        self.replies = None;
        Ok(())
    }
}

/// 进程内客户端：测试和嵌入时代替一个真实的网络连接。
/// 丢弃它就相当于客户端挂断。
pub struct LocalClient {
    lines: mpsc::UnboundedSender<String>,
    replies: mpsc::UnboundedReceiver<String>,
}

impl LocalClient {
    /// 会话已经结束时返回 false
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.lines.send(line.into()).is_ok()
    }

    /// 服务器发来的下一段文本；连接被关闭后返回 None
    pub async fn recv_line(&mut self) -> Option<String> {
        self.replies.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_link_carries_lines_both_ways() {
        let (mut link, mut client) = ClientLink::local();
        assert!(client.send_line("view"));
        assert_eq!(link.source.read_line().await.unwrap(), Some("view".to_string()));

        link.sink.write_line("Player 2 to pass.").await.unwrap();
        assert_eq!(client.recv_line().await, Some("Player 2 to pass.".to_string()));
    }

    #[test]
    fn test_line_format() {
        let turn = Notice::Turn { player: logic_core::PlayerId::new(2).unwrap(), status: logic_core::TurnStatus::Pass };
        assert_eq!(LineFormat::Text.render(&turn), "Player 2 to pass.");
        assert_eq!(LineFormat::Machine.render(&turn), "topass 2");
        // 没有紧凑格式的通知照常发文本
        assert_eq!(LineFormat::Machine.render(&Notice::AlreadyVisible), "You can already see that card.");
    }

    #[tokio::test]
    async fn test_local_link_close_and_hangup() {
        let (mut link, mut client) = ClientLink::local();
        link.sink.close().await.unwrap();
        assert_eq!(client.recv_line().await, None);
        assert!(link.sink.write_line("late").await.is_err());

        drop(client);
        assert_eq!(link.source.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tcp_link_reads_and_writes_lines() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"swap 3\r\ndone\n").await.unwrap();
            let mut reply = BufReader::new(stream).lines();
            reply.next_line().await.unwrap()
        });

        let (stream, peer) = listener.accept().await.unwrap();
        let mut link = ClientLink::tcp(stream, peer);
        // Lines 会去掉行尾的 \r\n
        assert_eq!(link.source.read_line().await.unwrap(), Some("swap 3".to_string()));
        assert_eq!(link.source.read_line().await.unwrap(), Some("done".to_string()));
        link.sink.write_line("Yay!").await.unwrap();
        link.sink.close().await.unwrap();

        assert_eq!(client.await.unwrap(), Some("Yay!".to_string()));
    }
}
