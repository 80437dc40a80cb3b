//! 服务器与会话之间的双向信箱。
//!
//! 每个会话有一条 服务器 -> 会话 的队列；所有会话 -> 服务器 的队列
//! 合并成服务器的一个收件箱。队列无界，发送永远不会阻塞。

use logic_core::{Address, Envelope, Inbound, Notice, Outbound, Payload, PlayerId, PLAYER_COUNT};
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::SessionError;

/// 服务器一端：唯一的收件箱，加上发往每个会话的发件队列
pub struct ServerMailbox {
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    outbound: [Option<mpsc::UnboundedSender<Outbound>>; PLAYER_COUNT],
}

impl Default for ServerMailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMailbox {
    pub fn new() -> ServerMailbox {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        ServerMailbox { inbound_tx, inbound_rx, outbound: Default::default() }
    }

    /// 为玩家建立一对队列，返回会话一端。
    /// 同一座位重新打开时，旧的发件队列被替换。
    pub fn open_session(&mut self, player: PlayerId) -> SessionMailbox {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outbound[player.index()] = Some(tx);
        SessionMailbox { player, to_server: self.inbound_tx.clone(), from_server: rx }
    }

    /// 阻塞等待下一条消息。服务器自己持有一个发送端，所以不会返回 None，
    /// 除非调用方已经关闭了收件箱。
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.inbound_rx.recv().await
    }

    /// 单播。对已经断开的会话什么也不做。
    pub fn send_to(&mut self, player: PlayerId, payload: Payload<Notice>) {
        self.deliver(player, Envelope::from_server(Address::Player(player), payload));
    }

    /// 广播：给每个会话各放一份
    pub fn send_to_all(&mut self, payload: Payload<Notice>) {
        for player in PlayerId::ALL {
            self.deliver(player, Envelope::from_server(Address::All, payload.clone()));
        }
    }

    /// 不再给该玩家发送任何消息
    pub fn detach(&mut self, player: PlayerId) {
        self.outbound[player.index()] = None;
    }

    pub fn is_attached(&self, player: PlayerId) -> bool {
        self.outbound[player.index()].is_some()
    }

    pub fn attached_count(&self) -> usize {
        self.outbound.iter().flatten().count()
    }

    fn deliver(&mut self, player: PlayerId, envelope: Outbound) {
        let Some(tx) = &self.outbound[player.index()] else {
            return;
        };
        if tx.send(envelope).is_err() {
            // 会话已经结束，之后的发送都跳过
            warn!(player = %player, "向玩家发送消息失败（会话已结束）");
            self.outbound[player.index()] = None;
        }
    }
}

/// 会话一端
pub struct SessionMailbox {
    player: PlayerId,
    to_server: mpsc::UnboundedSender<Inbound>,
    from_server: mpsc::UnboundedReceiver<Outbound>,
}

impl SessionMailbox {
    pub fn player(&self) -> PlayerId {
        self.player
    }

    pub fn inform_server(&self, payload: Payload<String>) -> Result<(), SessionError> {
        self.to_server
            .send(Envelope::to_server(self.player, payload))
            .map_err(|_| SessionError::ServerGone)
    }

    /// 阻塞等待服务器的下一条消息
    pub async fn listen_server(&mut self) -> Result<Outbound, SessionError> {
        self.from_server.recv().await.ok_or(SessionError::ServerGone)
    }
}
