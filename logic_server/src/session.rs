//! 每个客户端一个的会话处理器。
//!
//! 会话在客户端和服务器之间转发消息，并通过控制消息与服务器
//! 同步阶段切换：连接 -> 准备 -> 对局。会话自己从不修改游戏状态。

use logic_core::{ClientCommand, Control, Notice, Payload, PlayerId};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::mailbox::SessionMailbox;
use crate::transport::ClientLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    SettingUp,
    Playing,
    Closed,
}

pub struct Session {
    player: PlayerId,
    phase: SessionPhase,
    link: ClientLink,
    mailbox: SessionMailbox,
}

impl Session {
    pub fn new(link: ClientLink, mailbox: SessionMailbox) -> Session {
        Session { player: mailbox.player(), phase: SessionPhase::Connecting, link, mailbox }
    }

    /// 运行到游戏结束或者任意一端断开
    pub async fn run(mut self) {
        info!(player = %self.player, peer = %self.link.peer, "会话开始");
        match self.drive().await {
            Ok(()) | Err(SessionError::Dismissed) => info!(player = %self.player, "会话正常结束"),
            Err(e) => {
                warn!(player = %self.player, phase = ?self.phase, "会话中止: {e}");
                // 服务器可能已经不在了，忽略发送失败
                let _ = self.mailbox.inform_server(Payload::Control(Control::Departed));
            }
        }
        self.phase = SessionPhase::Closed;
        if let Err(e) = self.link.sink.close().await {
            debug!(player = %self.player, "关闭客户端连接失败: {e}");
        }
    }

    async fn drive(&mut self) -> Result<(), SessionError> {
        self.connect().await?;
        self.phase = SessionPhase::SettingUp;
        self.set_up().await?;
        self.phase = SessionPhase::Playing;
        self.play().await
    }

    async fn write(&mut self, notice: &Notice) -> Result<(), SessionError> {
        let line = self.link.format.render(notice);
        self.link.sink.write_line(&line).await?;
        Ok(())
    }

    /// 服务器结束了游戏，无论处在哪个阶段
    async fn farewell(&mut self) -> Result<(), SessionError> {
        self.write(&Notice::Farewell).await?;
        Err(SessionError::Dismissed)
    }

    /// 等待指定的控制消息，期间收到的可见消息照常转给客户端
    async fn expect_control(&mut self, expected: Control) -> Result<(), SessionError> {
        loop {
            let envelope = self.mailbox.listen_server().await?;
            match envelope.payload {
                Payload::Control(got) if got == expected => return Ok(()),
                Payload::Control(Control::Disconnect) => return self.farewell().await,
                Payload::Control(got) => return Err(SessionError::Handshake { expected, got }),
                Payload::Visible(notice) => self.write(&notice).await?,
            }
        }
    }

    async fn connect(&mut self) -> Result<(), SessionError> {
        self.write(&Notice::Welcome(self.player)).await?;
        self.write(&Notice::AwaitingPlayers).await?;
        self.mailbox.inform_server(Payload::Control(Control::FinishedConnecting))?;
        self.expect_control(Control::ConnectionPhaseDone).await
    }

    /// 客户端输入 done 之前，把它的每一行都转给服务器
    async fn set_up(&mut self) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                line = self.link.source.read_line() => {
                    let line = line?.ok_or(SessionError::ClientClosed)?;
                    if matches!(line.parse::<ClientCommand>(), Ok(ClientCommand::Done)) {
                        self.write(&Notice::SetupFinished).await?;
                        self.mailbox.inform_server(Payload::Control(Control::FinishedSetup))?;
                        break;
                    }
                    self.mailbox.inform_server(Payload::Visible(line))?;
                }
                envelope = self.mailbox.listen_server() => match envelope?.payload {
                    Payload::Visible(notice) => self.write(&notice).await?,
                    Payload::Control(Control::Disconnect) => return self.farewell().await,
                    Payload::Control(got) => {
                        return Err(SessionError::Handshake { expected: Control::SetupPhaseDone, got });
                    }
                },
            }
        }
        self.expect_control(Control::SetupPhaseDone).await
    }

    async fn play(&mut self) -> Result<(), SessionError> {
        loop {
            tokio::select! {
                envelope = self.mailbox.listen_server() => match envelope?.payload {
                    Payload::Visible(notice) => self.write(&notice).await?,
                    Payload::Control(Control::Disconnect) => return self.farewell().await,
                    Payload::Control(got) => {
                        return Err(SessionError::Handshake { expected: Control::Disconnect, got });
                    }
                },
                line = self.link.source.read_line() => {
                    let line = line?.ok_or(SessionError::ClientClosed)?;
                    self.mailbox.inform_server(Payload::Visible(line))?;
                }
            }
        }
    }
}
