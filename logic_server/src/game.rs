//! 游戏服务器：唯一修改游戏状态的任务。
//!
//! 所有会话的消息汇集到同一个收件箱，按到达顺序逐条处理，
//! 所以不需要任何锁。

use logic_core::{
    begin_main_play, begin_setup, finish_setup, handle_line, setup_complete, Address, Board, Control, GameId,
    GamePhase, GameState, Inbound, Notice, Outcome, Outgoing, Payload, PlayerId, PLAYER_COUNT,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::error::ServerError;
use crate::mailbox::ServerMailbox;
use crate::session::Session;
use crate::transport::ClientLink;

pub struct GameServer {
    state: GameState,
    mailbox: ServerMailbox,
    sessions: Vec<JoinHandle<()>>,
}

impl GameServer {
    pub fn new(board: Board) -> GameServer {
        GameServer { state: GameState::new(board), mailbox: ServerMailbox::new(), sessions: Vec::new() }
    }

    pub fn game_id(&self) -> GameId {
        self.state.game_id
    }

    /// 从 `arrivals` 依次接纳四名玩家，然后把整局游戏跑完。
    /// 返回前会等所有会话向客户端道别。
    pub async fn run(mut self, arrivals: mpsc::Receiver<ClientLink>) -> Result<Outcome, ServerError> {
        let span = info_span!("game", id = %self.state.game_id);
        async move {
            let result = self.play_out(arrivals).await;
            if let Err(e) = &result {
                warn!("游戏中止: {e}");
                self.mailbox.send_to_all(Payload::Control(Control::Disconnect));
            }
            for session in self.sessions.drain(..) {
                let _ = session.await;
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn play_out(&mut self, mut arrivals: mpsc::Receiver<ClientLink>) -> Result<Outcome, ServerError> {
        self.admit_players(&mut arrivals).await?;
        // 之后到达的连接会被告知人满
        drop(arrivals);
        self.mailbox.send_to_all(Payload::Control(Control::ConnectionPhaseDone));

        self.run_setup().await?;
        self.mailbox.send_to_all(Payload::Control(Control::SetupPhaseDone));

        self.run_main_play().await
    }

    // --- 连接阶段 ---

    /// 按到达顺序分配编号 0..=3。一个玩家完成连接握手之后才接纳下一个，
    /// 这样编号和到达顺序严格一致。
    async fn admit_players(&mut self, arrivals: &mut mpsc::Receiver<ClientLink>) -> Result<(), ServerError> {
        let mut seat = 0;
        while seat < PLAYER_COUNT {
            let player = PlayerId::ALL[seat];
            let link = arrivals.recv().await.ok_or(ServerError::ListenerClosed)?;
            info!(player = %player, peer = %link.peer, "玩家已连接");

            let mailbox = self.mailbox.open_session(player);
            self.sessions.push(tokio::spawn(Session::new(link, mailbox).run()));

            if self.await_connected(player).await? {
                seat += 1;
            } else {
                warn!(player = %player, "玩家在连接阶段离开，座位重新开放");
            }
        }
        info!("四名玩家已到齐");
        Ok(())
    }

    /// 等待该玩家的 FinishedConnecting。该玩家先离开则返回 false。
    async fn await_connected(&mut self, player: PlayerId) -> Result<bool, ServerError> {
        loop {
            let (sender, payload) = self.recv().await?;
            match payload {
                Payload::Control(Control::FinishedConnecting) if sender == player => return Ok(true),
                Payload::Control(Control::Departed) => {
                    self.depart(sender)?;
                    if sender == player {
                        return Ok(false);
                    }
                }
                Payload::Control(got) => {
                    return Err(ServerError::Handshake { player: sender, expected: Control::FinishedConnecting, got });
                }
                // 连接阶段的会话不转发客户端输入
                Payload::Visible(line) => debug!(player = %sender, line, "忽略连接阶段的输入"),
            }
        }
    }

    // --- 准备阶段 ---

    async fn run_setup(&mut self) -> Result<(), ServerError> {
        let out = begin_setup(&mut self.state);
        self.dispatch(out);
        while !setup_complete(&self.state) {
            let (sender, payload) = self.recv().await?;
            match payload {
                Payload::Control(Control::FinishedSetup) => {
                    finish_setup(&mut self.state, sender);
                    info!(player = %sender, "玩家完成准备");
                }
                Payload::Control(Control::Departed) => self.depart(sender)?,
                Payload::Control(control) => return Err(ServerError::UnexpectedControl { player: sender, control }),
                Payload::Visible(line) => self.apply_line(sender, &line)?,
            }
        }
        info!("准备阶段结束");
        Ok(())
    }

    // --- 对局 ---

    async fn run_main_play(&mut self) -> Result<Outcome, ServerError> {
        let out = begin_main_play(&mut self.state);
        self.dispatch(out);
        loop {
            if let Some(outcome) = self.state.outcome() {
                info!(declarer = %outcome.declarer, winners = %outcome.winners, "游戏结束");
                self.mailbox.send_to_all(Payload::Control(Control::Disconnect));
                return Ok(outcome);
            }
            let (sender, payload) = self.recv().await?;
            match payload {
                Payload::Visible(line) => self.apply_line(sender, &line)?,
                Payload::Control(Control::Departed) => self.depart(sender)?,
                Payload::Control(control) => return Err(ServerError::UnexpectedControl { player: sender, control }),
            }
        }
    }

    // --- 工具 ---

    async fn recv(&mut self) -> Result<(PlayerId, Payload<String>), ServerError> {
        // 服务器自己持有收件箱的发送端，recv 不会因为会话全部结束而返回 None
        let Inbound { sender, payload, .. } = self.mailbox.recv().await.ok_or(ServerError::Abandoned)?;
        match sender {
            Address::Player(player) => Ok((player, payload)),
            other => Err(ServerError::Misaddressed(other)),
        }
    }

    fn apply_line(&mut self, sender: PlayerId, line: &str) -> Result<(), ServerError> {
        debug!(player = %sender, line, "收到玩家输入");
        let out = handle_line(&mut self.state, sender, line)?;
        self.dispatch(out);
        Ok(())
    }

    fn dispatch(&mut self, out: Vec<Outgoing>) {
        for Outgoing { to, notice } in out {
            match to {
                Address::Player(player) => self.mailbox.send_to(player, Payload::Visible(notice)),
                Address::All => self.mailbox.send_to_all(Payload::Visible(notice)),
                Address::Server => warn!(?notice, "丢弃发给服务器自己的通知"),
            }
        }
    }

    /// 玩家离开后不再给他发消息；游戏照常继续，没有超时，也不会替他行动。
    /// 准备阶段离开的玩家算作已完成准备，其他人不必等他。
    fn depart(&mut self, player: PlayerId) -> Result<(), ServerError> {
        warn!(player = %player, "玩家断开连接");
        self.mailbox.detach(player);
        match self.state.phase {
            GamePhase::Connecting => return Ok(()),
            GamePhase::Setup => finish_setup(&mut self.state, player),
            _ => {}
        }
        if self.mailbox.attached_count() == 0 {
            return Err(ServerError::Abandoned);
        }
        self.mailbox.send_to_all(Payload::Visible(Notice::PlayerLeft(player)));
        Ok(())
    }
}
