use std::io;

use logic_core::{Address, BoardError, Control, PlayerId};
use thiserror::Error;

/// 会话处理器结束的原因
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("客户端连接出错: {0}")]
    Transport(#[from] io::Error),

    #[error("客户端断开了连接")]
    ClientClosed,

    #[error("服务器已经关闭")]
    ServerGone,

    #[error("服务器结束了游戏")]
    Dismissed,

    #[error("握手失败：期望 {expected:?}，收到 {got:?}")]
    Handshake { expected: Control, got: Control },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("监听器已关闭，凑不齐四名玩家")]
    ListenerClosed,

    #[error("玩家 {player} 握手失败：期望 {expected:?}，收到 {got:?}")]
    Handshake { player: PlayerId, expected: Control, got: Control },

    #[error("玩家 {player} 在错误的时机发来控制消息 {control:?}")]
    UnexpectedControl { player: PlayerId, control: Control },

    #[error("收到来自 {0} 的消息，发件人不是玩家")]
    Misaddressed(Address),

    #[error("牌桌状态被破坏: {0}")]
    Board(#[from] BoardError),

    #[error("所有玩家都已离开")]
    Abandoned,

    #[error("环境变量 {var} 的值无效: {value}")]
    Config { var: &'static str, value: String },

    #[error("网络错误: {0}")]
    Io(#[from] io::Error),
}
