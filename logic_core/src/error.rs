use thiserror::Error;

use crate::board::Position;
use crate::state::PlayerId;

/// 客户端输入不符合命令语法。一律回复帮助信息，不改变状态。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("空命令")]
    Empty,

    #[error("未知命令: {0}")]
    Unknown(String),

    #[error("命令 {verb} 的参数数量不对")]
    Arity { verb: String },

    #[error("无效的数字: {0}")]
    NotANumber(String),

    #[error("{what} 超出范围: {value}")]
    OutOfRange { what: &'static str, value: u8 },
}

/// 牌桌操作的前置条件被违反。分发逻辑会事先拦截这些情况，
/// 真的出现说明程序有 bug。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("玩家 {guesser} 和 {target} 是搭档，不能互猜")]
    SamePartnership { guesser: PlayerId, target: PlayerId },

    #[error("玩家 {viewer} 已经能看到玩家 {target} 位置 {position} 的牌")]
    AlreadyVisible { viewer: PlayerId, target: PlayerId, position: Position },

    #[error("牌组不合法: {0}")]
    InvalidDeck(String),
}
