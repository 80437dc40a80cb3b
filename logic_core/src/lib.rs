//! # Logic 核心逻辑库
//!
//! 这个 `core` crate 包含了 Logic 纸牌游戏的牌面与可见性模型、
//! 牌桌、回合状态机、玩家命令语法以及服务器与会话之间的消息定义。
//! 它不做任何 I/O，可以被服务器、客户端或自动玩家复用。

mod board;
mod card;
mod error;
mod logic;
mod message;
mod state;

pub use board::*;

pub use card::*;

pub use error::*;

pub use logic::*;

pub use message::*;

pub use state::*;
