//! Logic 游戏服务器：接纳四名玩家，把他们的输入按顺序交给唯一的
//! 游戏状态，再把结果分发回各个会话。

pub mod config;
pub mod error;
pub mod game;
pub mod listener;
pub mod mailbox;
pub mod session;
pub mod transport;

pub use config::ServerConfig;
pub use error::{ServerError, SessionError};
pub use game::GameServer;
pub use listener::serve;
pub use transport::{ClientLink, LineFormat, LineSink, LineSource, LocalClient};
