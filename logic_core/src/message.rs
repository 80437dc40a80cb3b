use crate::board::Position;
use crate::card::Rank;
use crate::error::CommandError;
use crate::state::{Partnership, PlayerId, TurnStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// --- 客户端 -> 服务器 的命令 ---
// 每行一条，区分大小写。哪些命令在当前阶段有效由服务器判断。

/// `guess X Y Z` / `declare X Y Z` 的参数：玩家 X 位置 Y 的牌点数是 Z
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardCall {
    pub target: PlayerId,
    pub position: Position,
    pub rank: Rank,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// 查看自己的牌 (准备阶段) 或整个牌桌 (之后)
    View,
    Help,
    /// 结束准备阶段
    Done,
    /// 与相邻的同点数牌交换
    Swap(Position),
    /// 把一张牌亮给搭档
    Pass(Position),
    Guess(CardCall),
    /// 猜错之后必须公开一张自己的牌
    Show(Position),
    /// 进入宣告阶段
    Declare,
    /// 宣告阶段中宣告一张牌
    DeclareCard(CardCall),
}

impl FromStr for ClientCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&verb, args)) = parts.split_first() else {
            return Err(CommandError::Empty);
        };

        match (verb, args) {
            ("view", []) => Ok(ClientCommand::View),
            ("help", []) => Ok(ClientCommand::Help),
            ("done", []) => Ok(ClientCommand::Done),
            ("declare", []) => Ok(ClientCommand::Declare),
            ("swap", [n]) => Ok(ClientCommand::Swap(parse_position(n)?)),
            ("pass", [n]) => Ok(ClientCommand::Pass(parse_position(n)?)),
            ("show", [n]) => Ok(ClientCommand::Show(parse_position(n)?)),
            ("guess", [x, y, z]) => Ok(ClientCommand::Guess(parse_call(x, y, z)?)),
            ("declare", [x, y, z]) => Ok(ClientCommand::DeclareCard(parse_call(x, y, z)?)),
            ("view" | "help" | "done" | "declare" | "swap" | "pass" | "show" | "guess", _) => {
                Err(CommandError::Arity { verb: verb.to_string() })
            }
            _ => Err(CommandError::Unknown(verb.to_string())),
        }
    }
}

fn parse_number(text: &str) -> Result<u8, CommandError> {
    text.parse().map_err(|_| CommandError::NotANumber(text.to_string()))
}

fn parse_player(text: &str) -> Result<PlayerId, CommandError> {
    let value = parse_number(text)?;
    PlayerId::new(value).ok_or(CommandError::OutOfRange { what: "玩家编号", value })
}

fn parse_position(text: &str) -> Result<Position, CommandError> {
    let value = parse_number(text)?;
    Position::new(value).ok_or(CommandError::OutOfRange { what: "牌的位置", value })
}

fn parse_rank(text: &str) -> Result<Rank, CommandError> {
    let value = parse_number(text)?;
    Rank::new(value).ok_or(CommandError::OutOfRange { what: "点数", value })
}

fn parse_call(target: &str, position: &str, rank: &str) -> Result<CardCall, CommandError> {
    Ok(CardCall {
        target: parse_player(target)?,
        position: parse_position(position)?,
        rank: parse_rank(rank)?,
    })
}

// --- 服务器 -> 客户端 的通知 ---
// 每个变体只携带它需要的字段；Display 给出发给人类玩家的文本。

/// 帮助信息对应的阶段
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Setup,
    MainPlay,
    Declare,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Welcome(PlayerId),
    AwaitingPlayers,
    SetupBegun,
    Help(HelpTopic),
    /// 玩家自己的手牌 (已按该玩家视角渲染)
    OwnCards(String),
    SetupFinished,
    MainPlayBegun,
    /// 整个牌桌 (已按收件人视角渲染)
    Board(String),
    Turn { player: PlayerId, status: TurnStatus },
    Passed { player: PlayerId, position: Position },
    Showed { player: PlayerId, position: Position },
    Guessed { player: PlayerId, call: CardCall, correct: bool },
    Declaring(PlayerId),
    Declared { player: PlayerId, call: CardCall, correct: bool },
    /// 当前状态不允许该操作
    NotNow(TurnStatus),
    AlreadyVisible,
    PlayerLeft(PlayerId),
    Won(Partnership),
    Lost(Partnership),
    GameFull,
    Farewell,
}

const SETUP_HELP: &str = "Please set up your cards.\n\
    Type 'view' to see your cards, 'help' for help message, \
    and 'swap x' to swap card x with the adjacent card of equal rank. \
    Type 'done' to finish.";

const MAIN_PLAY_HELP: &str = "Type 'view' to see the board, 'help' for help message, \
    'pass x' to pass card x, 'guess x y z' to guess card y of player x is z, \
    and 'show x' to show card x. Type 'declare' to declare.";

const DECLARE_HELP: &str = "Type 'view' to see the board and 'help' for help message. \
    The declarer types 'declare x y z' to declare that card y of player x is z.";

impl fmt::Display for HelpTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            HelpTopic::Setup => SETUP_HELP,
            HelpTopic::MainPlay => MAIN_PLAY_HELP,
            HelpTopic::Declare => DECLARE_HELP,
        })
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Notice::Welcome(p) => write!(f, "Welcome to Logic! You are player #{p}."),
            Notice::AwaitingPlayers => write!(f, "Please wait for four players to arrive."),
            Notice::SetupBegun => write!(f, "Game has begun! {SETUP_HELP}"),
            Notice::Help(topic) => write!(f, "{topic}"),
            Notice::OwnCards(cards) => write!(f, "{cards}"),
            Notice::SetupFinished => write!(f, "Yay! Wait for other players to finish setup..."),
            Notice::MainPlayBegun => write!(f, "Game has begun!\n{MAIN_PLAY_HELP}"),
            Notice::Board(view) => write!(f, "{view}"),
            Notice::Turn { player, status } => match status {
                TurnStatus::Pass => write!(f, "Player {player} to pass."),
                TurnStatus::Guess => write!(f, "Player {player} to guess."),
                TurnStatus::Show => write!(f, "Player {player} must show a card."),
                TurnStatus::Declare => write!(f, "Player {player} is declaring!"),
                TurnStatus::Inactive => write!(f, "Player {player} is waiting."),
            },
            Notice::Passed { player, position } => write!(f, "Player {player} passed card {position}!"),
            Notice::Showed { player, position } => write!(f, "Player {player} revealed card {position}!"),
            Notice::Guessed { player, call, correct } => write!(
                f,
                "Player {player} {} guessed card {} of player {}: {}!",
                if *correct { "correctly" } else { "incorrectly" },
                call.position,
                call.target,
                call.rank
            ),
            Notice::Declaring(p) => write!(f, "Player {p} is declaring!"),
            Notice::Declared { player, call, correct } => write!(
                f,
                "Player {player} {} declared card {} of player {}: {}!",
                if *correct { "correctly" } else { "incorrectly" },
                call.position,
                call.target,
                call.rank
            ),
            Notice::NotNow(status) => write!(f, "You cannot do that right now. Your status: {status}."),
            Notice::AlreadyVisible => write!(f, "You can already see that card."),
            Notice::PlayerLeft(p) => write!(f, "Player {p} has disconnected."),
            Notice::Won(team) => write!(f, "{team} win!"),
            Notice::Lost(team) => write!(f, "{team} lose!"),
            Notice::GameFull => write!(f, "The game is full. Goodbye."),
            Notice::Farewell => write!(f, "Game over. Disconnecting."),
        }
    }
}

impl Notice {
    /// 给自动玩家用的紧凑格式，例如 `topass 2`、`guess 0 1 2 7 correct`。
    /// 纯展示性的通知 (牌面、帮助) 没有对应格式。
    pub fn machine_line(&self) -> Option<String> {
        let verdict = |correct: bool| if correct { "correct" } else { "incorrect" };
        Some(match self {
            Notice::SetupBegun => "setup".to_string(),
            Notice::MainPlayBegun => "begingame".to_string(),
            Notice::Turn { player, status: TurnStatus::Pass } => format!("topass {player}"),
            Notice::Turn { player, status: TurnStatus::Guess } => format!("toguess {player}"),
            Notice::Turn { player, status: TurnStatus::Show } => format!("toshow {player}"),
            Notice::Passed { player, position } => format!("pass {player} {position}"),
            Notice::Showed { player, position } => format!("show {player} {position}"),
            Notice::Guessed { player, call, correct } => format!(
                "guess {player} {} {} {} {}",
                call.target,
                call.position,
                call.rank,
                verdict(*correct)
            ),
            Notice::Declaring(p) => format!("declare {p}"),
            Notice::Declared { player, call, correct } => format!(
                "declared {player} {} {} {} {}",
                call.target,
                call.position,
                call.rank,
                verdict(*correct)
            ),
            Notice::Farewell => "disconnect".to_string(),
            _ => return None,
        })
    }
}

// --- 服务器与会话之间的内部消息 ---

/// 控制消息：协调服务器与会话处理器的阶段切换，从不显示给玩家
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    FinishedConnecting,
    ConnectionPhaseDone,
    FinishedSetup,
    SetupPhaseDone,
    /// 会话的客户端断开了
    Departed,
    Disconnect,
}

/// 收件人或发件人
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    Server,
    Player(PlayerId),
    All,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Control,
    PlayerVisible,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Payload<T> {
    Control(Control),
    Visible(T),
}

/// 信封 (Envelope)。会话 -> 服务器的可见内容是玩家输入的原始行，
/// 服务器 -> 会话的可见内容是 `Notice`。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Envelope<T> {
    pub sender: Address,
    pub recipient: Address,
    pub payload: Payload<T>,
}

pub type Inbound = Envelope<String>;
pub type Outbound = Envelope<Notice>;

impl<T> Envelope<T> {
    pub fn to_server(sender: PlayerId, payload: Payload<T>) -> Self {
        Envelope { sender: Address::Player(sender), recipient: Address::Server, payload }
    }

    pub fn from_server(recipient: Address, payload: Payload<T>) -> Self {
        Envelope { sender: Address::Server, recipient, payload }
    }

    pub fn kind(&self) -> MessageKind {
        match self.payload {
            Payload::Control(_) => MessageKind::Control,
            Payload::Visible(_) => MessageKind::PlayerVisible,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Server => write!(f, "server"),
            Address::Player(p) => write!(f, "player {p}"),
            Address::All => write!(f, "all"),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Envelope<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.payload {
            Payload::Control(c) => write!(f, "CTL {} -> {}: {:?}", self.sender, self.recipient, c),
            Payload::Visible(v) => write!(f, "EXT {} -> {}: {}", self.sender, self.recipient, v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u8) -> PlayerId {
        PlayerId::new(id).unwrap()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!("view".parse::<ClientCommand>(), Ok(ClientCommand::View));
        assert_eq!("help".parse::<ClientCommand>(), Ok(ClientCommand::Help));
        assert_eq!("done".parse::<ClientCommand>(), Ok(ClientCommand::Done));
        assert_eq!("declare".parse::<ClientCommand>(), Ok(ClientCommand::Declare));
        assert_eq!("swap 5".parse::<ClientCommand>(), Ok(ClientCommand::Swap(Position::new(5).unwrap())));
        assert_eq!("pass 0".parse::<ClientCommand>(), Ok(ClientCommand::Pass(Position::new(0).unwrap())));
    }

    #[test]
    fn test_parse_guess_and_declare() {
        let call = CardCall {
            target: player(1),
            position: Position::new(2).unwrap(),
            rank: Rank::new(7).unwrap(),
        };
        assert_eq!("guess 1 2 7".parse::<ClientCommand>(), Ok(ClientCommand::Guess(call)));
        assert_eq!("declare 1 2 7".parse::<ClientCommand>(), Ok(ClientCommand::DeclareCard(call)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!("".parse::<ClientCommand>(), Err(CommandError::Empty));
        assert_eq!("View".parse::<ClientCommand>(), Err(CommandError::Unknown("View".into())));
        assert_eq!("swap".parse::<ClientCommand>(), Err(CommandError::Arity { verb: "swap".into() }));
        assert_eq!("swap x".parse::<ClientCommand>(), Err(CommandError::NotANumber("x".into())));
        assert!(matches!("swap 6".parse::<ClientCommand>(), Err(CommandError::OutOfRange { value: 6, .. })));
        assert!(matches!("guess 4 0 1".parse::<ClientCommand>(), Err(CommandError::OutOfRange { value: 4, .. })));
        assert!(matches!("guess 1 0 13".parse::<ClientCommand>(), Err(CommandError::OutOfRange { value: 13, .. })));
        assert!(matches!("guess 1 0 0".parse::<ClientCommand>(), Err(CommandError::OutOfRange { value: 0, .. })));
        assert!("guess 1 0 -1".parse::<ClientCommand>().is_err());
    }

    #[test]
    fn test_notice_text() {
        let call = CardCall {
            target: player(1),
            position: Position::new(2).unwrap(),
            rank: Rank::new(7).unwrap(),
        };
        assert_eq!(Notice::Welcome(player(3)).to_string(), "Welcome to Logic! You are player #3.");
        assert_eq!(Notice::Turn { player: player(2), status: TurnStatus::Pass }.to_string(), "Player 2 to pass.");
        assert_eq!(
            Notice::Guessed { player: player(0), call, correct: true }.to_string(),
            "Player 0 correctly guessed card 2 of player 1: 7!"
        );
        assert_eq!(
            Notice::NotNow(TurnStatus::Inactive).to_string(),
            "You cannot do that right now. Your status: inactive."
        );
        assert_eq!(Notice::Lost(Partnership::ZeroTwo).to_string(), "Players 0 and 2 lose!");
    }

    #[test]
    fn test_machine_lines() {
        let call = CardCall {
            target: player(1),
            position: Position::new(2).unwrap(),
            rank: Rank::new(7).unwrap(),
        };
        assert_eq!(
            Notice::Guessed { player: player(0), call, correct: false }.machine_line().as_deref(),
            Some("guess 0 1 2 7 incorrect")
        );
        assert_eq!(
            Notice::Turn { player: player(3), status: TurnStatus::Show }.machine_line().as_deref(),
            Some("toshow 3")
        );
        assert_eq!(Notice::Board(String::new()).machine_line(), None);
    }

    #[test]
    fn test_envelope_kind() {
        let ctl: Inbound = Envelope::to_server(player(1), Payload::Control(Control::FinishedSetup));
        assert_eq!(ctl.kind(), MessageKind::Control);
        assert_eq!(ctl.recipient, Address::Server);

        let ext: Outbound = Envelope::from_server(Address::All, Payload::Visible(Notice::AwaitingPlayers));
        assert_eq!(ext.kind(), MessageKind::PlayerVisible);
        assert_eq!(ext.sender, Address::Server);
    }
}
