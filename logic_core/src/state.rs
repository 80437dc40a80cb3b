use crate::board::Board;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

pub type GameId = Uuid;

pub const PLAYER_COUNT: usize = 4;

/// 玩家编号 0..=3，按连接顺序分配。
/// 搭档关系固定为 {0, 2} 和 {1, 3}。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    pub const ALL: [PlayerId; PLAYER_COUNT] = [PlayerId(0), PlayerId(1), PlayerId(2), PlayerId(3)];

    pub fn new(id: u8) -> Option<PlayerId> {
        ((id as usize) < PLAYER_COUNT).then_some(PlayerId(id))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn bit(self) -> u8 {
        1 << self.0
    }

    /// 搭档：(id + 2) mod 4
    pub fn partner(self) -> PlayerId {
        PlayerId((self.0 + 2) % PLAYER_COUNT as u8)
    }

    /// 猜完或亮完牌之后轮到传牌的玩家：(id + 3) mod 4
    pub fn next(self) -> PlayerId {
        PlayerId((self.0 + 3) % PLAYER_COUNT as u8)
    }

    pub fn is_opponent_of(self, other: PlayerId) -> bool {
        (self.0 + other.0) % 2 == 1
    }

    pub fn partnership(self) -> Partnership {
        if self.0 % 2 == 0 { Partnership::ZeroTwo } else { Partnership::OneThree }
    }
}

/// 两支队伍
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partnership {
    ZeroTwo,
    OneThree,
}

impl Partnership {
    pub fn members(self) -> [PlayerId; 2] {
        match self {
            Partnership::ZeroTwo => [PlayerId(0), PlayerId(2)],
            Partnership::OneThree => [PlayerId(1), PlayerId(3)],
        }
    }

    pub fn opponents(self) -> Partnership {
        match self {
            Partnership::ZeroTwo => Partnership::OneThree,
            Partnership::OneThree => Partnership::ZeroTwo,
        }
    }
}

/// 每个玩家的回合状态。任意时刻最多一个玩家处于非 Inactive 状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TurnStatus {
    #[default]
    Inactive,
    Pass,
    Guess,
    Show,
    Declare,
}

/// 回合表，只由服务器主循环修改
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Turns {
    statuses: [TurnStatus; PLAYER_COUNT],
}

impl Turns {
    pub fn status(&self, player: PlayerId) -> TurnStatus {
        self.statuses[player.index()]
    }

    /// 当前行动的玩家 (如果存在)
    pub fn active(&self) -> Option<(PlayerId, TurnStatus)> {
        PlayerId::ALL
            .into_iter()
            .map(|p| (p, self.status(p)))
            .find(|(_, s)| *s != TurnStatus::Inactive)
    }

    #[cfg(test)]
    pub(crate) fn active_count(&self) -> usize {
        self.statuses.iter().filter(|s| **s != TurnStatus::Inactive).count()
    }

    /// 激活一个玩家，或者改变当前行动玩家自己的状态 (例如 Guess -> Show)。
    /// 调用前不能有其他玩家处于行动状态。
    pub fn activate(&mut self, player: PlayerId, status: TurnStatus) {
        debug_assert!(
            self.active().is_none_or(|(p, _)| p == player),
            "激活玩家 {player} 时已有其他玩家在行动"
        );
        self.statuses[player.index()] = status;
    }

    /// 交接回合：先把 `from` 置为 Inactive，再激活 `to`
    pub fn hand_off(&mut self, from: PlayerId, to: PlayerId, status: TurnStatus) {
        self.statuses[from.index()] = TurnStatus::Inactive;
        self.activate(to, status);
    }

    /// 进入宣告阶段：除宣告者外全部 Inactive
    pub fn begin_declaration(&mut self, declarer: PlayerId) {
        self.clear();
        self.statuses[declarer.index()] = TurnStatus::Declare;
    }

    pub fn clear(&mut self) {
        self.statuses = [TurnStatus::Inactive; PLAYER_COUNT];
    }
}

/// 游戏阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Connecting,
    Setup,
    MainPlay,
    Declare { declarer: PlayerId },
    Terminal { outcome: Outcome },
}

/// 终局结果：宣告者是谁，哪支队伍获胜
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub declarer: PlayerId,
    pub winners: Partnership,
}

impl Outcome {
    pub fn losers(&self) -> Partnership {
        self.winners.opponents()
    }
}

/// 一局游戏的全部权威状态。只在服务器的单一主循环里读写。
#[derive(Debug, Clone)]
pub struct GameState {
    pub game_id: GameId,
    pub board: Board,
    pub turns: Turns,
    pub phase: GamePhase,
    // 已经输入 done 的玩家
    pub finished_setup: HashSet<PlayerId>,
}

impl GameState {
    pub fn new(board: Board) -> GameState {
        GameState {
            game_id: Uuid::new_v4(),
            board,
            turns: Turns::default(),
            phase: GamePhase::Connecting,
            finished_setup: HashSet::new(),
        }
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            GamePhase::Terminal { outcome } => Some(outcome),
            _ => None,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, GamePhase::Terminal { .. })
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Partnership {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b] = self.members();
        write!(f, "Players {a} and {b}")
    }
}

impl fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            TurnStatus::Inactive => "inactive",
            TurnStatus::Pass => "to pass",
            TurnStatus::Guess => "to guess",
            TurnStatus::Show => "to show",
            TurnStatus::Declare => "declaring",
        })
    }
}
