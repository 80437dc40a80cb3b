use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{PlayerId, PLAYER_COUNT};

// --- 核心数据结构定义 ---

/// 花色 (Suit)，Logic 只用黑桃和方块两种花色
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    Spade,   // 黑桃 S
    Diamond, // 方块 D
}

/// 点数 (Rank)，取值范围 1..=12
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Rank(u8);

impl Rank {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 12;

    /// 超出 1..=12 的值返回 None
    pub fn new(value: u8) -> Option<Rank> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Rank(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = Rank> {
        (Self::MIN..=Self::MAX).map(Rank)
    }
}

/// 可见性集合 (Visibility)
/// 第 i 位为 1 表示玩家 i 能看到这张牌的点数。
/// 只提供加入操作：牌一旦对某人翻开，就不会再对他盖上。
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Visibility(u8);

impl Visibility {
    const EVERYONE: u8 = (1 << PLAYER_COUNT) - 1;

    pub fn contains(self, viewer: PlayerId) -> bool {
        self.0 & viewer.bit() != 0
    }

    pub fn insert(&mut self, viewer: PlayerId) {
        self.0 |= viewer.bit();
    }

    pub fn insert_all(&mut self) {
        self.0 = Self::EVERYONE;
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_everyone(self) -> bool {
        self.0 == Self::EVERYONE
    }
}

/// 单张牌 (Card)
/// `suit()` 和 `rank()` 总是返回真实值，只供服务端逻辑使用；
/// 发给玩家的内容一律经过 `render`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    suit: Suit,
    rank: Rank,
    visibility: Visibility,
}

impl Card {
    /// 新牌对任何人都不可见
    pub fn new(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank, visibility: Visibility::default() }
    }

    pub fn suit(&self) -> Suit {
        self.suit
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    /// 牌面 (花色, 点数)，不含可见性，用于比较两张牌是否是同一张
    pub fn face(&self) -> (Suit, Rank) {
        (self.suit, self.rank)
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_visible_to(&self, viewer: PlayerId) -> bool {
        self.visibility.contains(viewer)
    }

    pub fn is_public(&self) -> bool {
        self.visibility.is_everyone()
    }

    /// 幂等
    pub fn reveal(&mut self, viewer: PlayerId) {
        self.visibility.insert(viewer);
    }

    pub fn reveal_to_all(&mut self) {
        self.visibility.insert_all();
    }

    /// 以 `viewer` 的视角渲染这张牌：
    /// - 所有人可见：`S7`
    /// - 恰好两人可见（持有者和搭档）：可见者看到 `(S7)`，其他人看到 `(S)`
    /// - 仅 `viewer` 可见：`[S7]`
    /// - 其余情况只显示花色：`S`
    pub fn render(&self, viewer: PlayerId) -> String {
        let sees = self.visibility.contains(viewer);
        match self.visibility.len() {
            PLAYER_COUNT => format!("{}{}", self.suit, self.rank),
            2 if sees => format!("({}{})", self.suit, self.rank),
            2 => format!("({})", self.suit),
            _ if sees => format!("[{}{}]", self.suit, self.rank),
            _ => self.suit.to_string(),
        }
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "S",
            Suit::Diamond => "D",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 创建一副完整的 24 张 Logic 牌，每个点数依次是黑桃、方块
pub fn standard_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(24);
    for rank in Rank::all() {
        for suit in [Suit::Spade, Suit::Diamond] {
            deck.push(Card::new(suit, rank));
        }
    }
    deck
}

// --- 单元测试 ---
