use rand::Rng;
use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::card::{standard_deck, Card, Rank, Suit};
use crate::error::BoardError;
use crate::state::{PlayerId, PLAYER_COUNT};

pub const HAND_SIZE: usize = 6;

/// 手牌中的位置 0..=5，是 swap/pass/show/guess/declare 的寻址单位
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Position(u8);

impl Position {
    pub fn new(index: u8) -> Option<Position> {
        ((index as usize) < HAND_SIZE).then_some(Position(index))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item = Position> {
        (0..HAND_SIZE as u8).map(Position)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一名玩家的 6 张手牌。顺序只在准备阶段 (交换同点数的相邻牌) 有意义，
/// 之后位置保持不变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand {
    owner: PlayerId,
    cards: [Card; HAND_SIZE],
}

impl Hand {
    pub fn owner(&self) -> PlayerId {
        self.owner
    }

    pub fn card(&self, position: Position) -> &Card {
        &self.cards[position.index()]
    }

    fn card_mut(&mut self, position: Position) -> &mut Card {
        &mut self.cards[position.index()]
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.cards.swap(a, b);
    }

    /// 稳定排序，点数相同的牌保持发牌时的先后
    fn sort_by_rank(&mut self) {
        self.cards.sort_by_key(Card::rank);
    }

    /// 以 `viewer` 的视角渲染整手牌，牌之间用空格分隔
    pub fn render(&self, viewer: PlayerId) -> String {
        self.cards.iter().map(|c| c.render(viewer)).collect::<Vec<_>>().join(" ")
    }
}

/// 牌桌 (Board)：四手牌。每张牌在任何时刻都恰好属于一手牌。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    hands: [Hand; PLAYER_COUNT],
}

impl Board {
    /// 洗一副新牌并发牌
    pub fn deal() -> Board {
        Self::deal_with(&mut rand::rng())
    }

    pub fn deal_with<R: Rng + ?Sized>(rng: &mut R) -> Board {
        let mut deck = standard_deck();
        deck.shuffle(rng);
        // 标准牌组总是合法的，所以 expect 是安全的
        Self::from_deck(deck).expect("标准牌组必然能发成四手牌")
    }

    /// 按给定顺序发牌 (不洗牌)：
    /// - 第 i 张牌发给玩家 i mod 4
    /// - 每手牌按点数从小到大排序
    /// - 每名玩家能看到自己的牌
    ///
    /// 传入的牌必须恰好是一副完整的 24 张牌，牌上已有的可见性会被丢弃。
    pub fn from_deck(deck: Vec<Card>) -> Result<Board, BoardError> {
        let mut faces: Vec<(Suit, Rank)> = deck.iter().map(Card::face).collect();
        let mut expected: Vec<(Suit, Rank)> = standard_deck().iter().map(Card::face).collect();
        faces.sort();
        expected.sort();
        if faces != expected {
            return Err(BoardError::InvalidDeck(format!("需要 24 张不重复的牌，实际 {} 张", deck.len())));
        }

        let mut piles: [Vec<Card>; PLAYER_COUNT] = Default::default();
        for (i, card) in deck.iter().enumerate() {
            piles[i % PLAYER_COUNT].push(Card::new(card.suit(), card.rank()));
        }

        let mut hands = Vec::with_capacity(PLAYER_COUNT);
        for (owner, pile) in PlayerId::ALL.into_iter().zip(piles) {
            let cards: [Card; HAND_SIZE] = pile
                .try_into()
                .map_err(|_| BoardError::InvalidDeck("每手牌必须是 6 张".to_string()))?;
            let mut hand = Hand { owner, cards };
            hand.cards.iter_mut().for_each(|c| c.reveal(owner));
            hand.sort_by_rank();
            hands.push(hand);
        }
        let hands: [Hand; PLAYER_COUNT] = hands
            .try_into()
            .map_err(|_| BoardError::InvalidDeck("必须是 4 手牌".to_string()))?;

        Ok(Board { hands })
    }

    pub fn hand(&self, player: PlayerId) -> &Hand {
        &self.hands[player.index()]
    }

    pub fn card(&self, player: PlayerId, position: Position) -> &Card {
        self.hand(player).card(position)
    }

    fn card_mut(&mut self, player: PlayerId, position: Position) -> &mut Card {
        self.hands[player.index()].card_mut(position)
    }

    pub fn rank_at(&self, player: PlayerId, position: Position) -> Rank {
        self.card(player, position).rank()
    }

    /// 所有 24 张牌，按玩家、位置顺序
    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.hands.iter().flat_map(|h| h.cards().iter())
    }

    // --- 准备阶段 ---

    /// 如果 `position` 上的牌与左边的牌点数相同，就交换这两张牌；
    /// 位置 0 没有左邻，改为与右边比较。否则什么也不做。
    /// 返回是否发生了交换。
    pub fn swap_adjacent_equal_rank(&mut self, player: PlayerId, position: Position) -> bool {
        let hand = &mut self.hands[player.index()];
        let i = position.index();
        let rank = hand.cards[i].rank();
        let neighbour = if i > 0 { i - 1 } else { i + 1 };
        if hand.cards[neighbour].rank() == rank {
            hand.swap(neighbour, i);
            true
        } else {
            false
        }
    }

    /// 玩家自己视角的手牌
    pub fn own_cards_view(&self, player: PlayerId) -> String {
        self.hand(player).render(player)
    }

    // --- 主阶段 ---

    pub fn reveal_to_partner(&mut self, player: PlayerId, position: Position) {
        self.card_mut(player, position).reveal(player.partner());
    }

    pub fn reveal_to_all(&mut self, player: PlayerId, position: Position) {
        self.card_mut(player, position).reveal_to_all();
    }

    /// 判断猜测是否正确，不修改任何可见性。
    /// 猜测者和目标必须是对手，且目标牌此时对猜测者不可见。
    pub fn guess(
        &self,
        guesser: PlayerId,
        target: PlayerId,
        position: Position,
        rank: Rank,
    ) -> Result<bool, BoardError> {
        if !guesser.is_opponent_of(target) {
            return Err(BoardError::SamePartnership { guesser, target });
        }
        self.declare(guesser, target, position, rank)
    }

    /// 宣告阶段的判断：目标牌可以属于任何人，只要此时对宣告者不可见。
    ///
    /// 与 `guess` 不同，这里没有“只能猜对方队伍”的限制：搭档没传过的牌
    /// 宣告者看不到，不允许宣告它们就永远赢不了。
    pub fn declare(
        &self,
        declarer: PlayerId,
        target: PlayerId,
        position: Position,
        rank: Rank,
    ) -> Result<bool, BoardError> {
        let card = self.card(target, position);
        if card.is_visible_to(declarer) {
            return Err(BoardError::AlreadyVisible { viewer: declarer, target, position });
        }
        Ok(card.rank() == rank)
    }

    /// 以 `viewer` 的视角渲染整个牌桌，每名玩家一行：`<玩家>\t<牌>`
    pub fn board_view(&self, viewer: PlayerId) -> String {
        self.hands
            .iter()
            .map(|h| format!("{}\t{}", h.owner(), h.render(viewer)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // --- 宣告阶段 ---

    /// 宣告者能看到的每张牌都公开给所有人
    pub fn make_declarer_view_public(&mut self, declarer: PlayerId) {
        self.hands
            .iter_mut()
            .flat_map(|h| h.cards.iter_mut())
            .filter(|c| c.is_visible_to(declarer))
            .for_each(Card::reveal_to_all);
    }

    /// 终局时全部公开
    pub fn make_all_public(&mut self) {
        self.hands
            .iter_mut()
            .flat_map(|h| h.cards.iter_mut())
            .for_each(Card::reveal_to_all);
    }

    /// 还有没公开的牌
    pub fn has_undeclared_cards(&self) -> bool {
        self.cards().any(|c| !c.is_public())
    }

    pub fn hidden_count(&self) -> usize {
        self.cards().filter(|c| !c.is_public()).count()
    }
}

// --- 单元测试 ---
