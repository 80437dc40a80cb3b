use crate::board::Position;
use crate::error::BoardError;
use crate::message::{Address, CardCall, ClientCommand, HelpTopic, Notice};
use crate::state::*;

/// 一条待发送的通知：发给某个玩家，或者广播给所有人
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub to: Address,
    pub notice: Notice,
}

fn to(player: PlayerId, notice: Notice) -> Outgoing {
    Outgoing { to: Address::Player(player), notice }
}

fn everyone(notice: Notice) -> Outgoing {
    Outgoing { to: Address::All, notice }
}

/// 每名玩家各自视角的牌桌
fn board_views(state: &GameState) -> Vec<Outgoing> {
    PlayerId::ALL
        .into_iter()
        .map(|p| to(p, Notice::Board(state.board.board_view(p))))
        .collect()
}

fn not_now(state: &GameState, player: PlayerId) -> Vec<Outgoing> {
    vec![to(player, Notice::NotNow(state.turns.status(player)))]
}

fn help(player: PlayerId, topic: HelpTopic) -> Vec<Outgoing> {
    vec![to(player, Notice::Help(topic))]
}

// --- 阶段切换 ---

/// 进入准备阶段：给每名玩家发说明和自己的手牌
pub fn begin_setup(state: &mut GameState) -> Vec<Outgoing> {
    state.phase = GamePhase::Setup;
    state.finished_setup.clear();
    PlayerId::ALL
        .into_iter()
        .flat_map(|p| [to(p, Notice::SetupBegun), to(p, Notice::OwnCards(state.board.own_cards_view(p)))])
        .collect()
}

/// 记录玩家完成准备
pub fn finish_setup(state: &mut GameState, player: PlayerId) {
    state.finished_setup.insert(player);
}

/// 四名玩家都输入了 done
pub fn setup_complete(state: &GameState) -> bool {
    state.finished_setup.len() == PLAYER_COUNT
}

/// 进入主阶段：广播牌桌和说明，玩家 0 先猜，所以由他的搭档玩家 2 先传牌
pub fn begin_main_play(state: &mut GameState) -> Vec<Outgoing> {
    state.phase = GamePhase::MainPlay;
    let first_guesser = PlayerId::ALL[0];
    let first_passer = first_guesser.partner();

    let mut out = vec![everyone(Notice::MainPlayBegun)];
    out.extend(board_views(state));
    state.turns.clear();
    state.turns.activate(first_passer, TurnStatus::Pass);
    out.push(everyone(Notice::Turn { player: first_passer, status: TurnStatus::Pass }));
    out
}

// --- 玩家输入 ---

/// 处理一行玩家输入，返回需要发送的通知。
/// 语法错误回复帮助信息；时机不对回复当前状态；都不改变游戏状态。
/// 只有牌桌前置条件被违反 (说明有 bug) 时返回错误。
pub fn handle_line(state: &mut GameState, sender: PlayerId, line: &str) -> Result<Vec<Outgoing>, BoardError> {
    let command = line.parse::<ClientCommand>();
    match state.phase {
        GamePhase::Setup => Ok(match command {
            Ok(cmd) => handle_setup_command(state, sender, cmd),
            Err(_) => help(sender, HelpTopic::Setup),
        }),
        GamePhase::MainPlay => match command {
            Ok(cmd) => handle_main_command(state, sender, cmd),
            Err(_) => Ok(help(sender, HelpTopic::MainPlay)),
        },
        GamePhase::Declare { declarer } => match command {
            Ok(cmd) => handle_declare_command(state, sender, declarer, cmd),
            Err(_) => Ok(help(sender, HelpTopic::Declare)),
        },
        // 连接阶段不会收到玩家输入；终局之后的输入直接忽略
        GamePhase::Connecting | GamePhase::Terminal { .. } => Ok(vec![]),
    }
}

fn handle_setup_command(state: &mut GameState, sender: PlayerId, command: ClientCommand) -> Vec<Outgoing> {
    match command {
        ClientCommand::View => vec![to(sender, Notice::OwnCards(state.board.own_cards_view(sender)))],
        ClientCommand::Swap(position) => {
            state.board.swap_adjacent_equal_rank(sender, position);
            vec![to(sender, Notice::OwnCards(state.board.own_cards_view(sender)))]
        }
        // done 由会话处理，转成 FinishedSetup 控制消息
        _ => help(sender, HelpTopic::Setup),
    }
}

fn handle_main_command(
    state: &mut GameState,
    sender: PlayerId,
    command: ClientCommand,
) -> Result<Vec<Outgoing>, BoardError> {
    Ok(match command {
        ClientCommand::View => vec![to(sender, Notice::Board(state.board.board_view(sender)))],
        ClientCommand::Pass(position) => pass(state, sender, position),
        ClientCommand::Guess(call) => return guess(state, sender, call),
        ClientCommand::Show(position) => show(state, sender, position),
        ClientCommand::Declare => begin_declaration(state, sender),
        _ => help(sender, HelpTopic::MainPlay),
    })
}

fn handle_declare_command(
    state: &mut GameState,
    sender: PlayerId,
    declarer: PlayerId,
    command: ClientCommand,
) -> Result<Vec<Outgoing>, BoardError> {
    Ok(match command {
        ClientCommand::View => vec![to(sender, Notice::Board(state.board.board_view(sender)))],
        ClientCommand::DeclareCard(call) if sender == declarer => return declare_card(state, declarer, call),
        ClientCommand::DeclareCard(_)
        | ClientCommand::Declare
        | ClientCommand::Pass(_)
        | ClientCommand::Guess(_)
        | ClientCommand::Show(_) => not_now(state, sender),
        _ => help(sender, HelpTopic::Declare),
    })
}

// --- 主阶段动作 ---

fn pass(state: &mut GameState, sender: PlayerId, position: Position) -> Vec<Outgoing> {
    if state.turns.status(sender) != TurnStatus::Pass {
        return not_now(state, sender);
    }
    let partner = sender.partner();
    state.board.reveal_to_partner(sender, position);
    state.turns.hand_off(sender, partner, TurnStatus::Guess);
    vec![
        everyone(Notice::Passed { player: sender, position }),
        everyone(Notice::Turn { player: partner, status: TurnStatus::Guess }),
    ]
}

fn guess(state: &mut GameState, sender: PlayerId, call: CardCall) -> Result<Vec<Outgoing>, BoardError> {
    if state.turns.status(sender) != TurnStatus::Guess {
        return Ok(not_now(state, sender));
    }
    if !sender.is_opponent_of(call.target) {
        return Ok(help(sender, HelpTopic::MainPlay));
    }
    if state.board.card(call.target, call.position).is_visible_to(sender) {
        return Ok(vec![to(sender, Notice::AlreadyVisible)]);
    }

    let correct = state.board.guess(sender, call.target, call.position, call.rank)?;
    let mut out = vec![everyone(Notice::Guessed { player: sender, call, correct })];
    if correct {
        state.board.reveal_to_all(call.target, call.position);
        let next = sender.next();
        state.turns.hand_off(sender, next, TurnStatus::Pass);
        out.push(everyone(Notice::Turn { player: next, status: TurnStatus::Pass }));
    } else {
        // 猜错的玩家必须亮出自己的一张牌
        state.turns.activate(sender, TurnStatus::Show);
        out.push(everyone(Notice::Turn { player: sender, status: TurnStatus::Show }));
    }
    Ok(out)
}

fn show(state: &mut GameState, sender: PlayerId, position: Position) -> Vec<Outgoing> {
    if state.turns.status(sender) != TurnStatus::Show {
        return not_now(state, sender);
    }
    state.board.reveal_to_all(sender, position);
    let next = sender.next();
    state.turns.hand_off(sender, next, TurnStatus::Pass);
    vec![
        everyone(Notice::Showed { player: sender, position }),
        everyone(Notice::Turn { player: next, status: TurnStatus::Pass }),
    ]
}

// --- 宣告阶段 ---

/// 任何状态下都可以宣告。宣告者能看到的牌全部公开，之后只有他能行动。
fn begin_declaration(state: &mut GameState, declarer: PlayerId) -> Vec<Outgoing> {
    state.turns.begin_declaration(declarer);
    state.board.make_declarer_view_public(declarer);
    state.phase = GamePhase::Declare { declarer };

    let mut out = vec![everyone(Notice::Declaring(declarer))];
    out.extend(board_views(state));
    if state.board.has_undeclared_cards() {
        out.push(everyone(Notice::Help(HelpTopic::Declare)));
    } else {
        out.extend(finish(state, declarer, true));
    }
    out
}

/// 一次宣告一张牌。猜对就公开这张牌，全部公开即获胜；猜错立即输掉。
fn declare_card(state: &mut GameState, declarer: PlayerId, call: CardCall) -> Result<Vec<Outgoing>, BoardError> {
    if state.board.card(call.target, call.position).is_visible_to(declarer) {
        return Ok(vec![to(declarer, Notice::AlreadyVisible)]);
    }

    let correct = state.board.declare(declarer, call.target, call.position, call.rank)?;
    let mut out = vec![everyone(Notice::Declared { player: declarer, call, correct })];
    if correct {
        state.board.reveal_to_all(call.target, call.position);
        if !state.board.has_undeclared_cards() {
            out.extend(finish(state, declarer, true));
        }
    } else {
        out.extend(finish(state, declarer, false));
    }
    Ok(out)
}

/// 终局：全部公开，宣布胜负
fn finish(state: &mut GameState, declarer: PlayerId, declarer_won: bool) -> Vec<Outgoing> {
    let team = declarer.partnership();
    let winners = if declarer_won { team } else { team.opponents() };
    let outcome = Outcome { declarer, winners };

    state.board.make_all_public();
    state.turns.clear();
    state.phase = GamePhase::Terminal { outcome };

    let mut out = board_views(state);
    if declarer_won {
        out.push(everyone(Notice::Won(outcome.winners)));
        out.push(everyone(Notice::Lost(outcome.losers())));
    } else {
        out.push(everyone(Notice::Lost(outcome.losers())));
        out.push(everyone(Notice::Won(outcome.winners)));
    }
    out
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::tests::{fixed_board, player, pos};

    // 辅助函数：用固定牌桌创建已进入主阶段的游戏
    fn main_play_game() -> GameState {
        let mut state = GameState::new(fixed_board());
        begin_setup(&mut state);
        for p in PlayerId::ALL {
            finish_setup(&mut state, p);
        }
        assert!(setup_complete(&state));
        begin_main_play(&mut state);
        state
    }

    fn play(state: &mut GameState, sender: u8, line: &str) -> Vec<Outgoing> {
        let out = handle_line(state, player(sender), line).unwrap();
        assert!(state.turns.active_count() <= 1, "同时有多名玩家在行动");
        out
    }

    fn notices_to(out: &[Outgoing], p: u8) -> Vec<&Notice> {
        out.iter()
            .filter(|o| o.to == Address::All || o.to == Address::Player(player(p)))
            .map(|o| &o.notice)
            .collect()
    }

    #[test]
    fn test_begin_setup_sends_own_cards() {
        let mut state = GameState::new(fixed_board());
        let out = begin_setup(&mut state);
        assert_eq!(state.phase, GamePhase::Setup);
        assert_eq!(out.len(), 8);
        assert!(out.contains(&to(player(1), Notice::OwnCards("[S2] [D2] [S6] [D6] [S10] [D10]".into()))));
    }

    #[test]
    fn test_setup_commands() {
        let mut state = GameState::new(fixed_board());
        begin_setup(&mut state);

        let out = play(&mut state, 0, "swap 1");
        assert_eq!(out, vec![to(player(0), Notice::OwnCards("[D1] [S1] [S5] [D5] [S9] [D9]".into()))]);

        let out = play(&mut state, 0, "pass 1");
        assert_eq!(out, help(player(0), HelpTopic::Setup));

        let out = play(&mut state, 2, "swap 9");
        assert_eq!(out, help(player(2), HelpTopic::Setup));

        // done 不经过这里，也不会记为完成准备
        let out = play(&mut state, 3, "done");
        assert_eq!(out, help(player(3), HelpTopic::Setup));
        assert!(!setup_complete(&state));
    }

    #[test]
    fn test_main_play_starts_with_player_two_passing() {
        let state = main_play_game();
        assert_eq!(state.phase, GamePhase::MainPlay);
        assert_eq!(state.turns.active(), Some((player(2), TurnStatus::Pass)));
    }

    #[test]
    fn test_pass_reveals_to_partner() {
        // 场景 B
        let mut state = main_play_game();
        let out = play(&mut state, 2, "pass 3");

        let card = state.board.card(player(2), pos(3));
        assert!(card.is_visible_to(player(0)));
        assert!(!card.is_visible_to(player(1)));
        assert!(!card.is_visible_to(player(3)));
        assert_eq!(state.turns.status(player(2)), TurnStatus::Inactive);
        assert_eq!(state.turns.status(player(0)), TurnStatus::Guess);
        assert_eq!(out, vec![
            everyone(Notice::Passed { player: player(2), position: pos(3) }),
            everyone(Notice::Turn { player: player(0), status: TurnStatus::Guess }),
        ]);
    }

    #[test]
    fn test_correct_guess() {
        // 场景 C：玩家 1 位置 2 的牌是 S6
        let mut state = main_play_game();
        play(&mut state, 2, "pass 3");
        let before = state.board.hidden_count();

        let out = play(&mut state, 0, "guess 1 2 6");
        assert!(state.board.card(player(1), pos(2)).is_public());
        assert_eq!(state.board.hidden_count(), before - 1);
        assert_eq!(state.turns.active(), Some((player(3), TurnStatus::Pass)));
        assert!(notices_to(&out, 1).contains(&&Notice::Turn { player: player(3), status: TurnStatus::Pass }));
    }

    #[test]
    fn test_incorrect_guess_then_show() {
        let mut state = main_play_game();
        play(&mut state, 2, "pass 3");

        play(&mut state, 0, "guess 1 2 7");
        assert!(!state.board.card(player(1), pos(2)).is_visible_to(player(0)));
        assert_eq!(state.turns.active(), Some((player(0), TurnStatus::Show)));

        // 还不能传牌
        let out = play(&mut state, 0, "pass 1");
        assert_eq!(out, vec![to(player(0), Notice::NotNow(TurnStatus::Show))]);

        let out = play(&mut state, 0, "show 4");
        assert!(state.board.card(player(0), pos(4)).is_public());
        assert_eq!(state.turns.active(), Some((player(3), TurnStatus::Pass)));
        assert_eq!(out[0], everyone(Notice::Showed { player: player(0), position: pos(4) }));
    }

    #[test]
    fn test_out_of_turn_actions_change_nothing() {
        let mut state = main_play_game();
        let before = state.board.clone();

        let out = play(&mut state, 1, "pass 0");
        assert_eq!(out, vec![to(player(1), Notice::NotNow(TurnStatus::Inactive))]);
        let out = play(&mut state, 0, "guess 1 0 2");
        assert_eq!(out, vec![to(player(0), Notice::NotNow(TurnStatus::Inactive))]);
        let out = play(&mut state, 3, "show 0");
        assert_eq!(out, vec![to(player(3), Notice::NotNow(TurnStatus::Inactive))]);

        assert_eq!(state.board, before);
        assert_eq!(state.turns.active(), Some((player(2), TurnStatus::Pass)));
    }

    #[test]
    fn test_guess_guards() {
        let mut state = main_play_game();
        play(&mut state, 2, "pass 0");

        // 不能猜搭档的牌
        let out = play(&mut state, 0, "guess 2 1 3");
        assert_eq!(out, help(player(0), HelpTopic::MainPlay));
        // 超出范围
        let out = play(&mut state, 0, "guess 1 6 3");
        assert_eq!(out, help(player(0), HelpTopic::MainPlay));
        let out = play(&mut state, 0, "guess 1 0 13");
        assert_eq!(out, help(player(0), HelpTopic::MainPlay));

        // 已经公开的牌
        state.board.reveal_to_all(player(1), pos(0));
        let out = play(&mut state, 0, "guess 1 0 2");
        assert_eq!(out, vec![to(player(0), Notice::AlreadyVisible)]);
        assert_eq!(state.turns.active(), Some((player(0), TurnStatus::Guess)));
    }

    #[test]
    fn test_view_and_help_in_main_play() {
        let mut state = main_play_game();
        let out = play(&mut state, 1, "view");
        assert_eq!(out, vec![to(player(1), Notice::Board(state.board.board_view(player(1))))]);
        let out = play(&mut state, 1, "nonsense");
        assert_eq!(out, help(player(1), HelpTopic::MainPlay));
        let out = play(&mut state, 1, "swap 1");
        assert_eq!(out, help(player(1), HelpTopic::MainPlay));
    }

    #[test]
    fn test_full_turn_cycle() {
        // 2 传 -> 0 猜对 -> 3 传 -> 1 猜错 -> 1 亮牌 -> 0 传
        let mut state = main_play_game();
        play(&mut state, 2, "pass 0");
        play(&mut state, 0, "guess 3 0 4");
        assert_eq!(state.turns.active(), Some((player(3), TurnStatus::Pass)));
        play(&mut state, 3, "pass 1");
        assert_eq!(state.turns.active(), Some((player(1), TurnStatus::Guess)));
        play(&mut state, 1, "guess 0 0 12");
        play(&mut state, 1, "show 5");
        assert_eq!(state.turns.active(), Some((player(0), TurnStatus::Pass)));
    }

    #[test]
    fn test_incorrect_declaration_loses() {
        // 场景 D
        let mut state = main_play_game();
        let out = play(&mut state, 1, "declare");
        assert_eq!(state.phase, GamePhase::Declare { declarer: player(1) });
        assert_eq!(state.turns.active(), Some((player(1), TurnStatus::Declare)));
        assert_eq!(out[0], everyone(Notice::Declaring(player(1))));

        // 玩家 0 位置 0 是 S1
        let out = play(&mut state, 1, "declare 0 0 5");
        assert_eq!(
            state.outcome(),
            Some(Outcome { declarer: player(1), winners: Partnership::ZeroTwo })
        );
        assert!(!state.board.has_undeclared_cards());
        let lost = out.iter().position(|o| o.notice == Notice::Lost(Partnership::OneThree)).unwrap();
        let won = out.iter().position(|o| o.notice == Notice::Won(Partnership::ZeroTwo)).unwrap();
        assert!(lost < won);
        assert!(out.iter().any(|o| matches!(o.notice, Notice::Declared { correct: false, .. })));
    }

    #[test]
    fn test_complete_declaration_wins() {
        let mut state = main_play_game();
        play(&mut state, 2, "pass 4");
        play(&mut state, 0, "declare");
        // 自己的 6 张和搭档传来的 1 张已经公开
        assert_eq!(state.board.hidden_count(), 17);

        let mut hidden = state.board.hidden_count();
        let mut out = vec![];
        for target in [1u8, 2, 3] {
            for index in 0..6u8 {
                if state.board.card(player(target), pos(index)).is_public() {
                    continue;
                }
                let true_rank = state.board.rank_at(player(target), pos(index)).value();
                out = play(&mut state, 0, &format!("declare {target} {index} {true_rank}"));
                let now = state.board.hidden_count();
                assert!(now < hidden, "每次正确宣告都应减少隐藏的牌");
                hidden = now;
            }
        }

        assert_eq!(state.outcome(), Some(Outcome { declarer: player(0), winners: Partnership::ZeroTwo }));
        assert!(out.contains(&everyone(Notice::Won(Partnership::ZeroTwo))));
        assert!(out.contains(&everyone(Notice::Lost(Partnership::OneThree))));
        assert_eq!(state.turns.active_count(), 0);
    }

    #[test]
    fn test_declare_phase_restrictions() {
        let mut state = main_play_game();
        play(&mut state, 3, "declare");

        let out = play(&mut state, 0, "declare 1 0 2");
        assert_eq!(out, vec![to(player(0), Notice::NotNow(TurnStatus::Inactive))]);
        let out = play(&mut state, 2, "pass 0");
        assert_eq!(out, vec![to(player(2), Notice::NotNow(TurnStatus::Inactive))]);
        let out = play(&mut state, 0, "help");
        assert_eq!(out, help(player(0), HelpTopic::Declare));
        // 自己的牌已经公开
        let out = play(&mut state, 3, "declare 3 0 4");
        assert_eq!(out, vec![to(player(3), Notice::AlreadyVisible)]);
        assert_eq!(state.phase, GamePhase::Declare { declarer: player(3) });
    }

    #[test]
    fn test_input_after_game_over_is_ignored() {
        let mut state = main_play_game();
        play(&mut state, 1, "declare");
        play(&mut state, 1, "declare 0 0 5");
        assert!(state.is_over());
        assert!(play(&mut state, 2, "view").is_empty());
    }
}
