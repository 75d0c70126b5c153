use pimc_bot::{Agent, MemorySink, MonteCarloEngine, PimcAgent, RandomAgent, SearchConfig};
use pimc_core::games::{CoinGame, TrickConfig, TrickGame};
use pimc_core::model::seat::Seat;
use pimc_core::tree::{GameIterator, ScoreAggregator};

#[test]
fn symmetric_game_scores_every_call_alike() {
    let engine = MonteCarloEngine::new(SearchConfig::default().with_rollouts(2000)).unwrap();
    let cursor = GameIterator::new(CoinGame::new(2, 3, 1), 0);
    let outcome = engine.evaluate(&cursor, Seat::new(0), 3, 2024).unwrap();
    let values = outcome.utilities.values();
    for value in values {
        assert!((value - 0.75).abs() < 0.03, "utility {value}");
    }
    let spread = values.iter().cloned().fold(f64::MIN, f64::max)
        - values.iter().cloned().fold(f64::MAX, f64::min);
    assert!(spread < 0.04, "spread {spread}");
}

#[test]
fn make_action_stays_in_range() {
    for options in 1..6 {
        for rollouts in [1, 3] {
            let cursor = GameIterator::new(CoinGame::new(3, options, 2), options as u64);
            let mut agent =
                PimcAgent::<CoinGame>::new(Seat::new(0), SearchConfig::default().with_rollouts(rollouts).with_seed(9))
                    .unwrap()
                    .with_sink(Box::new(MemorySink::default()));
            let choice = agent.make_action(&cursor, options).unwrap();
            assert!(choice < options);
            let utilities = agent.last_outcome().unwrap().utilities.values().to_vec();
            assert!(utilities.iter().all(|u| (0.0..=1.0 + 1e-9).contains(u)));
        }
    }
}

#[test]
fn full_trick_game_against_random_seats() {
    let world = TrickGame::new(TrickConfig {
        players: 3,
        hand_size: 4,
    })
    .unwrap();
    let mut cursor = GameIterator::new(world, 31);
    let mut agents: Vec<Box<dyn Agent<TrickGame>>> = vec![
        Box::new(
            PimcAgent::<TrickGame>::new(Seat::new(0), SearchConfig::default().with_rollouts(6))
                .unwrap()
                .with_sink(Box::new(MemorySink::default())),
        ),
        Box::new(RandomAgent::new(Seat::new(1), 1)),
        Box::new(RandomAgent::new(Seat::new(2), 2)),
    ];

    while !cursor.advance_to_choice().unwrap() {
        let seat = cursor.current_seat().unwrap();
        let options = cursor.build_options().unwrap();
        let agent = &mut agents[seat.index()];
        assert_eq!(agent.seat(), seat);
        let choice = agent.make_action(&cursor, options.len()).unwrap();
        cursor.execute_all(&options[choice]).unwrap();
        cursor.pop_current_node().unwrap();
    }

    let ranks = cursor.process_score().unwrap();
    assert!(ranks.is_permutation());
    assert_eq!(cursor.world().played().len(), 12);
    assert_eq!(cursor.world().final_scores().len(), 3);
}
