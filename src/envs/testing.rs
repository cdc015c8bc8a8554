//! Environment testing utilities
use super::{Environment, Successor};
use crate::spaces::Space;
use crate::Prng;
use rand::distributions::Distribution;
use rand::SeedableRng;

/// Run an environment with uniform random actions and check that invariants are satisfied.
///
/// Checks reward bounds, the discount factor range, that non-absorbing states lie in the
/// observation space, and that states can be recreated from their observations.
pub fn check_env<E: Environment>(env: &E, num_steps: u64, seed: u64) {
    let observation_space = env.observation_space();
    let action_space = env.action_space();
    let (min_reward, max_reward) = env.reward_range();
    let discount_factor = env.discount_factor();
    let horizon = env.horizon();
    assert!(discount_factor >= 0.0);
    assert!(discount_factor <= 1.0);
    assert!(horizon > 0);
    assert_eq!(env.action_dim(), 1);

    let mut rng = Prng::seed_from_u64(seed);
    let mut state = env.initial_state(&mut rng);
    let mut t = 0;
    for _ in 0..num_steps {
        let observation = env.observe(&state);
        assert_eq!(observation.len(), env.state_dim());
        assert!(
            observation_space.contains(&observation),
            "{} not in {}",
            observation,
            observation_space
        );

        let recreated = env
            .state_from_observation(observation.view())
            .expect("observation should be a valid state");
        let recreated_observation = env.observe(&recreated);
        assert!(
            (&recreated_observation - &observation)
                .iter()
                .all(|d| d.abs() < 1e-9),
            "{} != {}",
            recreated_observation,
            observation
        );

        let action = action_space.sample(&mut rng);
        assert!(action_space.contains(&action));
        let (successor, reward) = env.step(state, action, &mut rng, &mut ());
        assert!(reward >= min_reward, "reward {} < {}", reward, min_reward);
        assert!(reward <= max_reward, "reward {} > {}", reward, max_reward);

        t += 1;
        state = match successor {
            Successor::Continue(next) if t < horizon => next,
            _ => {
                t = 0;
                env.initial_state(&mut rng)
            }
        };
    }
}
