/// Car-on-Hill Fitted Q-Iteration Example
use rand::SeedableRng;
use refit::envs::{CarOnHill, EnvStructure};
use refit::evaluation::{evaluate_policy, EvaluationConfig};
use refit::logging::{ByTime, DisplayLogger, StatsLogger};
use refit::regressors::{ActionRegressor, Ensemble, LinearRegression, LinearRegressionConfig};
use refit::spaces::DiscreteValuedSpace;
use refit::{collect_episodes, CollectConfig, Fqi, FqiConfig, Prng};
use std::time::Duration;

fn main() {
    let env = CarOnHill::default();
    println!("Env:\n{:#?}\n", env);

    let mut rng = Prng::seed_from_u64(0);
    let mut logger = DisplayLogger::new(ByTime::new(Duration::from_secs(1)));

    let collect_config = CollectConfig {
        n_episodes: 1000,
        ..CollectConfig::default()
    }
    .with_all_cpus();
    println!("Collect Config\n{:#?}\n", collect_config);
    let dataset = collect_episodes(
        &env,
        None,
        &collect_config,
        &mut rng,
        &mut (&mut logger).with_scope("collect"),
    );
    println!(
        "Collected {} transitions in {} episodes",
        dataset.num_transitions(),
        dataset.num_episodes()
    );

    let fqi_config = FqiConfig {
        gamma: env.discount_factor(),
        horizon: 20,
        discrete_actions: env.actions.clone(),
    };
    println!("FQI Config\n{:#?}\n", fqi_config);
    let regressor = Ensemble::new(ActionRegressor::new(
        LinearRegression::new(LinearRegressionConfig::new(2, 1e-4)),
        DiscreteValuedSpace::new(env.actions.clone()),
    ));
    let mut fqi = Fqi::new(regressor, env.state_dim(), fqi_config).unwrap();

    let eval_config = EvaluationConfig {
        n_episodes: 1,
        ..EvaluationConfig::default()
    };
    let sast = dataset.sast();
    let mut eval_rng = Prng::from_rng(&mut rng).unwrap();
    let mut curve = Vec::new();
    fqi.fit_with(
        sast.view(),
        dataset.rewards(),
        &mut (&mut logger).with_scope("fqi"),
        |fqi, iteration| {
            let evaluation =
                evaluate_policy(&env, fqi, &eval_config, None, &mut eval_rng, &mut ()).unwrap();
            curve.push((iteration, evaluation.mean, evaluation.steps_mean));
        },
    )
    .unwrap();
    drop(logger); // Flush output before the following prints

    println!("iteration  value  steps");
    for (iteration, value, steps) in curve {
        println!("{:>9}  {:>5.3}  {:>5}", iteration, value, steps);
    }
}
