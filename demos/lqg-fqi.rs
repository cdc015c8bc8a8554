/// LQG Fitted Q-Iteration Example
///
/// Compares the greedy policy of FQI with a quadratic model to the optimal linear controller.
use ndarray::array;
use rand::SeedableRng;
use refit::envs::Lqg1d;
use refit::evaluation::{evaluate_policy, EvaluationConfig};
use refit::logging::{ByTime, DisplayLogger, StatsLogger};
use refit::policy::LinearGaussianPolicy;
use refit::regressors::{LinearRegression, LinearRegressionConfig};
use refit::{collect_episodes, CollectConfig, Fqi, FqiConfig, Policy, Prng};
use std::time::Duration;

fn main() {
    let env = Lqg1d::default();
    println!("Env:\n{:#?}\n", env);
    let k = env.compute_optimal_k();
    println!("Optimal gain: {:.4}", k);
    println!("Optimal return: {:.4}\n", env.compute_j(k, 0.0));

    let mut rng = Prng::seed_from_u64(0);
    let mut logger = DisplayLogger::new(ByTime::new(Duration::from_secs(1)));

    let dataset = collect_episodes(
        &env,
        None,
        &CollectConfig {
            n_episodes: 200,
            ..CollectConfig::default()
        }
        .with_all_cpus(),
        &mut rng,
        &mut (&mut logger).with_scope("collect"),
    );

    let actions: Vec<f64> = (0..65).map(|i| -8.0 + 0.25 * f64::from(i)).collect();
    let mut fqi = Fqi::new(
        LinearRegression::new(LinearRegressionConfig::new(2, 0.0)),
        1,
        FqiConfig {
            gamma: env.discount_factor,
            horizon: 30,
            discrete_actions: actions,
        },
    )
    .unwrap();
    fqi.fit_dataset(&dataset, &mut (&mut logger).with_scope("fqi"))
        .unwrap();

    let eval_config = EvaluationConfig {
        n_episodes: 1000,
        ..EvaluationConfig::default()
    }
    .with_all_cpus();
    let fqi_eval = evaluate_policy(&env, &fqi, &eval_config, None, &mut rng, &mut logger).unwrap();
    let optimal = LinearGaussianPolicy::scalar(k, 0.0);
    let optimal_eval =
        evaluate_policy(&env, &optimal, &eval_config, None, &mut rng, &mut logger).unwrap();
    drop(logger); // Flush output before the following prints

    println!("    x  fqi action  optimal action");
    for x in [-6.0, -3.0, -1.0, 1.0, 3.0, 6.0] {
        let action = fqi.draw_action(array![x].view(), &mut rng);
        println!("{:>5.1}  {:>10.3}  {:>14.3}", x, action, k * x);
    }
    println!(
        "\nFQI return:     {:.3} ± {:.3}",
        fqi_eval.mean, fqi_eval.confidence
    );
    println!(
        "Optimal return: {:.3} ± {:.3}",
        optimal_eval.mean, optimal_eval.confidence
    );
}
