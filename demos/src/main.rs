//! Phasic Policy Gradient demos
//!
//! ```bash
//! # PPG on CartPole
//! RUST_LOG=info cargo run --release -- ppg
//!
//! # Same, with a linearly annealed policy learning rate
//! RUST_LOG=info cargo run --release -- ppg-anneal-lr
//! ```

mod cartpole;
mod ppg_cartpole;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "ppg" => ppg_cartpole::run(false),
            "ppg-anneal-lr" => ppg_cartpole::run(true),
            _ => {
                println!("Unknown demo: {}", args[1]);
                println!();
                print_usage();
            }
        }
    } else {
        print_usage();
    }
}

fn print_usage() {
    println!("Usage: cargo run --release -- <demo>");
    println!();
    println!("  ppg               PPG on CartPole (16 envs, aux phase every 8 iterations)");
    println!("  ppg-anneal-lr     Same, policy learning rate annealed 1e-3 -> 1e-5");
}
