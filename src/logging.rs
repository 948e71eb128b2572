//! One-line `env_logger` init helper, called once from each binary's
//! `main`. Library code never initializes a logger itself, only calls
//! `log::{trace,debug,info,warn,error}` — see SPEC_FULL.md §10.

pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init();
}
