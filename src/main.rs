fn main() {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Err(err) = bandalign::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
