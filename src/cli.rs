use clap::{value_parser, Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("power-monitor")
        .about("Electricity usage monitor for Nature Remo Lite (Nature cloud API)")
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .num_args(1)
                .help("Override RUST_LOG level (e.g., info, debug)"),
        )
        .arg(
            Arg::new("watch")
                .long("watch")
                .help("Keep polling ECHONET Lite readings instead of printing one report")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("interval")
                .long("interval")
                .num_args(1)
                .value_parser(value_parser!(u64).range(1..))
                .help("Seconds between polls in --watch mode (default: NATURE_POLL_INTERVAL_SECS or 60)"),
        )
        .arg(
            Arg::new("version")
                .long("version")
                .help("Print version and exit")
                .action(ArgAction::SetTrue),
        )
}

pub fn init_logging(level: Option<&str>) {
    // Explicit level wins over RUST_LOG; default to info.
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(lvl) = level {
        builder.parse_filters(lvl);
    }
    builder.init();
}
