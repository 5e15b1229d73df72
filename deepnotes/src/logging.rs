/// Install the global logger at `level`. Logs to the terminal if there is one, else to "log.out" in the
/// working directory.
///
/// Only the first call in a process has any effect.
pub fn init(level: log::LevelFilter) {
    let has_term = std::io::IsTerminal::is_terminal(&std::io::stderr());
    if has_term {
        let _ = env_logger::builder().filter_level(level).try_init();
    } else {
        let _ = simple_logging::log_to_file("log.out", level);
    }
}

/// Logger for tests, output captured per test.
#[cfg(test)]
pub(crate) fn init_test() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}
