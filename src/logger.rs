use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Initializes console logging at the default `Info` level.
///
/// Optional: the library only emits through the `log` facade, so embedders
/// with their own logger in place should skip this.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    init_with(LevelFilter::Info)
}

/// Initializes console logging at the given level. Calling it twice
/// returns an error from the underlying logger; it does not panic.
pub fn init_with(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    let encoder = Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}"));
    let stdout = ConsoleAppender::builder().encoder(encoder).build();
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level))?;
    log4rs::init_config(config)?;
    Ok(())
}
