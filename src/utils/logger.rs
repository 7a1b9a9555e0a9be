use env_logger::{Builder, Env};
use log::LevelFilter;
use std::io::Write;

pub fn init_logger() {
    let env = Env::default().filter_or("RUST_LOG", "warn,supertonic_studio=info");

    let mut builder = Builder::from_env(env);

    // Keep webview/runtime internals quiet unless something breaks
    builder
        .filter_module("wry", LevelFilter::Error)
        .filter_module("tracing", LevelFilter::Error)
        .filter_module("mio", LevelFilter::Error)
        .filter_module("tokio_util", LevelFilter::Error)
        .filter_module("tauri", LevelFilter::Warn)
        .filter_module("tao", LevelFilter::Error)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .target(env_logger::Target::Stderr)
        .init();
}
