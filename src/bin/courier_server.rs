use std::sync::Arc;
use std::{env, process};

use courier::config::{CliArgs, Config, LogSettings, ServerSettings};
use courier::log::LogSink;
use courier::log::logger::Logger;
use courier::server::CourierServer;

fn usage(prog: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("  {prog} [--config PATH]                # address from config (default 127.0.0.1:5050)");
    eprintln!("  {prog} [--config PATH] [ADDR]         # e.g. 0.0.0.0:6000");
    eprintln!("  {prog} [--config PATH] [IP] [PORT]    # e.g. 127.0.0.1 6000");
    process::exit(1);
}

fn main() -> std::io::Result<()> {
    let mut argv = env::args();
    let prog = argv.next().unwrap_or_else(|| "courier-server".into());

    // --- Parse CLI args and config -----------------------------------------
    let args = CliArgs::parse(argv).unwrap_or_else(|e| {
        eprintln!("{e}");
        usage(&prog)
    });
    let config = Config::discover(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("[courier-server] {e}");
        process::exit(1);
    });
    let mut settings = ServerSettings::from_config(&config);
    if let Err(e) = args.apply_listen_addr(&mut settings.bind_ip, &mut settings.port) {
        eprintln!("{e}");
        usage(&prog);
    }

    // --- Start process logger ----------------------------------------------
    let logger = Logger::start(&LogSettings::from_config(&config, "server"), 1024);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    eprintln!(
        "[courier-server] starting on {} (log: {})",
        settings.bind_addr(),
        logger.file_path().display()
    );

    // --- Run server (blocks) -----------------------------------------------
    CourierServer::new(settings, log_sink).run()
}
