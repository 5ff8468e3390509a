use std::sync::Arc;
use std::{env, process};

use courier::config::{CliArgs, Config, HttpSettings, LogSettings};
use courier::http::HttpServer;
use courier::log::LogSink;
use courier::log::logger::Logger;

fn usage(prog: &str) -> ! {
    eprintln!("Usage:");
    eprintln!("  {prog} [--config PATH]                # address from config (default 127.0.0.1:8080)");
    eprintln!("  {prog} [--config PATH] [ADDR]         # e.g. 0.0.0.0:8081");
    eprintln!("  {prog} [--config PATH] [IP] [PORT]    # e.g. 127.0.0.1 8081");
    process::exit(1);
}

fn main() -> std::io::Result<()> {
    let mut argv = env::args();
    let prog = argv.next().unwrap_or_else(|| "courier-http".into());

    let args = CliArgs::parse(argv).unwrap_or_else(|e| {
        eprintln!("{e}");
        usage(&prog)
    });
    let config = Config::discover(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("[courier-http] {e}");
        process::exit(1);
    });
    let mut settings = HttpSettings::from_config(&config);
    if let Err(e) = args.apply_listen_addr(&mut settings.bind_ip, &mut settings.port) {
        eprintln!("{e}");
        usage(&prog);
    }

    let logger = Logger::start(&LogSettings::from_config(&config, "http"), 1024);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());
    eprintln!(
        "[courier-http] serving {} (log: {})",
        settings.root_dir.display(),
        logger.file_path().display()
    );

    HttpServer::new(settings, log_sink).run()
}
