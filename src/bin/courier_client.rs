use std::io::{self, Write};
use std::sync::Arc;
use std::{env, process};

use courier::client::{ClientDriver, ClientError, StdinLines, format_notice};
use courier::config::{CliArgs, ClientSettings, Config, LogSettings};
use courier::log::LogSink;
use courier::log::logger::Logger;

fn prompt(text: &str) -> Option<String> {
    print!("{text}");
    let _ = io::stdout().flush();
    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_owned()),
    }
}

fn ask_yes_no(question: &str) -> bool {
    loop {
        match prompt(&format!("{question} (y/n): ")).as_deref() {
            Some("y") | Some("Y") => return true,
            Some("n") | Some("N") | None => return false,
            Some(_) => continue,
        }
    }
}

fn fetch(driver: &mut ClientDriver) {
    let Some(name) = prompt("File name: ") else {
        return;
    };
    let res = driver.fetch_with_retry(&name, |err, attempt| {
        println!("Attempt {attempt} failed: {err}");
        ask_yes_no("Retry the download?")
    });
    match res {
        Ok(report) => println!(
            "Received {} ({} bytes, {} chunks), sha256 {}",
            report.name, report.size, report.chunks, report.digest
        ),
        Err(e) => println!("Download failed: {e}"),
    }
}

fn chat(driver: &mut ClientDriver) -> Result<(), ClientError> {
    println!("Entering chat. Type /exit to leave.");
    let summary = driver.chat(StdinLines, |notice| println!("{}", format_notice(&notice)))?;
    println!(
        "Left the chat ({} sent, {} received).",
        summary.sent, summary.received
    );
    Ok(())
}

fn main() {
    let mut argv = env::args();
    let prog = argv.next().unwrap_or_else(|| "courier-client".into());

    let args = CliArgs::parse(argv).unwrap_or_else(|e| {
        eprintln!("{e}");
        eprintln!("Usage: {prog} [--config PATH] [SERVER_ADDR]");
        process::exit(1);
    });
    let config = Config::discover(args.config.as_deref()).unwrap_or_else(|e| {
        eprintln!("[courier-client] {e}");
        process::exit(1);
    });
    let mut settings = ClientSettings::from_config(&config);
    match args.positional.as_slice() {
        [] => {}
        [addr] => settings.server_addr = addr.clone(),
        _ => {
            eprintln!("Usage: {prog} [--config PATH] [SERVER_ADDR]");
            process::exit(1);
        }
    }

    let logger = Logger::start(&LogSettings::from_config(&config, "client"), 256);
    let log_sink: Arc<dyn LogSink> = Arc::new(logger.handle());

    let mut driver = match ClientDriver::connect(&settings, log_sink) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Could not reach {}: {e}", settings.server_addr);
            process::exit(1);
        }
    };
    println!("Connected to {}.", settings.server_addr);

    loop {
        println!();
        println!("1 - Fetch file");
        println!("2 - Chat");
        println!("3 - Exit");
        let Some(choice) = prompt("> ") else {
            break;
        };
        match choice.as_str() {
            "1" => fetch(&mut driver),
            "2" => {
                if let Err(e) = chat(&mut driver) {
                    println!("Chat ended: {e}");
                }
            }
            "3" => break,
            _ => println!("Choose 1, 2 or 3."),
        }
        if !driver.is_connected() {
            println!("Connection to the server was lost.");
            process::exit(1);
        }
    }

    if let Err(e) = driver.exit() {
        eprintln!("{e}");
    }
    println!("Bye.");
}
