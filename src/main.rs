use std::fs;
use std::io::Read;
use std::process::exit;

use anyhow::Result;
use scssc_compiler::Compiler;
use scssc_config::{Config, LoadPaths};
use simple_logger::SimpleLogger;

fn bail(message: &str) -> ! {
    eprintln!("{message}");
    exit(1);
}

fn main() -> Result<()> {
    let matches = clap::Command::new("scssc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles SCSS to plain CSS")
        .arg(
            clap::Arg::new("input")
                .help("The .scss file to compile; stdin when omitted or `-`")
                .index(1),
        )
        .arg(
            clap::Arg::new("output")
                .help("Write the CSS to this file instead of stdout")
                .short('o')
                .long("output"),
        )
        .arg(
            clap::Arg::new("compress")
                .help("Compress the output")
                .short('C')
                .long("compress")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("load-paths")
                .help("Comma-separated directories probed by @import")
                .short('I')
                .long("load-paths"),
        )
        .arg(
            clap::Arg::new("static-root")
                .help("Directory holding static source assets")
                .long("static-root"),
        )
        .arg(
            clap::Arg::new("assets-root")
                .help("Directory generated assets are written to")
                .long("assets-root"),
        )
        .arg(
            clap::Arg::new("debug-info")
                .help("Emit -sass-debug-info media rules")
                .long("debug-info")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("debug")
                .help("Enable debug logging; expression errors become fatal")
                .short('d')
                .long("debug")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("verbosity")
                .help("Verbosity level")
                .short('v')
                .long("verbosity")
                .value_parser(clap::value_parser!(i64))
                .default_value("1"),
        )
        .get_matches();

    let debug = matches.get_flag("debug");
    let logger = SimpleLogger::new();
    let logger = if debug {
        logger.with_level(log::LevelFilter::Debug)
    } else {
        logger.with_level(log::LevelFilter::Warn)
    };
    logger.init()?;

    let mut config = Config {
        debug,
        verbosity: *matches.get_one::<i64>("verbosity").unwrap_or(&1),
        ..Default::default()
    };
    if let Some(paths) = matches.get_one::<String>("load-paths") {
        config.load_paths = LoadPaths::Joined(paths.clone());
    }
    if let Some(root) = matches.get_one::<String>("static-root") {
        config.static_root = root.clone();
    }
    if let Some(root) = matches.get_one::<String>("assets-root") {
        config.assets_root = root.clone();
    }

    let input = match matches.get_one::<String>("input") {
        Some(path) if path != "-" => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => bail(&format!("Could not read {path}: {e}")),
        },
        _ => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let mut compiler = Compiler::new(config);
    compiler.set_option("compress", i64::from(matches.get_flag("compress")));
    compiler.set_option("debug_info", i64::from(matches.get_flag("debug-info")));

    let css = match compiler.compile_string(&input) {
        Ok(css) => css,
        Err(e) => bail(&format!("Compilation failed: {e}")),
    };

    match matches.get_one::<String>("output") {
        Some(path) => fs::write(path, css)?,
        None => print!("{css}"),
    }
    Ok(())
}
