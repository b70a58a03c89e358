use std::process::ExitCode;

use anyhow::Result;
use usdz_convert::directive::usage;
use usdz_convert::{ConvertError, Converter};

fn main() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Debug records pass the logger's filter; the global level gates them
    // until a request asks for `-v`.
    let explicit_filter = std::env::var_os(env_logger::DEFAULT_FILTER_ENV).is_some();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp(None)
        .init();
    if !explicit_filter {
        log::set_max_level(log::LevelFilter::Info);
    }

    let status = match Converter::default().run(&args) {
        Ok(status) => status,
        Err(e) => report(&e),
    };
    Ok(ExitCode::from(u8::try_from(status).unwrap_or(1)))
}

fn report(error: &ConvertError) -> i32 {
    match error {
        ConvertError::Usage(message) => {
            eprintln!("{}", usage::name_and_version());
            eprintln!("error: {}", message);
            eprintln!("{}", usage::MORE_INFORMATION);
        }
        other => log::error!("{}", other),
    }
    i32::from(error.exit_status())
}
