use std::{env, env::VarError};

/// There's no real CLI for the server. Any argument at all prints the help text and the current settings.
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // The hash key, hash IV and rate provider key are secret and are deliberately left off this list
    const DISPLAY_ENVS: [&str; 11] = [
        "RUST_LOG",
        "LPG_HOST",
        "LPG_PORT",
        "LPG_DATABASE_URL",
        "LPG_BASE_URL",
        "LPG_ECPAY_MERCHANT_ID",
        "LPG_ECPAY_API_URL",
        "LPG_ECPAY_IP_WHITELIST",
        "LPG_USE_X_FORWARDED_FOR",
        "LPG_USE_FORWARDED",
        "LPG_EXCHANGE_RATE_API_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
