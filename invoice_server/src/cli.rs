use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
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
    // Only variables that can never hold a credential
    const DISPLAY_ENVS: [&str; 20] = [
        "RUST_LOG",
        "IPG_HOST",
        "IPG_PORT",
        "IPG_DATABASE_URL",
        "IPG_GATEWAY_URL",
        "IPG_GATEWAY_TIMEOUT_SECS",
        "IPG_GATEWAY_MAX_ATTEMPTS",
        "IPG_WEBHOOK_SIGNATURE_HEADER",
        "IPG_ALLOW_UNSIGNED_WEBHOOKS",
        "IPG_MAILER_URL",
        "IPG_MAIL_FROM",
        "IPG_ADMIN_EMAIL",
        "IPG_PRICE_FEEDS",
        "IPG_COINGECKO_ID",
        "IPG_BINANCE_SYMBOL",
        "IPG_FIXED_TOKEN_PRICE",
        "IPG_PRICE_TTL_SECS",
        "IPG_STUCK_INVOICE_MINUTES",
        "IPG_USER_EMAIL_GRACE_MINUTES",
        "IPG_ESCALATION_COOLDOWN_MINUTES",
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
