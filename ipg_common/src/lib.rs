mod helpers;
mod secret;

pub use helpers::{env_flag, env_minutes, env_seconds, parse_boolean_flag, parse_list};
pub use secret::Secret;
