//! Default value functions for serde deserialization.
//!
//! These functions forward to constants defined in `taosocks_core::defaults`.

use taosocks_core::defaults;

/// Generate default value functions that forward to taosocks_core::defaults constants.
macro_rules! default_fns {
    // For Copy types (integers, bool, etc.)
    ($($fn_name:ident => $const_name:ident : $ty:ty),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> $ty {
                defaults::$const_name
            }
        )*
    };
}

/// Generate default value functions that return String from &str constants.
macro_rules! default_string_fns {
    ($($fn_name:ident => $const_name:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name() -> String {
                defaults::$const_name.to_string()
            }
        )*
    };
}

default_fns! {
    default_tls_handshake_timeout_secs => DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64,
    default_direct_dial_timeout_secs   => DEFAULT_DIRECT_DIAL_TIMEOUT_SECS: u64,
    // TCP socket options
    default_tcp_no_delay          => DEFAULT_TCP_NO_DELAY: bool,
    default_tcp_keepalive_secs    => DEFAULT_TCP_KEEPALIVE_SECS: u64,
}

default_string_fns! {
    default_listen          => DEFAULT_LISTEN,
    default_server          => DEFAULT_SERVER,
    default_path            => DEFAULT_UPGRADE_PATH,
    default_rules_path      => DEFAULT_RULES_PATH,
    default_auto_rules_path => DEFAULT_AUTO_RULES_PATH,
}
