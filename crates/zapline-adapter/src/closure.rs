// SPDX-FileCopyrightText: 2026 Zapline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classification of vendor socket closures.

use zapline_core::DisconnectReason;
use zapline_core::vendor::DisconnectInfo;

/// Session revoked from the phone. Stored credentials are useless afterwards.
pub const LOGGED_OUT: u16 = 401;
/// Account forbidden or banned.
pub const FORBIDDEN: u16 = 403;
/// Another device took over the session.
pub const CONNECTION_REPLACED: u16 = 440;

/// Status codes after which reconnecting cannot succeed.
const TERMINAL_CODES: &[u16] = &[LOGGED_OUT, FORBIDDEN, CONNECTION_REPLACED];

/// Map a close update to a disconnect reason.
///
/// Anything not known to be terminal (timeouts, 428, 500, 503, 515, or a
/// closure without a code) is transient.
pub fn classify(info: Option<&DisconnectInfo>) -> DisconnectReason {
    let code = info.and_then(|i| i.status_code);
    let message = info
        .map(|i| i.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| default_message(code).to_string());

    match code {
        Some(c) if TERMINAL_CODES.contains(&c) => DisconnectReason::Terminal { code, message },
        _ => DisconnectReason::Transient { code, message },
    }
}

/// Whether the closure revoked the pairing, so credentials must be discarded.
pub fn is_logged_out(reason: &DisconnectReason) -> bool {
    matches!(
        reason,
        DisconnectReason::Terminal {
            code: Some(LOGGED_OUT),
            ..
        }
    )
}

fn default_message(code: Option<u16>) -> &'static str {
    match code {
        Some(LOGGED_OUT) => "logged out",
        Some(FORBIDDEN) => "forbidden",
        Some(CONNECTION_REPLACED) => "connection replaced",
        Some(408) => "timed out",
        Some(428) => "connection closed",
        Some(500) => "bad session",
        Some(503) => "service unavailable",
        Some(515) => "restart required",
        _ => "connection lost",
    }
}
