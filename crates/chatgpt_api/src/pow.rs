//! SHA3-512 proof-of-work solver for the sentinel challenge.
//!
//! The server hands out a seed and a hex difficulty; the client must find
//! an iteration counter whose fingerprint hash starts at or below the
//! difficulty bytes. The fingerprint array mimics what the web app
//! collects from `navigator`/`window`; the server validates the hash, not
//! the individual values.

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::FixedOffset;
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use sha3::{Digest, Sha3_512};

/// Literal prefix the server expects on every proof token.
const TOKEN_PREFIX: &str = "gAAAAAB";

/// Plausible `hardwareConcurrency` values.
const CORES: [u32; 5] = [8, 12, 16, 24, 32];
/// Plausible screen width+height sums.
const SCREENS: [u32; 4] = [1920 + 1080, 2560 + 1440, 1920 + 1200, 2560 + 1600];
/// JS performance constant observed in real fingerprints.
const PERFORMANCE_CONSTANT: u64 = 4_294_705_152;

fn process_start() -> Instant {
    static STARTED: OnceLock<Instant> = OnceLock::new();
    *STARTED.get_or_init(Instant::now)
}

fn epoch_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0
}

/// Current time rendered like JS `Date.toString()` pinned to EST.
fn js_style_timestamp() -> String {
    let est = FixedOffset::west_opt(5 * 3600).expect("static UTC-5 offset must be valid");
    let now = chrono::Utc::now().with_timezone(&est);
    format!(
        "{} GMT-0500 (Eastern Standard Time)",
        now.format("%a %b %d %Y %H:%M:%S")
    )
}

/// Precomputed JSON segments of the fingerprint array. Slots 3 and 9 hold
/// the iteration counters and are the only parts rebuilt per candidate.
#[derive(Debug, Clone)]
struct FingerprintParts {
    head: String,
    middle: String,
    tail: String,
}

fn fingerprint_parts(user_agent: &str) -> FingerprintParts {
    let mut rng = rand::thread_rng();
    let screen = *SCREENS.choose(&mut rng).unwrap_or(&SCREENS[0]);
    let cores = *CORES.choose(&mut rng).unwrap_or(&CORES[0]);
    let perf_now_ms = process_start().elapsed().as_secs_f64() * 1000.0;
    let navigation_start_ms = epoch_ms() - perf_now_ms;

    let head_slots: Vec<Value> = vec![
        json!(screen),
        json!(js_style_timestamp()),
        json!(PERFORMANCE_CONSTANT),
    ];
    let middle_slots: Vec<Value> = vec![
        json!(user_agent),
        json!(""),
        json!(""),
        json!("en-US"),
        json!("en-US,en;q=0.9"),
    ];
    let tail_slots: Vec<Value> = vec![
        json!(cores),
        json!(perf_now_ms),
        json!(uuid::Uuid::new_v4().to_string()),
        json!(""),
        json!(navigation_start_ms),
    ];

    // "[a,b,c" + "," / ",d,...,h," / ",i,...,m]" around the two counters.
    let head = serde_json::to_string(&head_slots).unwrap_or_default();
    let middle = serde_json::to_string(&middle_slots).unwrap_or_default();
    let tail = serde_json::to_string(&tail_slots).unwrap_or_default();
    FingerprintParts {
        head: format!("{},", &head[..head.len() - 1]),
        middle: format!(",{},", &middle[1..middle.len() - 1]),
        tail: format!(",{}", &tail[1..]),
    }
}

/// Search for a proof token satisfying `difficulty_hex`.
///
/// Returns `None` when the difficulty does not decode or the iteration
/// ceiling is exhausted. Exhaustion is not an error: the caller proceeds
/// without a proof and expects a possible 403 downstream. Pure aside from
/// clock/rng sampling; safe to call repeatedly.
#[must_use]
pub fn solve(
    seed: &str,
    difficulty_hex: &str,
    user_agent: &str,
    max_iterations: u32,
) -> Option<String> {
    let target = hex::decode(difficulty_hex.trim()).ok()?;
    let prefix_len = target.len().min(Sha3_512::output_size());
    let parts = fingerprint_parts(user_agent);
    let seed_bytes = seed.as_bytes();

    for i in 0..max_iterations {
        let config_json = format!("{}{}{}{}{}", parts.head, i, parts.middle, i >> 1, parts.tail);
        let encoded = STANDARD.encode(config_json.as_bytes());

        let mut hasher = Sha3_512::new();
        hasher.update(seed_bytes);
        hasher.update(encoded.as_bytes());
        let digest = hasher.finalize();

        if digest[..prefix_len] <= target[..prefix_len] {
            log::debug!("pow: solved in {} iterations", i + 1);
            return Some(format!("{TOKEN_PREFIX}{encoded}"));
        }
    }

    log::warn!("pow: unsolved after {max_iterations} iterations");
    None
}

/// Re-run the hash on a returned token's payload and check it against the
/// difficulty that produced it.
#[must_use]
pub fn verify(token: &str, seed: &str, difficulty_hex: &str) -> bool {
    let Some(encoded) = token.strip_prefix(TOKEN_PREFIX) else {
        return false;
    };
    let Ok(target) = hex::decode(difficulty_hex.trim()) else {
        return false;
    };
    let prefix_len = target.len().min(Sha3_512::output_size());

    let mut hasher = Sha3_512::new();
    hasher.update(seed.as_bytes());
    hasher.update(encoded.as_bytes());
    let digest = hasher.finalize();

    digest[..prefix_len] <= target[..prefix_len]
}
