use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::{OrderStore, StoreError};

pub const ORDER_CODE_PREFIX: &str = "TIX-";
pub const SUFFIX_LEN: usize = 7;
const MAX_ATTEMPTS: usize = 10;
const FALLBACK_RANDOM_LEN: usize = 6;
const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

type SuffixSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Produces `TIX-XXXXXXX` codes that are not yet used by any order.
///
/// The pre-check only narrows the window for collisions; the store's unique
/// constraint is what finally guarantees uniqueness.
#[derive(Clone)]
pub struct OrderCodeGenerator {
    suffix: SuffixSource,
}

impl Default for OrderCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderCodeGenerator {
    pub fn new() -> Self {
        Self {
            suffix: Arc::new(|| random_chars(SUFFIX_LEN)),
        }
    }

    /// Uses `suffix` instead of the random source.
    pub fn with_source(suffix: impl Fn() -> String + Send + Sync + 'static) -> Self {
        Self {
            suffix: Arc::new(suffix),
        }
    }

    pub async fn generate(&self, store: &dyn OrderStore) -> Result<String, StoreError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let code = format!("{}{}", ORDER_CODE_PREFIX, (self.suffix)());
            if !store.order_code_exists(&code).await? {
                return Ok(code);
            }
            debug!(attempt, code = %code, "Order code collision, retrying");
        }

        let code = fallback_code();
        warn!(
            attempts = MAX_ATTEMPTS,
            code = %code,
            "Order code space congested, using timestamped fallback"
        );
        Ok(code)
    }
}

fn random_chars(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

/// Millisecond timestamp in base 36 plus random characters.
fn fallback_code() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    format!(
        "{}{}{}",
        ORDER_CODE_PREFIX,
        to_base36(millis),
        random_chars(FALLBACK_RANDOM_LEN)
    )
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        let digit = (n % 36) as u8;
        out.push(if digit < 10 {
            (b'0' + digit) as char
        } else {
            (b'A' + digit - 10) as char
        });
        n /= 36;
    }
    out.iter().rev().collect()
}
