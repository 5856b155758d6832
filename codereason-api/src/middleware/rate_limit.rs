/// Per-user rate limiting
///
/// Token bucket rate limiting with the bucket state in Redis, so every API
/// instance shares one budget per user. Budgets follow the caller's effective
/// subscription tier. When `REDIS_URL` is unset the layer is a no-op.
///
/// # Rate Limits by Tier
///
/// - **Free**: 30 requests/minute
/// - **Trial**: 60 requests/minute
/// - **Pro**: 300 requests/minute
/// - **Enterprise**: 1000 requests/minute
///
/// # Storage
///
/// Key `ratelimit:user:{user_id}`, a hash of `tokens` and `last_refill`, with
/// a two-minute TTL.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: tokens left after this request
/// - `Retry-After`: seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use codereason_shared::auth::middleware::AuthContext;
use codereason_shared::models::user::SubscriptionTier;
use redis::aio::ConnectionManager;
use uuid::Uuid;

const BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
redis.call('EXPIRE', key, 120)

if allowed == 1 then
    return {1, math.floor(tokens), 0}
end
return {0, 0, math.ceil((1 - tokens) / refill_rate)}
"#;

/// Rate limit configuration for a tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    pub requests_per_minute: u32,

    /// Tokens added per second
    pub refill_rate: f64,

    /// Burst capacity
    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn for_tier(tier: SubscriptionTier) -> Self {
        let per_minute = match tier {
            SubscriptionTier::Free => 30,
            SubscriptionTier::Trial => 60,
            SubscriptionTier::Pro => 300,
            SubscriptionTier::Enterprise => 1000,
        };

        RateLimit {
            requests_per_minute: per_minute,
            refill_rate: per_minute as f64 / 60.0,
            bucket_capacity: per_minute,
        }
    }
}

/// Outcome of one bucket check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u32,

    /// Seconds until one token is available; zero when allowed
    pub retry_after: u64,
}

impl RateLimitResult {
    fn from_script(values: &[i64]) -> Option<Self> {
        match values {
            [allowed, remaining, retry_after] => Some(RateLimitResult {
                allowed: *allowed == 1,
                remaining: (*remaining).max(0) as u32,
                retry_after: (*retry_after).max(0) as u64,
            }),
            _ => None,
        }
    }
}

/// Takes one token from the user's bucket
pub async fn check_rate_limit(
    conn: &mut ConnectionManager,
    user_id: Uuid,
    limit: RateLimit,
) -> Result<RateLimitResult, redis::RedisError> {
    let key = format!("ratelimit:user:{}", user_id);
    let now = chrono::Utc::now().timestamp();

    let values: Vec<i64> = redis::Script::new(BUCKET_SCRIPT)
        .key(&key)
        .arg(limit.bucket_capacity)
        .arg(limit.refill_rate)
        .arg(now)
        .invoke_async(conn)
        .await?;

    RateLimitResult::from_script(&values).ok_or_else(|| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "unexpected rate limit script reply",
        ))
    })
}

/// Rate limiting middleware layer
///
/// Runs after authentication. A Redis failure lets the request through and
/// logs a warning.
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(mut conn) = state.redis.clone() else {
        return Ok(next.run(request).await);
    };

    let limit = RateLimit::for_tier(auth.tier);
    let result = match check_rate_limit(&mut conn, auth.user_id, limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, user_id = %auth.user_id, "Rate limit check failed");
            return Ok(next.run(request).await);
        }
    };

    if !result.allowed {
        tracing::debug!(user_id = %auth.user_id, retry_after = result.retry_after, "Rate limited");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.requests_per_minute));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_for_tiers() {
        let free = RateLimit::for_tier(SubscriptionTier::Free);
        assert_eq!(free.requests_per_minute, 30);
        assert_eq!(free.bucket_capacity, 30);
        assert!((free.refill_rate - 0.5).abs() < f64::EPSILON);

        assert_eq!(RateLimit::for_tier(SubscriptionTier::Trial).requests_per_minute, 60);
        assert_eq!(RateLimit::for_tier(SubscriptionTier::Pro).requests_per_minute, 300);
        assert_eq!(RateLimit::for_tier(SubscriptionTier::Enterprise).requests_per_minute, 1000);
    }

    #[test]
    fn test_higher_tiers_refill_faster() {
        let tiers = [
            SubscriptionTier::Free,
            SubscriptionTier::Trial,
            SubscriptionTier::Pro,
            SubscriptionTier::Enterprise,
        ];
        let rates: Vec<f64> = tiers.iter().map(|t| RateLimit::for_tier(*t).refill_rate).collect();
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_result_from_script() {
        assert_eq!(
            RateLimitResult::from_script(&[1, 29, 0]),
            Some(RateLimitResult {
                allowed: true,
                remaining: 29,
                retry_after: 0
            })
        );
        assert_eq!(
            RateLimitResult::from_script(&[0, 0, 2]).map(|r| (r.allowed, r.retry_after)),
            Some((false, 2))
        );
        assert_eq!(RateLimitResult::from_script(&[1]), None);
    }

    /// Needs a Redis server; skipped when `REDIS_URL` is unset
    async fn redis_conn() -> Option<ConnectionManager> {
        let url = std::env::var("REDIS_URL").ok()?;
        let client = redis::Client::open(url).ok()?;
        ConnectionManager::new(client).await.ok()
    }

    #[tokio::test]
    async fn test_bucket_drains_then_rejects() {
        let Some(mut conn) = redis_conn().await else { return };
        let user_id = Uuid::new_v4();
        let limit = RateLimit {
            requests_per_minute: 3,
            refill_rate: 0.05,
            bucket_capacity: 3,
        };

        let mut remaining = Vec::new();
        for _ in 0..3 {
            let result = check_rate_limit(&mut conn, user_id, limit).await.unwrap();
            assert!(result.allowed);
            assert_eq!(result.retry_after, 0);
            remaining.push(result.remaining);
        }
        assert_eq!(remaining, vec![2, 1, 0]);

        let rejected = check_rate_limit(&mut conn, user_id, limit).await.unwrap();
        assert!(!rejected.allowed);
        assert_eq!(rejected.remaining, 0);
        assert!(rejected.retry_after >= 1 && rejected.retry_after <= 20);

        // Buckets are per user
        let other = check_rate_limit(&mut conn, Uuid::new_v4(), limit).await.unwrap();
        assert!(other.allowed);
        assert_eq!(other.remaining, 2);
    }

    #[tokio::test]
    async fn test_bucket_key_expires() {
        let Some(mut conn) = redis_conn().await else { return };
        let user_id = Uuid::new_v4();

        check_rate_limit(&mut conn, user_id, RateLimit::for_tier(SubscriptionTier::Free))
            .await
            .unwrap();

        let ttl: i64 = redis::cmd("TTL")
            .arg(format!("ratelimit:user:{}", user_id))
            .query_async(&mut conn)
            .await
            .unwrap();
        assert!(ttl > 0 && ttl <= 120);
    }
}
