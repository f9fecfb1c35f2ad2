//! Redis-backed job store.
//!
//! Layout, all under one namespace prefix:
//! - `{ns}:job:{hash}`      — HASH, one field per record column
//! - `{ns}:queued`          — ZSET, claim order (priority/queued-at)
//! - `{ns}:processing`      — ZSET scored by heartbeat millis
//! - `{ns}:instance:{id}`   — SET of hashes an instance holds
//! - `{ns}:stats`           — HASH of per-status record counters
//!
//! Every transition is a single Lua script, so the conditional check
//! and the index maintenance are one atomic step. Two instances racing
//! for the same record always produce exactly one winner; the loser
//! observes no matching record.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::Script;

use clipq_models::{ErrorEntry, JobRecord, JobStatus};

use crate::config::QueueConfig;
use crate::error::{QueueError, QueueResult};
use crate::store::JobStore;

/// Claim-order score: `queued_at_ms - priority * PRIORITY_STRIDE`,
/// lowest score claims first. The stride is 2^42, above any epoch
/// millis value, and priority is clamped to ±2000 so scores stay
/// exactly representable in the f64 ZSET range.
const PRIORITY_STRIDE: i64 = 1 << 42;
const PRIORITY_CLAMP: i64 = 2000;

/// Shared Lua helpers, prepended to every script that needs them.
const LUA_PRELUDE: &str = r#"
local function job_key(ns, hash) return ns .. ':job:' .. hash end
local function queued_score(qat, prio)
    local stride = 4398046511104
    if prio > 2000 then prio = 2000 elseif prio < -2000 then prio = -2000 end
    return qat - prio * stride
end
"#;

// ARGV: ns, hash, now_ms, then alternating field/value pairs of the new record
const SUBMIT_SCRIPT: &str = r#"
local ns = ARGV[1]
local hash = ARGV[2]
local now = tonumber(ARGV[3])
local key = job_key(ns, hash)
local status = redis.call('HGET', key, 'status')

if status then
    if status == 'failed' then
        redis.call('HSET', key, 'status', 'queued', 'attempts', 0, 'queued_at', now)
        redis.call('HDEL', key, 'last_error', 'failed_at', 'completed_at', 'started_at',
                   'instance_id', 'claimed_at', 'heartbeat_at')
        local prio = tonumber(redis.call('HGET', key, 'priority')) or 0
        redis.call('ZADD', ns .. ':queued', queued_score(now, prio), hash)
        redis.call('HINCRBY', ns .. ':stats', 'failed', -1)
        redis.call('HINCRBY', ns .. ':stats', 'queued', 1)
        return 'queued'
    end
    return status
end

redis.call('HSET', key, unpack(ARGV, 4))
local prio = tonumber(redis.call('HGET', key, 'priority')) or 0
redis.call('ZADD', ns .. ':queued', queued_score(now, prio), hash)
redis.call('HINCRBY', ns .. ':stats', 'queued', 1)
return 'queued'
"#;

// ARGV: ns, instance_id, now_ms
const CLAIM_SCRIPT: &str = r#"
local ns = ARGV[1]
local instance = ARGV[2]
local now = tonumber(ARGV[3])
local queued = ns .. ':queued'

local candidates = redis.call('ZRANGE', queued, 0, 15)
for _, hash in ipairs(candidates) do
    local key = job_key(ns, hash)
    local vals = redis.call('HMGET', key, 'status', 'attempts', 'max_attempts')
    local attempts = tonumber(vals[2]) or 0
    local max = tonumber(vals[3]) or 0
    if vals[1] == 'queued' and attempts < max then
        redis.call('ZREM', queued, hash)
        redis.call('HSET', key, 'status', 'processing', 'instance_id', instance,
                   'attempts', attempts + 1, 'claimed_at', now, 'started_at', now,
                   'heartbeat_at', now)
        redis.call('ZADD', ns .. ':processing', now, hash)
        redis.call('SADD', ns .. ':instance:' .. instance, hash)
        redis.call('HINCRBY', ns .. ':stats', 'queued', -1)
        redis.call('HINCRBY', ns .. ':stats', 'processing', 1)
        return hash
    end
    -- index entry no longer eligible; drop it
    redis.call('ZREM', queued, hash)
end
return false
"#;

// ARGV: ns, hash, instance_id, now_ms
const HEARTBEAT_SCRIPT: &str = r#"
local ns = ARGV[1]
local hash = ARGV[2]
local key = job_key(ns, hash)
local vals = redis.call('HMGET', key, 'status', 'instance_id')
if vals[1] == 'processing' and vals[2] == ARGV[3] then
    redis.call('HSET', key, 'heartbeat_at', tonumber(ARGV[4]))
    redis.call('ZADD', ns .. ':processing', tonumber(ARGV[4]), hash)
    return 1
end
return 0
"#;

// ARGV: ns, instance_id, now_ms
const HEARTBEAT_ALL_SCRIPT: &str = r#"
local ns = ARGV[1]
local instance = ARGV[2]
local now = tonumber(ARGV[3])
local set = ns .. ':instance:' .. instance
local refreshed = 0
for _, hash in ipairs(redis.call('SMEMBERS', set)) do
    local key = job_key(ns, hash)
    local vals = redis.call('HMGET', key, 'status', 'instance_id')
    if vals[1] == 'processing' and vals[2] == instance then
        redis.call('HSET', key, 'heartbeat_at', now)
        redis.call('ZADD', ns .. ':processing', now, hash)
        refreshed = refreshed + 1
    else
        -- ownership was lost (reclaim or completion elsewhere)
        redis.call('SREM', set, hash)
    end
end
return refreshed
"#;

// ARGV: ns, hash, instance_id, now_ms
const COMPLETE_SCRIPT: &str = r#"
local ns = ARGV[1]
local hash = ARGV[2]
local instance = ARGV[3]
local key = job_key(ns, hash)
local vals = redis.call('HMGET', key, 'status', 'instance_id')
if vals[1] == 'processing' and vals[2] == instance then
    redis.call('HSET', key, 'status', 'completed', 'completed_at', tonumber(ARGV[4]))
    redis.call('HDEL', key, 'instance_id', 'claimed_at', 'heartbeat_at')
    redis.call('ZREM', ns .. ':processing', hash)
    redis.call('SREM', ns .. ':instance:' .. instance, hash)
    redis.call('HINCRBY', ns .. ':stats', 'processing', -1)
    redis.call('HINCRBY', ns .. ':stats', 'completed', 1)
    return 1
end
return 0
"#;

// ARGV: ns, hash, instance_id, now_ms, error_entry_json, error_message
const FAIL_SCRIPT: &str = r#"
local ns = ARGV[1]
local hash = ARGV[2]
local instance = ARGV[3]
local now = tonumber(ARGV[4])
local key = job_key(ns, hash)
local vals = redis.call('HMGET', key, 'status', 'instance_id', 'attempts',
                        'max_attempts', 'priority', 'error_history', 'queued_at')
if vals[1] ~= 'processing' or vals[2] ~= instance then
    return false
end

local history = cjson.decode(vals[6] or '[]')
table.insert(history, cjson.decode(ARGV[5]))
redis.call('HSET', key, 'error_history', cjson.encode(history), 'last_error', ARGV[6])
redis.call('HDEL', key, 'instance_id', 'claimed_at', 'heartbeat_at')
redis.call('ZREM', ns .. ':processing', hash)
redis.call('SREM', ns .. ':instance:' .. instance, hash)
redis.call('HINCRBY', ns .. ':stats', 'processing', -1)

local attempts = tonumber(vals[3]) or 0
local max = tonumber(vals[4]) or 0
if attempts < max then
    redis.call('HSET', key, 'status', 'queued')
    redis.call('HDEL', key, 'started_at')
    local qat = tonumber(vals[7]) or now
    redis.call('ZADD', ns .. ':queued', queued_score(qat, tonumber(vals[5]) or 0), hash)
    redis.call('HINCRBY', ns .. ':stats', 'queued', 1)
    return 'queued'
end
redis.call('HSET', key, 'status', 'failed', 'failed_at', now)
redis.call('HINCRBY', ns .. ':stats', 'failed', 1)
return 'failed'
"#;

// ARGV: ns, now_ms, stale_cutoff_ms, claim_cutoff_ms, exhausted_message
const RECLAIM_SCRIPT: &str = r#"
local ns = ARGV[1]
local now = tonumber(ARGV[2])
local stale_cutoff = tonumber(ARGV[3])
local claim_cutoff = tonumber(ARGV[4])
local reclaimed = {}

for _, hash in ipairs(redis.call('ZRANGE', ns .. ':processing', 0, -1)) do
    local key = job_key(ns, hash)
    local vals = redis.call('HMGET', key, 'status', 'heartbeat_at', 'claimed_at',
                            'attempts', 'max_attempts', 'priority', 'instance_id',
                            'error_history', 'queued_at')
    if vals[1] ~= 'processing' then
        redis.call('ZREM', ns .. ':processing', hash)
    else
        local hb = tonumber(vals[2])
        local claimed = tonumber(vals[3])
        local stale = (not hb) or hb < stale_cutoff or (not claimed) or claimed < claim_cutoff
        if stale then
            redis.call('ZREM', ns .. ':processing', hash)
            if vals[7] then
                redis.call('SREM', ns .. ':instance:' .. vals[7], hash)
            end
            redis.call('HDEL', key, 'instance_id', 'claimed_at', 'heartbeat_at', 'started_at')
            redis.call('HINCRBY', ns .. ':stats', 'processing', -1)

            local attempts = tonumber(vals[4]) or 0
            local max = tonumber(vals[5]) or 0
            if attempts < max then
                redis.call('HSET', key, 'status', 'queued')
                local qat = tonumber(vals[9]) or now
                redis.call('ZADD', ns .. ':queued', queued_score(qat, tonumber(vals[6]) or 0), hash)
                redis.call('HINCRBY', ns .. ':stats', 'queued', 1)
            else
                local history = cjson.decode(vals[8] or '[]')
                table.insert(history, { attempt = attempts, error = ARGV[5], timestamp = now })
                redis.call('HSET', key, 'status', 'failed', 'failed_at', now,
                           'last_error', ARGV[5], 'error_history', cjson.encode(history))
                redis.call('HINCRBY', ns .. ':stats', 'failed', 1)
            end
            table.insert(reclaimed, hash)
        end
    end
end
return reclaimed
"#;

// ARGV: ns, instance_id
const RELEASE_SCRIPT: &str = r#"
local ns = ARGV[1]
local instance = ARGV[2]
local set = ns .. ':instance:' .. instance
local released = 0

for _, hash in ipairs(redis.call('SMEMBERS', set)) do
    local key = job_key(ns, hash)
    local vals = redis.call('HMGET', key, 'status', 'instance_id', 'priority', 'queued_at')
    if vals[1] == 'processing' and vals[2] == instance then
        redis.call('HSET', key, 'status', 'queued')
        redis.call('HDEL', key, 'instance_id', 'claimed_at', 'heartbeat_at', 'started_at')
        redis.call('ZREM', ns .. ':processing', hash)
        local qat = tonumber(vals[4]) or 0
        redis.call('ZADD', ns .. ':queued', queued_score(qat, tonumber(vals[3]) or 0), hash)
        redis.call('HINCRBY', ns .. ':stats', 'processing', -1)
        redis.call('HINCRBY', ns .. ':stats', 'queued', 1)
        released = released + 1
    end
end
redis.call('DEL', set)
return released
"#;

/// Redis implementation of [`JobStore`].
pub struct RedisJobStore {
    client: redis::Client,
    ns: String,
    submit: Script,
    claim: Script,
    heartbeat: Script,
    heartbeat_all: Script,
    complete: Script,
    fail: Script,
    reclaim: Script,
    release: Script,
}

impl RedisJobStore {
    /// Create a new store from configuration.
    pub fn new(config: &QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let with_prelude = |body: &str| Script::new(&format!("{LUA_PRELUDE}{body}"));
        Ok(Self {
            client,
            ns: config.namespace.clone(),
            submit: with_prelude(SUBMIT_SCRIPT),
            claim: with_prelude(CLAIM_SCRIPT),
            heartbeat: with_prelude(HEARTBEAT_SCRIPT),
            heartbeat_all: with_prelude(HEARTBEAT_ALL_SCRIPT),
            complete: with_prelude(COMPLETE_SCRIPT),
            fail: with_prelude(FAIL_SCRIPT),
            reclaim: with_prelude(RECLAIM_SCRIPT),
            release: with_prelude(RELEASE_SCRIPT),
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(&QueueConfig::from_env())
    }

    async fn conn(&self) -> QueueResult<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }

    fn job_key(&self, lookup_hash: &str) -> String {
        format!("{}:job:{}", self.ns, lookup_hash)
    }

    /// Clamped claim-order score, mirrored by `queued_score` in Lua.
    pub(crate) fn queued_score(queued_at_ms: i64, priority: i64) -> i64 {
        queued_at_ms - priority.clamp(-PRIORITY_CLAMP, PRIORITY_CLAMP) * PRIORITY_STRIDE
    }
}

fn ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

fn opt_ms(map: &HashMap<String, String>, field: &str) -> Option<DateTime<Utc>> {
    map.get(field)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

fn required<'a>(map: &'a HashMap<String, String>, field: &str) -> QueueResult<&'a String> {
    map.get(field)
        .ok_or_else(|| QueueError::store(format!("record missing field '{field}'")))
}

/// Flatten a record into hash field/value pairs. Optional fields are
/// simply absent from the hash.
fn record_to_fields(record: &JobRecord) -> QueueResult<Vec<(String, String)>> {
    let mut fields = vec![
        ("lookup_hash".into(), record.lookup_hash.clone()),
        ("status".into(), record.status.as_str().into()),
        ("priority".into(), record.priority.to_string()),
        ("attempts".into(), record.attempts.to_string()),
        ("max_attempts".into(), record.max_attempts.to_string()),
        ("payload".into(), serde_json::to_string(&record.payload)?),
        ("queued_at".into(), ms(record.queued_at).to_string()),
        (
            "error_history".into(),
            serde_json::to_string(&record.error_history)?,
        ),
    ];
    if let Some(id) = &record.instance_id {
        fields.push(("instance_id".into(), id.clone()));
    }
    if let Some(err) = &record.last_error {
        fields.push(("last_error".into(), err.clone()));
    }
    for (name, value) in [
        ("claimed_at", record.claimed_at),
        ("heartbeat_at", record.heartbeat_at),
        ("started_at", record.started_at),
        ("completed_at", record.completed_at),
        ("failed_at", record.failed_at),
    ] {
        if let Some(dt) = value {
            fields.push((name.into(), ms(dt).to_string()));
        }
    }
    Ok(fields)
}

/// Rebuild a record from its hash representation.
fn record_from_map(map: HashMap<String, String>) -> QueueResult<JobRecord> {
    let status_str = required(&map, "status")?;
    let status = JobStatus::parse(status_str)
        .ok_or_else(|| QueueError::store(format!("unknown status '{status_str}'")))?;
    let payload = serde_json::from_str(required(&map, "payload")?)?;
    let error_history: Vec<ErrorEntry> = match map.get("error_history") {
        Some(raw) => serde_json::from_str(raw)?,
        None => Vec::new(),
    };
    let queued_at = opt_ms(&map, "queued_at")
        .ok_or_else(|| QueueError::store("record missing field 'queued_at'"))?;

    Ok(JobRecord {
        lookup_hash: required(&map, "lookup_hash")?.clone(),
        status,
        priority: map
            .get("priority")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        attempts: map
            .get("attempts")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        max_attempts: required(&map, "max_attempts")?
            .parse()
            .map_err(|_| QueueError::store("invalid max_attempts"))?,
        payload,
        instance_id: map.get("instance_id").cloned(),
        claimed_at: opt_ms(&map, "claimed_at"),
        heartbeat_at: opt_ms(&map, "heartbeat_at"),
        queued_at,
        started_at: opt_ms(&map, "started_at"),
        completed_at: opt_ms(&map, "completed_at"),
        failed_at: opt_ms(&map, "failed_at"),
        last_error: map.get("last_error").cloned(),
        error_history,
    })
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get(&self, lookup_hash: &str) -> QueueResult<Option<JobRecord>> {
        let mut conn = self.conn().await?;
        let map: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.job_key(lookup_hash))
            .query_async(&mut conn)
            .await?;
        if map.is_empty() {
            return Ok(None);
        }
        record_from_map(map).map(Some)
    }

    async fn submit(&self, record: JobRecord) -> QueueResult<JobStatus> {
        let mut conn = self.conn().await?;
        let mut invocation = self.submit.prepare_invoke();
        invocation
            .arg(&self.ns)
            .arg(&record.lookup_hash)
            .arg(ms(record.queued_at));
        for (field, value) in record_to_fields(&record)? {
            invocation.arg(field).arg(value);
        }
        let status: String = invocation.invoke_async(&mut conn).await?;
        JobStatus::parse(&status)
            .ok_or_else(|| QueueError::store(format!("unknown status '{status}' from submit")))
    }

    async fn claim_next(
        &self,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<JobRecord>> {
        let mut conn = self.conn().await?;
        let claimed: Option<String> = self
            .claim
            .prepare_invoke()
            .arg(&self.ns)
            .arg(instance_id)
            .arg(ms(now))
            .invoke_async(&mut conn)
            .await?;
        match claimed {
            Some(hash) => self.get(&hash).await,
            None => Ok(None),
        }
    }

    async fn heartbeat(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<bool> {
        let mut conn = self.conn().await?;
        let refreshed: i64 = self
            .heartbeat
            .prepare_invoke()
            .arg(&self.ns)
            .arg(lookup_hash)
            .arg(instance_id)
            .arg(ms(now))
            .invoke_async(&mut conn)
            .await?;
        Ok(refreshed == 1)
    }

    async fn heartbeat_all(&self, instance_id: &str, now: DateTime<Utc>) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let refreshed: u64 = self
            .heartbeat_all
            .prepare_invoke()
            .arg(&self.ns)
            .arg(instance_id)
            .arg(ms(now))
            .invoke_async(&mut conn)
            .await?;
        Ok(refreshed)
    }

    async fn complete(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<bool> {
        let mut conn = self.conn().await?;
        let done: i64 = self
            .complete
            .prepare_invoke()
            .arg(&self.ns)
            .arg(lookup_hash)
            .arg(instance_id)
            .arg(ms(now))
            .invoke_async(&mut conn)
            .await?;
        Ok(done == 1)
    }

    async fn fail_or_requeue(
        &self,
        lookup_hash: &str,
        instance_id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> QueueResult<Option<JobStatus>> {
        let record = self
            .get(lookup_hash)
            .await?
            .ok_or_else(|| QueueError::JobNotFound(lookup_hash.to_string()))?;
        let entry = ErrorEntry {
            attempt: record.attempts,
            error: error.to_string(),
            timestamp: now,
        };

        let mut conn = self.conn().await?;
        let status: Option<String> = self
            .fail
            .prepare_invoke()
            .arg(&self.ns)
            .arg(lookup_hash)
            .arg(instance_id)
            .arg(ms(now))
            .arg(serde_json::to_string(&entry)?)
            .arg(error)
            .invoke_async(&mut conn)
            .await?;
        match status {
            Some(s) => JobStatus::parse(&s)
                .map(Some)
                .ok_or_else(|| QueueError::store(format!("unknown status '{s}' from fail"))),
            None => Ok(None),
        }
    }

    async fn reclaim_stale(
        &self,
        stale_after: Duration,
        job_timeout: Duration,
        now: DateTime<Utc>,
    ) -> QueueResult<Vec<String>> {
        let mut conn = self.conn().await?;
        let now_ms = ms(now);
        let reclaimed: Vec<String> = self
            .reclaim
            .prepare_invoke()
            .arg(&self.ns)
            .arg(now_ms)
            .arg(now_ms - stale_after.as_millis() as i64)
            .arg(now_ms - job_timeout.as_millis() as i64)
            .arg("instance heartbeat lost and attempts exhausted")
            .invoke_async(&mut conn)
            .await?;
        Ok(reclaimed)
    }

    async fn release_instance(&self, instance_id: &str) -> QueueResult<u64> {
        let mut conn = self.conn().await?;
        let released: u64 = self
            .release
            .prepare_invoke()
            .arg(&self.ns)
            .arg(instance_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(released)
    }

    async fn queued_position(&self, lookup_hash: &str) -> QueueResult<Option<u64>> {
        let mut conn = self.conn().await?;
        let rank: Option<u64> = redis::cmd("ZRANK")
            .arg(format!("{}:queued", self.ns))
            .arg(lookup_hash)
            .query_async(&mut conn)
            .await?;
        Ok(rank)
    }

    async fn counts_by_status(&self) -> QueueResult<HashMap<JobStatus, u64>> {
        let mut conn = self.conn().await?;
        let raw: HashMap<String, i64> = redis::cmd("HGETALL")
            .arg(format!("{}:stats", self.ns))
            .query_async(&mut conn)
            .await?;
        let mut counts = HashMap::new();
        for (name, count) in raw {
            if let Some(status) = JobStatus::parse(&name) {
                counts.insert(status, count.max(0) as u64);
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipq_models::JobPayload;

    #[test]
    fn queued_score_orders_priority_before_age() {
        let now = 1_700_000_000_000;
        let older = RedisJobStore::queued_score(now - 60_000, 0);
        let newer = RedisJobStore::queued_score(now, 0);
        let urgent = RedisJobStore::queued_score(now, 5);
        assert!(older < newer, "FIFO within a priority band");
        assert!(urgent < older, "higher priority beats age");
    }

    #[test]
    fn queued_score_clamps_extreme_priorities() {
        let now = 1_700_000_000_000;
        assert_eq!(
            RedisJobStore::queued_score(now, i64::MAX),
            RedisJobStore::queued_score(now, PRIORITY_CLAMP),
        );
        assert_eq!(
            RedisJobStore::queued_score(now, i64::MIN),
            RedisJobStore::queued_score(now, -PRIORITY_CLAMP),
        );
    }

    #[test]
    fn record_round_trips_through_hash_fields() {
        let mut record = JobRecord::new(
            "hash-9",
            JobPayload::opaque(serde_json::json!({"clip": "params"})),
        )
        .with_priority(7);
        record.status = JobStatus::Processing;
        record.instance_id = Some("worker-1".into());
        record.attempts = 2;
        record.claimed_at = Some(Utc::now());
        record.heartbeat_at = record.claimed_at;
        record.started_at = record.claimed_at;
        record.last_error = Some("ffmpeg exited 1".into());
        record.error_history.push(ErrorEntry {
            attempt: 1,
            error: "ffmpeg exited 1".into(),
            timestamp: Utc::now(),
        });

        let fields: HashMap<String, String> =
            record_to_fields(&record).unwrap().into_iter().collect();
        let decoded = record_from_map(fields).unwrap();

        assert_eq!(decoded.lookup_hash, record.lookup_hash);
        assert_eq!(decoded.status, record.status);
        assert_eq!(decoded.priority, record.priority);
        assert_eq!(decoded.attempts, record.attempts);
        assert_eq!(decoded.instance_id, record.instance_id);
        assert_eq!(decoded.payload, record.payload);
        assert_eq!(decoded.last_error, record.last_error);
        assert_eq!(decoded.error_history.len(), 1);
        // millisecond precision survives the wire format
        assert_eq!(
            decoded.claimed_at.map(|d| d.timestamp_millis()),
            record.claimed_at.map(|d| d.timestamp_millis()),
        );
    }

    #[test]
    fn record_from_map_rejects_missing_fields() {
        let map: HashMap<String, String> =
            [("status".to_string(), "queued".to_string())].into_iter().collect();
        assert!(record_from_map(map).is_err());
    }
}
