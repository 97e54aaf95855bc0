//! # トークンバケット
//!
//! 1 トークン = 1 バイト。バケットは満タンで始まり、`rate_bytes_per_sec` の速度で
//! `burst_bytes` まで補充される。
//!
//! 予約はトークンを先に差し引き、不足分は「借り」として残す。
//! 借りを返すのに必要な時間が [`Reservation::Delayed`] の待ち時間になる。

use std::time::Duration;

use tokio::time::Instant;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// 帯域制限の設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficLimit {
    pub rate_bytes_per_sec: u64,
    pub burst_bytes:        u64,
}

impl TrafficLimit {
    pub const fn new(rate_bytes_per_sec: u64, burst_bytes: u64) -> Self {
        Self {
            rate_bytes_per_sec,
            burst_bytes,
        }
    }
}

/// 予約結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// すぐに読んでよい
    Ready,
    /// 指定時間待ってから読む
    Delayed(Duration),
    /// 待っても満たせない（要求がバーストを超える、または補充されない）
    Denied,
}

#[derive(Debug)]
pub struct TokenBucket {
    limit:  TrafficLimit,
    tokens: f64,
    last:   Instant,
}

impl TokenBucket {
    pub fn new(limit: TrafficLimit, now: Instant) -> Self {
        Self {
            limit,
            tokens: limit.burst_bytes as f64,
            last: now,
        }
    }

    pub fn limit(&self) -> TrafficLimit {
        self.limit
    }

    /// `n` バイト分のトークンを予約する
    ///
    /// `Denied` の場合はトークンを消費しない。
    pub fn reserve(&mut self, n: u64, now: Instant) -> Reservation {
        if n == 0 {
            return Reservation::Ready;
        }
        if n > self.limit.burst_bytes {
            return Reservation::Denied;
        }

        self.refill(now);

        let requested = n as f64;
        if self.limit.rate_bytes_per_sec == 0 && self.tokens < requested {
            return Reservation::Denied;
        }

        self.tokens -= requested;
        if self.tokens >= 0.0 {
            return Reservation::Ready;
        }

        let rate = self.limit.rate_bytes_per_sec as f64;
        let nanos = (-self.tokens * 1_000_000_000.0 / rate).ceil();
        Reservation::Delayed(Duration::from_nanos(nanos as u64))
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last);
        if now > self.last {
            self.last = now;
        }

        let burst = self.limit.burst_bytes as f64;
        let gained = elapsed.as_secs_f64() * self.limit.rate_bytes_per_sec as f64;
        self.tokens = (self.tokens + gained).min(burst);
    }
}
