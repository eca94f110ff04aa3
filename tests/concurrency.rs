//! End-to-end concurrency limiting through the public API.

mod common;

use command_limits::{
    BucketResource, ConcurrencyLimiter, ConcurrencyPostExecution, ConcurrencyPreExecution,
};
use common::FakeContext;

#[tokio::test]
async fn slots_free_up_on_release() {
    let limiter = ConcurrencyLimiter::new();
    limiter.set_bucket("work", BucketResource::User, 2).unwrap();

    let a = FakeContext::new(1);
    let b = FakeContext::new(1);
    let c = FakeContext::new(1);

    assert!(limiter.try_acquire("work", &a).await);
    assert!(limiter.try_acquire("work", &b).await);
    assert!(!limiter.try_acquire("work", &c).await);

    limiter.release("work", &a);
    assert!(limiter.try_acquire("work", &c).await);
}

#[tokio::test]
async fn default_bucket_allows_one_call_per_user() {
    let limiter = ConcurrencyLimiter::new();

    let first = FakeContext::new(1);
    let same_user = FakeContext::new(1);
    let other_user = FakeContext::new(2);

    assert!(limiter.try_acquire("anything", &first).await);
    assert!(!limiter.try_acquire("anything", &same_user).await);
    assert!(limiter.try_acquire("anything", &other_user).await);
}

#[tokio::test]
async fn buckets_are_tracked_separately() {
    let limiter = ConcurrencyLimiter::new();
    limiter
        .set_bucket("alpha", BucketResource::User, 1)
        .unwrap()
        .set_bucket("beta", BucketResource::User, 1)
        .unwrap();

    let ctx = FakeContext::new(1);
    assert!(limiter.try_acquire("alpha", &ctx).await);
    assert!(limiter.try_acquire("beta", &ctx).await);

    limiter.release("alpha", &ctx);
    limiter.release("beta", &ctx);
}

#[tokio::test]
async fn channel_bucket_scopes_by_channel() {
    let limiter = ConcurrencyLimiter::new();
    limiter
        .set_bucket("work", BucketResource::Channel, 1)
        .unwrap();

    let in_a = FakeContext::new(1).in_channel(50);
    let also_a = FakeContext::new(2).in_channel(50);
    let in_b = FakeContext::new(3).in_channel(51);

    assert!(limiter.try_acquire("work", &in_a).await);
    assert!(!limiter.try_acquire("work", &also_a).await);
    assert!(limiter.try_acquire("work", &in_b).await);
}

#[tokio::test]
async fn disabling_default_stops_limiting_unknown_names() {
    let limiter = ConcurrencyLimiter::new();
    limiter.disable_bucket("default");

    // The built-in template would cap the same user at one call in flight.
    for _ in 0..5 {
        assert!(limiter.try_acquire("never_registered", &FakeContext::new(1)).await);
    }
}

#[tokio::test]
async fn disabled_bucket_never_blocks() {
    let limiter = ConcurrencyLimiter::new();
    limiter.disable_bucket("work");

    for user in 0..20 {
        assert!(limiter.try_acquire("work", &FakeContext::new(user)).await);
    }
}

#[tokio::test]
async fn parallel_acquires_respect_the_limit() {
    let limiter = std::sync::Arc::new(ConcurrencyLimiter::new());
    limiter.set_bucket("work", BucketResource::Global, 4).unwrap();

    let attempts = (0u64..16).map(|user| {
        let limiter = limiter.clone();
        async move { limiter.try_acquire("work", &FakeContext::new(user)).await }
    });
    let acquired = futures::future::join_all(attempts)
        .await
        .into_iter()
        .filter(|&ok| ok)
        .count();

    assert_eq!(acquired, 4);
}

#[tokio::test]
async fn hooks_gate_and_release_a_command() {
    let limiter = ConcurrencyLimiter::new();
    limiter.set_bucket("work", BucketResource::Guild, 1).unwrap();
    let pre = ConcurrencyPreExecution::new("work").with_error_message("busy, hold on");
    let post = ConcurrencyPostExecution::new("work");

    let running = FakeContext::new(1);
    let queued = FakeContext::new(2);

    pre.call(&running, &limiter).await.unwrap();
    assert_eq!(
        pre.call(&queued, &limiter).await.unwrap_err().message,
        "busy, hold on"
    );

    post.call(&running, &limiter);
    pre.call(&queued, &limiter).await.unwrap();

    // Releasing a context that holds nothing stays a no-op.
    post.call(&running, &limiter);
}
