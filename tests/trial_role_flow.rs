mod common;

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

use common::{member, FakeDiscord, GUILD};
use fxsignal::core::config::BotConfig;
use fxsignal::core::error::BotError;
use fxsignal::roles::{GrantStore, WeekendPolicy};

const TRIAL_ROLE: u64 = 88;

async fn enabled_context(api: Arc<FakeDiscord>, dir: &tempfile::TempDir) -> fxsignal::BotContext {
    let (ctx, _sim) = common::context(api, BotConfig::default(), dir).await;
    ctx.roles
        .store()
        .update_settings(|s| {
            s.enabled = true;
            s.role_id = Some(TRIAL_ROLE);
            s.guild_id = Some(GUILD);
        })
        .await
        .unwrap();
    ctx
}

#[tokio::test]
async fn weekday_join_is_revoked_exactly_at_expiry() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let ctx = enabled_context(Arc::clone(&api), &dir).await;

    // 周三
    let joined = Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap();
    let grant = ctx
        .roles
        .on_member_join(GUILD, &member(700, "newbie", vec![], false), joined)
        .await
        .unwrap()
        .expect("grant recorded");
    assert!(!grant.weekend_delayed);
    assert_eq!(grant.expires_at, joined + Duration::hours(24));
    assert_eq!(*api.added_roles.lock().unwrap(), vec![(700, TRIAL_ROLE)]);
    assert!(api.dms_to(700)[0].contains("active now"));

    let early = ctx
        .roles
        .sweep_expired(joined + Duration::hours(24) - Duration::seconds(1))
        .await
        .unwrap();
    assert!(early.revoked.is_empty());
    assert!(api.removed_roles.lock().unwrap().is_empty());

    let due = ctx
        .roles
        .sweep_expired(joined + Duration::hours(24))
        .await
        .unwrap();
    assert_eq!(due.revoked, vec![700]);
    assert_eq!(*api.removed_roles.lock().unwrap(), vec![(700, TRIAL_ROLE)]);
    assert_eq!(ctx.roles.store().len().await, 0);
}

#[tokio::test]
async fn weekend_join_waits_for_monday_and_notifies_once() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let ctx = enabled_context(Arc::clone(&api), &dir).await;

    // 周六
    let joined = Utc.with_ymd_and_hms(2024, 1, 6, 15, 0, 0).unwrap();
    let monday = Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap();
    let grant = ctx
        .roles
        .on_member_join(GUILD, &member(701, "weekender", vec![], false), joined)
        .await
        .unwrap()
        .unwrap();
    assert!(grant.weekend_delayed);
    assert_eq!(grant.activates_at, monday);
    assert_eq!(grant.expires_at, monday + Duration::hours(24));

    assert!(ctx
        .roles
        .sweep_activations(monday - Duration::minutes(1))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(ctx.roles.sweep_activations(monday).await.unwrap(), vec![701]);
    assert!(ctx
        .roles
        .sweep_activations(monday + Duration::hours(1))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(api.dms_to(701).len(), 2);

    // 周一之后24小时内不回收
    let report = ctx
        .roles
        .sweep_expired(monday + Duration::hours(23))
        .await
        .unwrap();
    assert!(report.revoked.is_empty());
}

#[tokio::test]
async fn bots_and_disabled_feature_are_ignored() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let (ctx, _sim) = common::context(Arc::clone(&api), BotConfig::default(), &dir).await;
    let now = Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap();

    let grant = ctx
        .roles
        .on_member_join(GUILD, &member(702, "someone", vec![], false), now)
        .await
        .unwrap();
    assert!(grant.is_none());

    let enabled_dir = tempfile::tempdir().unwrap();
    let ctx = enabled_context(Arc::clone(&api), &enabled_dir).await;
    let grant = ctx
        .roles
        .on_member_join(GUILD, &member(703, "robot", vec![], true), now)
        .await
        .unwrap();
    assert!(grant.is_none());
    assert!(api.added_roles.lock().unwrap().is_empty());
}

#[tokio::test]
async fn retryable_revocation_errors_are_deferred() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let ctx = enabled_context(Arc::clone(&api), &dir).await;
    let joined = Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap();
    ctx.roles
        .on_member_join(GUILD, &member(704, "flaky", vec![], false), joined)
        .await
        .unwrap();

    let rate_limited: fn() -> BotError = || BotError::RateLimitError("slow down".into(), Some(1));
    *api.remove_error.lock().unwrap() = Some(rate_limited);
    let report = ctx
        .roles
        .sweep_expired(joined + Duration::hours(30))
        .await
        .unwrap();
    assert_eq!(report.deferred, vec![704]);
    assert_eq!(ctx.roles.store().len().await, 1);

    let gone: fn() -> BotError = || BotError::NotFound("member".into());
    *api.remove_error.lock().unwrap() = Some(gone);
    let report = ctx
        .roles
        .sweep_expired(joined + Duration::hours(31))
        .await
        .unwrap();
    assert_eq!(report.revoked, vec![704]);
    assert_eq!(ctx.roles.store().len().await, 0);
}

#[tokio::test]
async fn permission_errors_keep_the_grant_for_the_next_sweep() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let ctx = enabled_context(Arc::clone(&api), &dir).await;
    let joined = Utc.with_ymd_and_hms(2024, 1, 3, 9, 30, 0).unwrap();
    ctx.roles
        .on_member_join(GUILD, &member(706, "stuck", vec![], false), joined)
        .await
        .unwrap();

    let forbidden: fn() -> BotError = || BotError::PermissionError("role above bot".into());
    *api.remove_error.lock().unwrap() = Some(forbidden);
    let report = ctx
        .roles
        .sweep_expired(joined + Duration::hours(25))
        .await
        .unwrap();
    assert!(report.revoked.is_empty());
    assert_eq!(report.failed, vec![706]);
    assert_eq!(ctx.roles.store().len().await, 1);

    *api.remove_error.lock().unwrap() = None;
    let report = ctx
        .roles
        .sweep_expired(joined + Duration::hours(26))
        .await
        .unwrap();
    assert_eq!(report.revoked, vec![706]);
    assert_eq!(*api.removed_roles.lock().unwrap(), vec![(706, TRIAL_ROLE)]);
    assert_eq!(ctx.roles.store().len().await, 0);
}

#[tokio::test]
async fn grants_survive_a_restart() {
    let api = Arc::new(FakeDiscord::new());
    let dir = tempfile::tempdir().unwrap();
    let ctx = enabled_context(Arc::clone(&api), &dir).await;
    let joined = Utc.with_ymd_and_hms(2024, 1, 5, 13, 0, 0).unwrap();
    ctx.roles
        .on_member_join(GUILD, &member(705, "friday", vec![], false), joined)
        .await
        .unwrap();

    let path = ctx.roles.store().path().to_path_buf();
    let reopened = GrantStore::open(path, &WeekendPolicy::new(0, 24)).await.unwrap();
    let grant = reopened.get(705).await.unwrap();
    assert!(grant.weekend_delayed);
    assert!(reopened.settings().await.enabled);
}
