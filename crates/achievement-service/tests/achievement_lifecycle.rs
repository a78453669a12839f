//! 成就定义生命周期集成测试
//!
//! 基于内存存储装配完整模块，覆盖：
//! - 创建与查询
//! - 启用成就的名称冲突
//! - 下线后的查询行为
//! - 更新后派生视图的新鲜度
//! - 与更新并发的视图读取不会留下旧缓存

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use achievements::repository::{
    AchievementRepositoryTrait, MemoryAchievementRepository, MemoryEarnedAchievementRepository,
};
use achievements::{
    Achievement, AchievementError, AchievementModule, AchievementSelector, EvaluationConfig,
    EventContext, FnProcessor, Identity, MemoryAchievementModule, MemoryCacheRegion,
    ProcessorRegistry,
};
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn definition(name: &str, score: i64, processor: &str) -> Value {
    json!({
        "name": name,
        "score": score,
        "event": "submission",
        "processor": processor,
        "hidden": false,
        "image": format!("/img/{}.png", processor)
    })
}

fn module() -> MemoryAchievementModule {
    let mut registry = ProcessorRegistry::new();
    registry
        .register(Arc::new(FnProcessor::constant("always", true)))
        .register(Arc::new(FnProcessor::constant("never", false)));
    MemoryAchievementModule::in_memory(registry, EvaluationConfig::default())
}

#[tokio::test]
async fn test_create_then_get_returns_input_with_aid() -> anyhow::Result<()> {
    let module = module();
    let input = definition("First Blood", 100, "always");

    let created = module.achievements.create(input.clone()).await?;
    let fetched = module
        .achievements
        .get(&AchievementSelector::by_aid(created.aid), false)
        .await?;

    let mut expected = input.as_object().cloned().unwrap_or_default();
    expected.insert("aid".to_string(), json!(created.aid));
    expected.insert("disabled".to_string(), json!(false));
    assert_eq!(serde_json::to_value(&fetched)?, Value::Object(expected));
    Ok(())
}

#[tokio::test]
async fn test_duplicate_enabled_name_conflicts() {
    let module = module();
    assert_ok!(module.achievements.create(definition("First Blood", 100, "always")).await);

    let err = assert_err!(module.achievements.create(definition("First Blood", 5, "never")).await);
    assert_eq!(err.error_code(), "CONFLICT");

    // 改名撞上已有名称同样冲突
    let other = assert_ok!(module.achievements.create(definition("Second Blood", 50, "always")).await);
    let err = assert_err!(
        module
            .achievements
            .update(other.aid, json!({ "name": "First Blood" }))
            .await
    );
    assert!(matches!(err, AchievementError::Conflict { .. }));
}

#[tokio::test]
async fn test_disable_changes_only_disabled_flag() -> anyhow::Result<()> {
    let module = module();
    let created = module
        .achievements
        .create(definition("First Blood", 100, "always"))
        .await?;

    let disabled = module.achievements.update(created.aid, json!({ "disabled": true })).await?;

    let mut before = serde_json::to_value(&created)?;
    let mut after = serde_json::to_value(&disabled)?;
    assert_eq!(after["disabled"], true);
    for doc in [&mut before, &mut after] {
        if let Some(map) = doc.as_object_mut() {
            map.remove("disabled");
        }
    }
    assert_eq!(before, after);

    let err = module
        .achievements
        .get(&AchievementSelector::by_aid(created.aid), false)
        .await
        .unwrap_err();
    assert!(matches!(err, AchievementError::NotFound { .. }));

    assert!(module.achievements.list(None, false).await?.is_empty());
    assert_eq!(module.achievements.list(None, true).await?.len(), 1);
    assert!(module.achievements.list_distinct_events(false).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_validation_errors_are_field_scoped() {
    let module = module();
    let mut input = definition("First Blood", 100, "always");
    input["score"] = json!(-10);
    input["image"] = json!(true);

    match module.achievements.create(input).await {
        Err(AchievementError::Validation(violations)) => {
            let fields: Vec<_> = violations.iter().map(|v| v.field.as_str()).collect();
            assert_eq!(fields, vec!["image"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let mut input = definition("First Blood", 100, "always");
    input["score"] = json!(-10);
    match module.achievements.create(input).await {
        Err(AchievementError::Validation(violations)) => {
            assert_eq!(violations[0].field, "score");
            assert_eq!(violations[0].message, "分数必须是非负整数");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_views_reflect_updates_immediately() -> anyhow::Result<()> {
    let module = module();
    let team = Identity::team("red");
    let created = module
        .achievements
        .create(definition("First Blood", 100, "always"))
        .await?;
    module
        .evaluator
        .process_achievement(created.aid, &team, EventContext::new("submission", json!({})))
        .await?;

    assert_eq!(module.views.score_total(&team).await?, 100);
    assert_eq!(module.views.enabled_achievements(None).await?.len(), 1);

    module.achievements.update(created.aid, json!({ "score": 250 })).await?;
    assert_eq!(module.views.score_total(&team).await?, 250);
    assert_eq!(module.views.enabled_achievements(None).await?[0].score, 250);

    module.achievements.set_disabled(created.aid, true).await?;
    assert_eq!(module.views.score_total(&team).await?, 0);
    assert!(module.views.enabled_achievements(None).await?.is_empty());
    assert!(module.views.earned_achievements(&team).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_get_by_name_prefers_enabled_record() -> anyhow::Result<()> {
    let module = module();
    let retired = module
        .achievements
        .create(definition("First Blood", 100, "always"))
        .await?;
    module.achievements.set_disabled(retired.aid, true).await?;
    let current = module
        .achievements
        .create(definition("First Blood", 150, "always"))
        .await?;

    let by_name = module
        .achievements
        .get(&AchievementSelector::by_name("First Blood"), true)
        .await?;
    assert_eq!(by_name.aid, current.aid);
    Ok(())
}

/// 在下一次 `list` 读完存储后暂停，直到测试放行
#[derive(Default)]
struct PausingRepository {
    inner: MemoryAchievementRepository,
    armed: AtomicBool,
    paused: Notify,
    resume: Notify,
}

#[async_trait]
impl AchievementRepositoryTrait for PausingRepository {
    async fn find_by_aid(
        &self,
        aid: Uuid,
        include_disabled: bool,
    ) -> achievements::Result<Option<Achievement>> {
        AchievementRepositoryTrait::find_by_aid(&self.inner, aid, include_disabled).await
    }

    async fn find_by_name(
        &self,
        name: &str,
        include_disabled: bool,
    ) -> achievements::Result<Option<Achievement>> {
        AchievementRepositoryTrait::find_by_name(&self.inner, name, include_disabled).await
    }

    async fn list(
        &self,
        event: Option<String>,
        include_disabled: bool,
    ) -> achievements::Result<Vec<Achievement>> {
        let result = AchievementRepositoryTrait::list(&self.inner, event, include_disabled).await;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.resume.notified().await;
        }
        result
    }

    async fn distinct_events(
        &self,
        include_disabled: bool,
    ) -> achievements::Result<BTreeSet<String>> {
        AchievementRepositoryTrait::distinct_events(&self.inner, include_disabled).await
    }

    async fn insert(&self, achievement: &Achievement) -> achievements::Result<()> {
        AchievementRepositoryTrait::insert(&self.inner, achievement).await
    }

    async fn replace(&self, achievement: &Achievement) -> achievements::Result<bool> {
        AchievementRepositoryTrait::replace(&self.inner, achievement).await
    }
}

#[tokio::test]
async fn test_view_read_racing_update_does_not_cache_old_value() -> anyhow::Result<()> {
    let repo = Arc::new(PausingRepository::default());
    let mut registry = ProcessorRegistry::new();
    registry.register(Arc::new(FnProcessor::constant("always", true)));
    let module = AchievementModule::assemble(
        repo.clone(),
        Arc::new(MemoryEarnedAchievementRepository::new()),
        registry,
        Arc::new(MemoryCacheRegion::new()),
        EvaluationConfig::default(),
    );
    let created = module
        .achievements
        .create(definition("First Blood", 100, "always"))
        .await?;

    // 读取在更新之前拿到旧数据，在更新完成之后才写缓存
    repo.armed.store(true, Ordering::SeqCst);
    let views = module.views.clone();
    let reader = tokio::spawn(async move { views.enabled_achievements(None).await });
    repo.paused.notified().await;

    module.achievements.update(created.aid, json!({ "score": 250 })).await?;
    repo.resume.notify_one();
    let in_flight = reader.await??;
    assert_eq!(in_flight[0].score, 100);

    let fresh = module.views.enabled_achievements(None).await?;
    assert_eq!(fresh[0].score, 250);
    Ok(())
}
