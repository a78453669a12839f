//! 可观测性模块集成测试
//!
//! 测试指标记录函数与初始化流程的核心行为。

mod metrics_tests {
    use achievement_shared::observability::metrics::{
        record_cache_invalidation, record_grant, record_processor_failure, record_reevaluation,
        record_revocations,
    };

    #[test]
    fn test_record_grant() {
        record_grant("first_blood", "event");
        record_grant("first_blood", "reevaluation");
        record_grant("speed_run", "event");
    }

    #[test]
    fn test_record_revocations() {
        record_revocations("reevaluation", 3);
        record_revocations("event", 1);
        record_revocations("bulk", 0);
    }

    #[test]
    fn test_record_processor_failure() {
        record_processor_failure("first_blood", "error");
        record_processor_failure("first_blood", "timeout");
    }

    #[test]
    fn test_record_cache_and_reevaluation() {
        record_cache_invalidation("achievement_updated");
        record_cache_invalidation("reevaluation_finished");
        record_reevaluation("one", 0, 0.01);
        record_reevaluation("all", 5, 1.25);
    }
}

mod init_tests {
    use achievement_shared::observability::{ObservabilityConfig, init};

    #[test]
    fn test_init_installs_metrics_recorder() {
        let config = ObservabilityConfig {
            service_name: "observability-test".to_string(),
            ..Default::default()
        };

        // 全局订阅器可能已被其他测试安装，这里只关心指标句柄
        if let Ok(guard) = init(&config) {
            achievement_shared::observability::metrics::record_grant("first_blood", "event");
            let rendered = guard.render_metrics().unwrap_or_default();
            assert!(rendered.contains("achievement_grants_total"));
        }
    }

    #[test]
    fn test_from_env_defaults() {
        let config = ObservabilityConfig::from_env("achievement-service");
        assert_eq!(config.service_name, "achievement-service");
    }
}
