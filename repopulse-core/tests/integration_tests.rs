//! Integration tests for repopulse-core infrastructure

use repopulse_core::{
    config_error, init_logging, invalid_reference_error, log_operation_start,
    log_operation_success, performance, retry_with_backoff, with_timeout, AnalysisSnapshot,
    ErrorContext, ErrorKind, LogFormat, LoggingConfig, PulseConfig, PulseError,
    RateLimitBudget, RepositoryReference, RetryConfig,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_error_handling() {
    let error = invalid_reference_error!("gitlab.com/a/b", "unsupported host", "test_component");

    match &error {
        PulseError::InvalidReference { input, context, .. } => {
            assert_eq!(input, "gitlab.com/a/b");
            assert_eq!(context.component, "test_component");
            assert!(!context.error_id.is_empty());
        }
        other => panic!("Expected InvalidReference error, got {other:?}"),
    }

    error.log();

    let network_error = PulseError::TransientNetwork {
        message: "Connection failed".to_string(),
        source: None,
        context: ErrorContext::new("test"),
    };
    assert!(network_error.is_recoverable());

    let config_error = config_error!("Invalid config", "test");
    assert!(!config_error.is_recoverable());
    assert_eq!(config_error.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_logging_initialization() {
    let config = LoggingConfig {
        level: "debug".to_string(),
        format: LogFormat::Compact,
        include_location: false,
        include_thread: false,
        include_timestamp: true,
        log_to_file: false,
        log_file_path: None,
        enable_performance_monitoring: false,
        filter_directives: vec!["repopulse_core=debug".to_string()],
    };

    // Only one global subscriber per process; a second init must fail cleanly
    let _ = init_logging(&config);
    assert!(init_logging(&config).is_err());

    log_operation_start!("integration_test", step = 1);
    log_operation_success!("integration_test");
}

#[tokio::test]
async fn test_retry_shares_budget_across_tasks() {
    let budget = Arc::new(RateLimitBudget::new(2));
    let calls = Arc::new(AtomicUsize::new(0));
    let config = RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 5,
        max_delay_ms: 20,
        backoff_multiplier: 2.0,
        jitter: false,
    };

    let mut handles = Vec::new();
    for _ in 0..3 {
        let budget = Arc::clone(&budget);
        let calls = Arc::clone(&calls);
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            retry_with_backoff(&config, Some(budget.as_ref()), "page", || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err(PulseError::RateLimited {
                            message: "primary rate limit".to_string(),
                            retry_after_ms: Some(10),
                            context: ErrorContext::new("test"),
                        })
                    } else {
                        Ok(call)
                    }
                }
            })
            .await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert_eq!(budget.rate_limit_hits().await, 1);
}

#[tokio::test]
async fn test_timeout_and_measurement() {
    let measured = performance::measure_async("quick", async { 42 }).await;
    assert_eq!(measured, 42);

    let result = with_timeout(tokio::time::sleep(Duration::from_millis(100)), 10, "slow").await;
    match result {
        Err(PulseError::Timeout {
            operation,
            duration_ms,
            ..
        }) => {
            assert_eq!(operation, "slow");
            assert_eq!(duration_ms, 10);
        }
        other => panic!("Expected timeout, got {other:?}"),
    }
}

#[test]
fn test_config_and_reference_together() {
    let config = PulseConfig::default();
    config.validate().unwrap();

    let reference = RepositoryReference::parse("https://github.com/tokio-rs/axum.git/").unwrap();
    let snapshot = AnalysisSnapshot::empty(reference.clone(), chrono::Utc::now());
    assert_eq!(snapshot.full_name, "tokio-rs/axum");
    assert_eq!(snapshot.html_url, reference.url);
    assert!(!snapshot.is_degraded());
}
