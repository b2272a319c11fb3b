//! External-process backend against real `/bin/sh` children.

#![cfg(unix)]

use uuid::Uuid;
use watchpost_core::config::ExternalPluginConfig;
use watchpost_core::{
    Configuration, FailureKind, Plugin, PluginContext, PluginOutcome, SessionEvent,
    SessionReporter, Weight,
};
use watchpost_plugins::ExternalProcessPlugin;

fn shell_plugin(script: &str, timeout_secs: u64) -> ExternalProcessPlugin {
    let config = ExternalPluginConfig {
        id: "sh-test".to_owned(),
        name: "Shell Test".to_owned(),
        version: "0.1".to_owned(),
        weight: Weight::Heavy,
        program: "/bin/sh".to_owned(),
        args: vec!["-c".to_owned(), script.to_owned(), "sh-test".to_owned()],
        timeout_secs,
    };
    ExternalProcessPlugin::from_config(&config).expect("/bin/sh should exist")
}

fn context() -> (
    PluginContext,
    tokio::sync::mpsc::UnboundedReceiver<SessionEvent>,
) {
    let (reporter, rx) = SessionReporter::channel();
    let mut configuration = Configuration::new();
    configuration.insert("ports".to_owned(), serde_json::json!("80,443"));
    let ctx = PluginContext {
        scan_id: Uuid::new_v4(),
        session_id: Uuid::new_v4(),
        target: "http://example.test".to_owned(),
        configuration,
        reporter,
    };
    (ctx, rx)
}

#[tokio::test]
async fn finished_process_reports_issues_and_progress() {
    let plugin = shell_plugin(
        r#"
        echo '{"msg":"progress","data":0.5}'
        echo '{"msg":"issue","data":{"code":"SH-0","summary":"hello","severity":"Medium"}}'
        echo '{"msg":"artifact","data":{"name":"log","content":"done"}}'
        echo '{"msg":"finish","data":{"state":"FINISHED"}}'
        "#,
        10,
    );
    let (ctx, mut rx) = context();

    let outcome = plugin.execute(ctx).await;
    match outcome {
        PluginOutcome::Completed(issues) => {
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].code, "SH-0");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    assert_eq!(rx.recv().await, Some(SessionEvent::Progress(0.5)));
    assert_eq!(
        rx.recv().await,
        Some(SessionEvent::Artifact {
            name: "log".to_owned(),
            content: "done".to_owned()
        })
    );
}

#[tokio::test]
async fn arguments_carry_target_and_configuration() {
    // $1 --configuration, $2 json, $3 --target, $4 target, $5 --session, $6 id
    let plugin = shell_plugin(
        r#"
        case "$2" in *80,443*) cfg=ok ;; *) cfg=missing ;; esac
        echo "{\"msg\":\"issue\",\"data\":{\"code\":\"$cfg\",\"summary\":\"$4\",\"severity\":\"Info\"}}"
        echo '{"msg":"finish","data":{"state":"FINISHED"}}'
        "#,
        10,
    );
    let (ctx, _rx) = context();

    let outcome = plugin.execute(ctx).await;
    let issues = outcome.issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].code, "ok");
    assert_eq!(issues[0].summary, "http://example.test");
}

#[tokio::test]
async fn exit_without_finish_is_protocol_failure() {
    let plugin = shell_plugin(
        r#"echo '{"msg":"issue","data":{"code":"SH-1","summary":"partial","severity":"Low"}}'; exit 3"#,
        10,
    );
    let (ctx, _rx) = context();

    match plugin.execute(ctx).await {
        PluginOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Protocol);
            assert_eq!(failure.message, "the plugin did not finish correctly");
            assert_eq!(failure.issues.len(), 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn aborted_finish_aborts() {
    let plugin = shell_plugin(r#"echo '{"msg":"finish","data":{"state":"ABORTED"}}'"#, 10);
    let (ctx, _rx) = context();

    assert!(matches!(
        plugin.execute(ctx).await,
        PluginOutcome::Aborted(_)
    ));
}

#[tokio::test]
async fn slow_process_is_killed_on_timeout() {
    let plugin = shell_plugin(
        r#"
        echo '{"msg":"issue","data":{"code":"SH-2","summary":"before","severity":"Info"}}'
        sleep 30
        echo '{"msg":"finish","data":{"state":"FINISHED"}}'
        "#,
        1,
    );
    let (ctx, _rx) = context();

    let started = std::time::Instant::now();
    match plugin.execute(ctx).await {
        PluginOutcome::Failed(failure) => {
            assert_eq!(failure.kind, FailureKind::Timeout);
            assert_eq!(failure.issues.len(), 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}
