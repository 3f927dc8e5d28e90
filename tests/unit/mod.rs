// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

//! Unit tests for pod-security-webhook.
//!
//! These tests drive the admission engine end to end with review bodies
//! built from fixtures. No cluster or TLS listener is involved.

#[path = "../common/mod.rs"]
mod common;

use kube::core::DynamicObject;
use kube::core::admission::{AdmissionResponse, AdmissionReview};
use pod_security_webhook::config::WebhookConfig;
use pod_security_webhook::webhooks::{AdmissionEngine, Outcome, Verdict};

use common::fixtures::{ContainerBuilder, PodSpecBuilder, WorkloadBuilder};

fn engine_with(vars: &[(&str, &str)]) -> AdmissionEngine {
    let config = WebhookConfig::from_vars(vars.iter().copied()).unwrap();
    AdmissionEngine::from_config(&config)
}

fn engine() -> AdmissionEngine {
    engine_with(&[])
}

fn response(outcome: &Outcome) -> &AdmissionResponse {
    outcome.review.response.as_ref().unwrap()
}

/// Round-trip the review through JSON the way the API server would read it.
fn wire(outcome: &Outcome) -> serde_json::Value {
    let bytes = serde_json::to_vec(&outcome.review).unwrap();
    let _: AdmissionReview<DynamicObject> = serde_json::from_slice(&bytes).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

mod scenario_tests {
    use super::*;
    use pod_security_webhook::resources::WorkloadKind;

    #[test]
    fn test_secure_deployment_allowed() {
        let body = WorkloadBuilder::new(WorkloadKind::Deployment, "web")
            .pod_spec(PodSpecBuilder::secure().build())
            .review();
        let outcome = engine().review(&body);

        assert_eq!(outcome.verdict, Verdict::Allowed);
        let json = wire(&outcome);
        assert_eq!(json["response"]["allowed"], true);
        assert_eq!(json["response"]["status"]["code"], 200);
        assert!(json["response"].get("patch").is_none());
    }

    #[test]
    fn test_every_workload_kind_is_checked() {
        for kind in WorkloadKind::ALL {
            let body = WorkloadBuilder::new(kind, "web")
                .pod_spec(PodSpecBuilder::secure().host_network(true).build())
                .review();
            let outcome = engine().review(&body);
            assert_eq!(
                outcome.verdict,
                Verdict::Denied {
                    rule: "host-network"
                },
                "{kind} should be denied"
            );
        }
    }

    #[test]
    fn test_privileged_container_named_in_message() {
        let spec = PodSpecBuilder::secure()
            .container(ContainerBuilder::new("sidecar").secure().privileged(true).build())
            .build();
        let body = WorkloadBuilder::new(WorkloadKind::StatefulSet, "Cache")
            .namespace("Data")
            .pod_spec(spec)
            .review();
        let outcome = engine().review(&body);

        assert_eq!(
            response(&outcome).result.message,
            "failed validation - failed validation privileged-container for \
             statefulset/cache in namespace data - unable to permit privileged container \
             for containers sidecar"
        );
    }

    #[test]
    fn test_drop_requires_all_or_net_raw() {
        let spec = PodSpecBuilder::new()
            .service_account("app")
            .container(
                ContainerBuilder::new("app")
                    .secure()
                    .drop_capabilities(["SYS_TIME"])
                    .build(),
            )
            .build();
        let body = WorkloadBuilder::new(WorkloadKind::DaemonSet, "agent")
            .pod_spec(spec)
            .review();
        let outcome = engine().review(&body);

        assert_eq!(
            outcome.verdict,
            Verdict::Denied {
                rule: "verify-drop-container-capabilities"
            }
        );
    }

    #[test]
    fn test_init_container_image_checked() {
        let spec = PodSpecBuilder::secure()
            .init_container(
                ContainerBuilder::new("migrate")
                    .image("docker.io/library/migrate:1")
                    .build(),
            )
            .build();
        let body = WorkloadBuilder::new(WorkloadKind::Job, "migrate")
            .pod_spec(spec)
            .review();
        let outcome =
            engine_with(&[("TRUSTED_IMAGE_REGISTRY", "registry.example.com/")]).review(&body);

        assert_eq!(
            outcome.verdict,
            Verdict::Denied {
                rule: "trusted-image-registry"
            }
        );
        assert!(response(&outcome).result.message.ends_with("for containers migrate"));
    }

    #[test]
    fn test_empty_service_account_denied() {
        let spec = PodSpecBuilder::new()
            .container(ContainerBuilder::new("app").secure().build())
            .build();
        let body = WorkloadBuilder::new(WorkloadKind::CronJob, "report")
            .pod_spec(spec)
            .review();
        let outcome = engine().review(&body);

        assert_eq!(
            outcome.verdict,
            Verdict::Denied {
                rule: "default-service-account"
            }
        );
        assert!(response(&outcome).result.message.contains("empty service account"));
    }

    #[test]
    fn test_bare_container_denied_as_root() {
        let body = WorkloadBuilder::new(WorkloadKind::Pod, "bare")
            .pod_spec(
                PodSpecBuilder::new()
                    .container(ContainerBuilder::new("app").build())
                    .build(),
            )
            .review();
        let outcome = engine().review(&body);
        assert_eq!(
            outcome.verdict,
            Verdict::Denied {
                rule: "run-as-non-root"
            }
        );
    }
}

mod override_tests {
    use super::*;
    use pod_security_webhook::resources::WorkloadKind;
    use pod_security_webhook::webhooks::SkipReason;

    fn host_pid_deployment() -> WorkloadBuilder {
        WorkloadBuilder::new(WorkloadKind::Deployment, "debug")
            .pod_spec(PodSpecBuilder::secure().host_pid(true).build())
    }

    #[test]
    fn test_environment_disables_rule() {
        let outcome =
            engine_with(&[("VALIDATE_HOST_PID", "false")]).review(&host_pid_deployment().review());

        assert_eq!(outcome.verdict, Verdict::Allowed);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].rule, "host-pid");
        assert_eq!(outcome.skipped[0].reason.label(), "environment");
    }

    #[test]
    fn test_environment_value_must_be_exactly_false() {
        for value in ["FALSE", "0", "no", "true"] {
            let outcome = engine_with(&[("VALIDATE_HOST_PID", value)])
                .review(&host_pid_deployment().review());
            assert_eq!(
                outcome.verdict,
                Verdict::Denied { rule: "host-pid" },
                "{value} must not disable the rule"
            );
        }
    }

    #[test]
    fn test_annotation_disables_rule_for_one_object() {
        let body = host_pid_deployment()
            .annotation("ignore-check.kube-linter.io/host-pid", "node debugging")
            .review();
        let outcome = engine().review(&body);

        assert_eq!(outcome.verdict, Verdict::Allowed);
        assert!(matches!(
            &outcome.skipped[0].reason,
            SkipReason::Annotation { value, .. } if value == "node debugging"
        ));
    }

    #[test]
    fn test_empty_annotation_does_not_disable() {
        let body = host_pid_deployment()
            .annotation("ignore-check.kube-linter.io/host-pid", "")
            .review();
        assert_eq!(
            engine().review(&body).verdict,
            Verdict::Denied { rule: "host-pid" }
        );
    }

    #[test]
    fn test_capability_alias_covers_both_rules() {
        let spec = PodSpecBuilder::new()
            .service_account("app")
            .container(
                ContainerBuilder::new("app")
                    .run_as_user(1000)
                    .add_capabilities(["SYS_ADMIN"])
                    .build(),
            )
            .build();
        let body = WorkloadBuilder::new(WorkloadKind::Deployment, "web")
            .annotation("ignore-check.kube-linter.io/verify-container-capabilities", "true")
            .pod_spec(spec)
            .review();
        let outcome = engine().review(&body);

        assert_eq!(outcome.verdict, Verdict::Allowed);
        let skipped: Vec<&str> = outcome.skipped.iter().map(|s| s.rule).collect();
        assert_eq!(
            skipped,
            vec![
                "verify-add-container-capabilities",
                "verify-drop-container-capabilities"
            ]
        );
    }

    #[test]
    fn test_controller_owned_pod_skips_everything() {
        let body = WorkloadBuilder::new(WorkloadKind::Pod, "web-7d9f8-abcde")
            .owned_by("ReplicaSet", "web-7d9f8")
            .review();
        let outcome = engine().review(&body);

        assert_eq!(outcome.verdict, Verdict::Allowed);
        assert!(
            outcome
                .skipped
                .iter()
                .all(|s| s.reason.label() == "owner-reference")
        );
    }

    #[test]
    fn test_pod_owned_by_other_kind_is_checked() {
        let body = WorkloadBuilder::new(WorkloadKind::Pod, "runner")
            .owned_by("Workflow", "build-42")
            .pod_spec(
                PodSpecBuilder::new()
                    .container(ContainerBuilder::new("runner").build())
                    .build(),
            )
            .review();
        assert_eq!(
            engine().review(&body).verdict,
            Verdict::Denied {
                rule: "run-as-non-root"
            }
        );
    }
}

mod request_tests {
    use super::*;
    use common::fixtures::{envelope, request_for, review_for};
    use serde_json::json;

    #[test]
    fn test_unsupported_kind_is_internal_error() {
        let secret = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": { "name": "token", "namespace": "default" },
        });
        let outcome = engine().review(&review_for("Secret", "", secret));

        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(response(&outcome).result.code, 500);
        assert_eq!(
            response(&outcome).result.message,
            "error retrieving pod specification from object - error validating kind - [Secret]"
        );
    }

    #[test]
    fn test_null_object_is_bad_request() {
        let mut request = request_for("Pod", "", json!({ "metadata": { "name": "x" } }));
        request["object"] = serde_json::Value::Null;
        let outcome = engine().review(&envelope(request));

        assert_eq!(outcome.verdict, Verdict::Invalid);
        assert_eq!(response(&outcome).result.code, 400);
        assert_eq!(response(&outcome).result.reason, "Forbidden");
    }

    #[test]
    fn test_empty_object_is_bad_request() {
        let outcome = engine().review(&review_for("Pod", "", json!({})));

        assert_eq!(outcome.verdict, Verdict::Invalid);
        assert!(outcome.skipped.is_empty());
        assert_eq!(response(&outcome).result.code, 400);
        assert_eq!(response(&outcome).uid, common::fixtures::REVIEW_UID);
    }

    #[test]
    fn test_undecodable_pod_spec_is_internal_error() {
        let pod = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": { "name": "broken", "namespace": "default" },
            "spec": { "containers": "not-a-list" },
        });
        let outcome = engine().review(&review_for("Pod", "", pod));
        assert_eq!(outcome.verdict, Verdict::Failed);
        assert_eq!(response(&outcome).result.code, 500);
    }
}

mod config_tests {
    use pod_security_webhook::config::{ConfigError, WebhookConfig};

    #[test]
    fn test_defaults() {
        let config = WebhookConfig::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 8443);
        assert_eq!(config.health_port, 8080);
        assert_eq!(config.tls_cert_path.to_str(), Some("/ssl_certs/tls.crt"));
        assert!(!config.debug);
        assert!(config.settings.trusted_registries.is_empty());
    }

    #[test]
    fn test_invalid_port() {
        let err = WebhookConfig::from_vars([("WEBHOOK_PORT", "https")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidPort {
                variable: "WEBHOOK_PORT",
                value: "https".to_string(),
            }
        );
    }

    #[test]
    fn test_registry_lists_are_unioned() {
        let config = WebhookConfig::from_vars([
            ("TRUSTED_IMAGE_REGISTRY", "a.example.com/"),
            ("TRUSTED_IMAGE_REGISTRIES", "b.example.com/, ,c.example.com/"),
        ])
        .unwrap();
        assert_eq!(
            config.settings.trusted_registries,
            vec!["a.example.com/", "b.example.com/", "c.example.com/"]
        );
    }
}
