//! Admission review processing.
//!
//! Each review runs through three steps, stopping at the first failure:
//! - Setup: decode the review, check the request, resolve the pod spec and
//!   build the active rule pipeline
//! - Validate: run the active rules in order, fail-fast
//! - Respond: turn the outcome into a [`Decision`] and write it onto the
//!   admission response

use std::sync::Arc;

use json_patch::{Patch, PatchOperation};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use kube::core::{DynamicObject, TypeMeta};
use tracing::{debug, error, info, warn};

use crate::config::{RuleOverrides, RuleSettings, WebhookConfig};
use crate::error::{Error, PolicyViolation, Result};
use crate::pipeline::RuleCatalog;
use crate::resources::{is_empty_object, resolve_pod_spec};
use crate::webhooks::overrides::{SkippedRule, build_pipeline};
use crate::webhooks::policies::{self, PodSpecContext};

/// Reason reported on every response that does not admit the object
pub const REASON_FORBIDDEN: &str = "Forbidden";

/// The verdict for one admission request
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub permitted: bool,
    pub status_code: u16,
    /// Present only when the request is not permitted
    pub message: Option<String>,
    /// Always empty for the validating rules, kept for mutating callers
    pub patches: Vec<PatchOperation>,
}

impl Decision {
    /// Admit the object
    pub fn allowed() -> Self {
        Self {
            permitted: true,
            status_code: 200,
            message: None,
            patches: Vec::new(),
        }
    }

    /// Refuse the object with the error's status code and text
    pub fn from_error(err: &Error) -> Self {
        Self {
            permitted: false,
            status_code: err.status_code(),
            message: Some(err.to_string()),
            patches: Vec::new(),
        }
    }

    pub fn with_patches(mut self, patches: Vec<PatchOperation>) -> Self {
        self.patches = patches;
        self
    }

    /// Status reason reported alongside the message
    pub fn reason(&self) -> Option<&'static str> {
        (!self.permitted).then_some(REASON_FORBIDDEN)
    }

    /// Write the decision onto an admission response.
    ///
    /// Patches are attached as a JSON patch only when there are any.
    pub fn write(&self, response: AdmissionResponse) -> Result<AdmissionResponse> {
        let response = self.write_status(response);
        if self.patches.is_empty() {
            return Ok(response);
        }

        response
            .with_patch(Patch(self.patches.clone()))
            .map_err(|e| Error::ResponseSerialization(format!("unable to marshal patches: {e}")))
    }

    /// Write everything except the patches
    fn write_status(&self, mut response: AdmissionResponse) -> AdmissionResponse {
        response.allowed = self.permitted;
        response.result.code = self.status_code;
        if let Some(message) = &self.message {
            response.result.message = message.clone();
        }
        if let Some(reason) = self.reason() {
            response.result.reason = reason.to_string();
        }
        response
    }
}

/// How a review ended, for logging and metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied { rule: &'static str },
    Invalid,
    Failed,
}

impl Verdict {
    fn from_error(err: &Error) -> Self {
        match err {
            Error::PolicyViolation(violation) => Verdict::Denied {
                rule: violation.rule,
            },
            Error::MalformedRequest(_) | Error::Decode(_) => Verdict::Invalid,
            Error::Resolve(_) | Error::ResponseSerialization(_) => Verdict::Failed,
        }
    }

    /// The rule that denied the request, if any
    pub fn denied_by(&self) -> Option<&'static str> {
        match self {
            Verdict::Denied { rule } => Some(*rule),
            _ => None,
        }
    }

    /// Short label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Allowed => "allowed",
            Verdict::Denied { .. } => "denied",
            Verdict::Invalid => "invalid",
            Verdict::Failed => "error",
        }
    }
}

/// Everything produced by one review
#[derive(Debug)]
pub struct Outcome {
    /// The review to send back
    pub review: AdmissionReview<DynamicObject>,
    pub decision: Decision,
    pub verdict: Verdict,
    /// Rules left out of the pipeline by overrides
    pub skipped: Vec<SkippedRule>,
}

/// Decode the review envelope and take out its request
pub fn decode_request(body: &[u8]) -> Result<AdmissionRequest<DynamicObject>> {
    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(body)?;
    review
        .try_into()
        .map_err(|e| Error::MalformedRequest(format!("request object is nil: {e}")))
}

/// The validation engine: static catalog plus startup configuration.
///
/// Holds no per-request state and can serve concurrent reviews.
pub struct AdmissionEngine {
    catalog: RuleCatalog<PodSpecContext>,
    overrides: RuleOverrides,
    settings: Arc<RuleSettings>,
}

impl AdmissionEngine {
    pub fn new(
        catalog: RuleCatalog<PodSpecContext>,
        overrides: RuleOverrides,
        settings: RuleSettings,
    ) -> Self {
        Self {
            catalog,
            overrides,
            settings: Arc::new(settings),
        }
    }

    /// Engine with the full rule catalog
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(
            policies::catalog(),
            config.overrides.clone(),
            config.settings.clone(),
        )
    }

    pub fn catalog(&self) -> &RuleCatalog<PodSpecContext> {
        &self.catalog
    }

    /// Review a raw admission review body
    pub fn review(&self, body: &[u8]) -> Outcome {
        let request = match decode_request(body) {
            Ok(request) => request,
            Err(err) => {
                error!(error = %err, "unable to process admission review");
                let response = AdmissionResponse::invalid(err.to_string());
                return respond(response, Err(err), Vec::new());
            }
        };

        debug!(
            uid = %request.uid,
            operation = ?request.operation,
            kind = %request.kind.kind,
            name = %request.name,
            namespace = ?request.namespace,
            "processing admission request"
        );

        let (result, skipped) = match self.setup(&request) {
            Ok(ctx) => self.validate(&ctx),
            Err(err) => (Err(err), Vec::new()),
        };

        match &result {
            Ok(()) => info!(uid = %request.uid, "admission request allowed"),
            Err(Error::PolicyViolation(violation)) => {
                warn!(uid = %request.uid, rule = violation.rule, message = %violation, "admission request denied")
            }
            Err(err) => error!(uid = %request.uid, error = %err, "unable to process admission request"),
        }

        respond(AdmissionResponse::from(&request), result, skipped)
    }

    /// Check the request and derive the pod spec context
    fn setup(&self, request: &AdmissionRequest<DynamicObject>) -> Result<PodSpecContext> {
        if request.request_kind.is_none() {
            return Err(Error::MalformedRequest(
                "request kind is missing".to_string(),
            ));
        }

        let mut object = request
            .object
            .clone()
            .filter(|object| !is_empty_object(object))
            .ok_or_else(|| Error::MalformedRequest("empty object in request".to_string()))?;

        // some clients omit type metadata on the embedded object
        if object.types.is_none() {
            object.types = Some(TypeMeta {
                api_version: request.kind.api_version(),
                kind: request.kind.kind.clone(),
            });
        }

        let pod_spec = resolve_pod_spec(&object)?;
        Ok(PodSpecContext::new(object, pod_spec, Arc::clone(&self.settings)))
    }

    /// Run the active rules for this request
    fn validate(&self, ctx: &PodSpecContext) -> (Result<()>, Vec<SkippedRule>) {
        let (pipeline, skipped) = build_pipeline(&self.catalog, &self.overrides, ctx);

        let result = pipeline.run().map_err(|failure| {
            Error::from(PolicyViolation {
                rule: failure.rule,
                target: ctx.identity(),
                violation: failure.violation,
            })
        });

        (result, skipped)
    }
}

/// Render the outcome onto the response
fn respond(response: AdmissionResponse, result: Result<()>, skipped: Vec<SkippedRule>) -> Outcome {
    let (decision, verdict) = match &result {
        Ok(()) => (Decision::allowed(), Verdict::Allowed),
        Err(err) => (Decision::from_error(err), Verdict::from_error(err)),
    };

    let uid = response.uid.clone();
    let (review, decision, verdict) = match decision.write(response) {
        Ok(response) => (response.into_review(), decision, verdict),
        Err(err) => {
            error!(uid, error = %err, "unable to build admission response");
            let fallback = Decision::from_error(&err);
            let mut response = AdmissionResponse::invalid(err.to_string());
            response.uid = uid;
            let review = fallback.write_status(response).into_review();
            (review, fallback, Verdict::Failed)
        }
    };

    Outcome {
        review,
        decision,
        verdict,
        skipped,
    }
}
