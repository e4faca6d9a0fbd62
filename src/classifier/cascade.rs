//! Ordered composition of the three classification tiers. Later tiers run
//! only when earlier ones are inconclusive or a provisional employer label
//! needs confirmation.

use std::sync::Arc;

use crate::domain::{IntentLabel, Verdict};

use super::{
    keywords::{label_by_keywords, KeywordLabel},
    llm::LlmConfirmer,
    model::IntentModel,
};

pub struct IntentCascade {
    model: Arc<dyn IntentModel>,
    confirmer: LlmConfirmer,
}

impl IntentCascade {
    pub fn new(model: Arc<dyn IntentModel>, confirmer: LlmConfirmer) -> Self {
        Self { model, confirmer }
    }

    pub async fn classify(&self, text: &str) -> Verdict {
        let provisional = match label_by_keywords(text) {
            KeywordLabel::Barred => return Verdict::of(IntentLabel::Barred),
            KeywordLabel::Freelancer => return Verdict::of(IntentLabel::Freelancer),
            KeywordLabel::Employer => IntentLabel::Employer,
            KeywordLabel::Unsure => {
                let label = self.model.predict(text);
                tracing::debug!(target: "classifier", %label, "model tier label");
                label
            }
        };

        if provisional != IntentLabel::Employer {
            return Verdict::of(provisional);
        }

        // Confirmation gate before any outreach is committed to.
        let verdict = self.confirmer.confirm(text).await;
        tracing::debug!(
            target: "classifier",
            label = %verdict.label,
            reason = verdict.reason.as_deref().unwrap_or("-"),
            "llm tier verdict"
        );
        verdict
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::classifier::llm::LlmBackend;

    struct CountingModel {
        label: IntentLabel,
        calls: AtomicUsize,
    }

    impl IntentModel for CountingModel {
        fn predict(&self, _text: &str) -> IntentLabel {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.label
        }
    }

    struct CountingBackend {
        reply: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LlmBackend for CountingBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _message: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn cascade(
        model_label: IntentLabel,
        llm_reply: &'static str,
    ) -> (IntentCascade, Arc<CountingModel>, Arc<CountingBackend>) {
        let model = Arc::new(CountingModel {
            label: model_label,
            calls: AtomicUsize::new(0),
        });
        let backend = Arc::new(CountingBackend {
            reply: llm_reply,
            calls: AtomicUsize::new(0),
        });
        let confirmer = LlmConfirmer::new(backend.clone(), backend.clone());
        (
            IntentCascade::new(model.clone(), confirmer),
            model,
            backend,
        )
    }

    const CONFIRM_JSON: &str =
        r#"{"label": "employer", "reason": "va role", "response": "Hey! Interested."}"#;

    #[tokio::test]
    async fn barred_bypasses_model_and_llm() {
        let (cascade, model, backend) = cascade(IntentLabel::Employer, CONFIRM_JSON);
        let verdict = cascade.classify("unban please, can't send message").await;
        assert_eq!(verdict.label, IntentLabel::Barred);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keyword_freelancer_is_terminal() {
        let (cascade, model, backend) = cascade(IntentLabel::Employer, CONFIRM_JSON);
        let verdict = cascade
            .classify("I'm a freelancer, available for hire, my rate is $10/hr")
            .await;
        assert_eq!(verdict.label, IntentLabel::Freelancer);
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn keyword_employer_goes_straight_to_confirmation() {
        let (cascade, model, backend) = cascade(IntentLabel::Spam, CONFIRM_JSON);
        let verdict = cascade
            .classify("We are hiring a VA, must have experience with scheduling, DM to apply")
            .await;
        assert_eq!(verdict.label, IntentLabel::Employer);
        assert_eq!(verdict.reply.as_deref(), Some("Hey! Interested."));
        // Tier 2 is skipped when tier 1 already decided.
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsure_consults_model_and_nonemployer_stops_there() {
        let (cascade, model, backend) = cascade(IntentLabel::Spam, CONFIRM_JSON);
        let verdict = cascade.classify("hello everyone").await;
        assert_eq!(verdict.label, IntentLabel::Spam);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_employer_still_needs_confirmation() {
        let (cascade, model, backend) = cascade(
            IntentLabel::Employer,
            r#"{"label": "skip", "reason": "agency post"}"#,
        );
        let verdict = cascade.classify("hello everyone").await;
        // LLM demoted the provisional employer label.
        assert_eq!(verdict.label, IntentLabel::Skip);
        assert_eq!(verdict.reply, None);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
