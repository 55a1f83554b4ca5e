//! Per-message request handling.
//!
//! ```text
//! Delivery
//!   │ trace id = correlationId ?? fresh UUID
//!   ├─ redelivered with a cached reply? ── yes ──→ republish (no upstream call)
//!   ├─ routing key → Operation          (unknown → ValidationError reply)
//!   ├─ payload → OperationRequest       (undecodable → SerializationError reply)
//!   ├─ UpstreamApi::invoke, exactly once
//!   └─ settle
//!        ├─ no replyTo ─────────→ ack
//!        ├─ publish ok ─────────→ ack
//!        └─ publish failed ─────→ cache reply under ReplyKey, nack(requeue)
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use pb_01_upstream_client::{mask_payload, UpstreamApi};
use shared_bus::Delivery;
use shared_types::{CorrelationId, Operation, OperationRequest, OperationResponse, ReplyBody, TraceId};
use tracing::{debug, error, info, info_span, warn, Instrument, Span};

use crate::domain::{BridgeMetrics, ReplyCache, ReplyKey, RequestState};
use crate::ipc::publisher::ReplyPublisher;
use crate::ipc::translator::{ExceptionToReplyTranslator, HandlerError};

pub struct RpcHandler {
    upstream: Arc<dyn UpstreamApi>,
    publisher: ReplyPublisher,
    reply_cache: Arc<ReplyCache>,
    metrics: Arc<BridgeMetrics>,
    translator: ExceptionToReplyTranslator,
    request_queue_prefix: String,
    redelivery_delay: Duration,
}

impl RpcHandler {
    pub fn new(
        upstream: Arc<dyn UpstreamApi>,
        publisher: ReplyPublisher,
        reply_cache: Arc<ReplyCache>,
        metrics: Arc<BridgeMetrics>,
        request_queue_prefix: impl Into<String>,
        redelivery_delay: Duration,
    ) -> Self {
        Self {
            upstream,
            publisher,
            reply_cache,
            metrics,
            translator: ExceptionToReplyTranslator,
            request_queue_prefix: request_queue_prefix.into(),
            redelivery_delay,
        }
    }

    /// Handle one delivery to completion. Returns the terminal state.
    pub async fn handle(&self, delivery: Delivery) -> RequestState {
        let correlation_id = delivery.envelope.correlation_id.clone();
        let trace_id = TraceId::resolve(correlation_id.as_ref());
        let span = info_span!(
            "rpc_request",
            trace_id = %trace_id,
            routing_key = %delivery.routing_key,
            delivery_tag = delivery.delivery_tag,
        );

        self.process(delivery, correlation_id, trace_id)
            .instrument(span)
            .await
    }

    async fn process(
        &self,
        delivery: Delivery,
        correlation_id: Option<CorrelationId>,
        trace_id: TraceId,
    ) -> RequestState {
        let mut state = RequestState::Received;
        self.metrics.record_received(delivery.redelivered);
        info!(
            correlation_id = correlation_id.as_ref().map(|c| c.as_str()),
            redelivered = delivery.redelivered,
            "Processing request"
        );

        let reply_key = ReplyKey::for_message(
            correlation_id.as_ref(),
            delivery.envelope.message_id.as_deref(),
            &delivery.routing_key,
        );
        let cached = reply_key
            .as_ref()
            .filter(|_| delivery.redelivered)
            .and_then(|key| self.reply_cache.get(key));

        let reply = match cached {
            Some(reply) => {
                self.metrics.record_cache_hit();
                info!("Republishing cached reply without upstream call");
                reply
            }
            None => {
                let outcome = self.dispatch(&delivery, &trace_id, &mut state).await;
                if let Err(e) = &outcome {
                    warn!(error = %e, "Request failed");
                }
                self.translator.to_reply(correlation_id.clone(), outcome)
            }
        };

        self.settle(delivery, correlation_id, reply_key, reply, state).await
    }

    /// Decode and invoke the upstream exactly once.
    async fn dispatch(
        &self,
        delivery: &Delivery,
        trace_id: &TraceId,
        state: &mut RequestState,
    ) -> Result<OperationResponse, HandlerError> {
        let operation = self.resolve_operation(delivery)?;
        let request = OperationRequest::decode(operation, &delivery.envelope.payload)?;
        debug!(
            operation = %operation,
            payload = %mask_payload(&delivery.envelope.payload),
            "Decoded request"
        );

        transition(state, RequestState::Dispatched);
        let started = Instant::now();
        let upstream = Arc::clone(&self.upstream);
        let trace = trace_id.clone();
        let joined = tokio::spawn(
            async move { upstream.invoke(&request, &trace).await }.instrument(Span::current()),
        )
        .await;

        let result = match joined {
            Ok(result) => result.map_err(HandlerError::from),
            Err(e) => {
                error!(operation = %operation, error = %e, "Upstream task aborted");
                Err(HandlerError::Aborted(e.to_string()))
            }
        };
        self.metrics
            .record_upstream_call(result.is_ok(), started.elapsed().as_millis() as u64);
        result
    }

    /// Operation from the routing key. Messages published straight to a
    /// request queue carry the queue name as routing key.
    fn resolve_operation(&self, delivery: &Delivery) -> Result<Operation, HandlerError> {
        match Operation::from_routing_key(&delivery.routing_key) {
            Ok(operation) => Ok(operation),
            Err(unknown) => delivery
                .routing_key
                .strip_prefix(self.request_queue_prefix.as_str())
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|key| Operation::from_routing_key(key).ok())
                .ok_or(HandlerError::UnsupportedOperation(unknown)),
        }
    }

    /// Publish the reply (if one was asked for) and settle the delivery.
    async fn settle(
        &self,
        delivery: Delivery,
        correlation_id: Option<CorrelationId>,
        reply_key: Option<ReplyKey>,
        reply: ReplyBody,
        mut state: RequestState,
    ) -> RequestState {
        let Some(reply_to) = delivery.envelope.reply_queue().map(str::to_owned) else {
            debug!("No reply queue, acknowledging without reply");
            self.ack(delivery).await;
            transition(&mut state, RequestState::Replied);
            return state;
        };

        match self
            .publisher
            .publish(correlation_id.as_ref(), &reply_to, &reply)
            .await
        {
            Ok(()) => {
                self.metrics.record_reply_published(!reply.is_success());
                if let Some(key) = &reply_key {
                    self.reply_cache.remove(key);
                }
                self.ack(delivery).await;
                transition(&mut state, RequestState::Replied);
                info!(reply_to = %reply_to, success = reply.is_success(), "Reply sent");
            }
            Err(e) => {
                self.metrics.record_publish_failure();
                error!(reply_to = %reply_to, error = %e, "Reply publish failed, requeueing request");
                match reply_key {
                    Some(key) => self.reply_cache.insert(key, reply),
                    None => warn!("Message has no identity, redelivery will call upstream again"),
                }
                tokio::time::sleep(self.redelivery_delay).await;
                self.nack(delivery).await;
                transition(&mut state, RequestState::Requeued);
            }
        }
        state
    }

    async fn ack(&self, delivery: Delivery) {
        match delivery.ack().await {
            Ok(()) => self.metrics.record_ack(),
            Err(e) => warn!(error = %e, "Failed to acknowledge delivery"),
        }
    }

    async fn nack(&self, delivery: Delivery) {
        match delivery.nack(true).await {
            Ok(()) => self.metrics.record_nack(),
            Err(e) => warn!(error = %e, "Failed to negatively acknowledge delivery"),
        }
    }
}

fn transition(state: &mut RequestState, next: RequestState) {
    if !state.can_transition_to(next) {
        warn!(from = %state, to = %next, "Unexpected request state transition");
    }
    debug!(from = %state, to = %next, "Request state changed");
    *state = next;
}
