//! Facade offering every operation directly or over the bus, under the same
//! correlation-id contract.

use std::sync::Arc;

use pb_01_upstream_client::UpstreamApi;
use serde::{Deserialize, Serialize};
use shared_types::{
    CorrelationId, DeleteConsumerInformationRequest, DeletePaymentInstrumentsRequest,
    EnrollDataRequest, EnrollPaymentInstrumentsRequest, GetDataRequest,
    ManageConsumerInformationRequest, ManagePaymentInstrumentsRequest, OperationRequest,
    OperationResponse, OperationResult, RequestStatusQuery, TraceId,
};
use tracing::{info, info_span, Instrument};

use crate::ipc::BusClient;

/// How the coordinator reaches the upstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Call the upstream client in-process
    #[default]
    Direct,
    /// Publish on the bus and await the correlated reply
    Bus,
}

pub struct Coordinator {
    upstream: Arc<dyn UpstreamApi>,
    bus: Option<Arc<BusClient>>,
    mode: DispatchMode,
}

impl Coordinator {
    /// Coordinator that calls the upstream directly.
    pub fn direct(upstream: Arc<dyn UpstreamApi>) -> Self {
        Self {
            upstream,
            bus: None,
            mode: DispatchMode::Direct,
        }
    }

    /// Coordinator that goes over the bus by default and can still call directly.
    pub fn with_bus(upstream: Arc<dyn UpstreamApi>, bus: Arc<BusClient>) -> Self {
        Self {
            upstream,
            bus: Some(bus),
            mode: DispatchMode::Bus,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Run `request` in the configured mode. A missing correlation id is generated.
    pub async fn execute(
        &self,
        request: OperationRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        let correlation_id = correlation_id.unwrap_or_default();
        match (self.mode, &self.bus) {
            (DispatchMode::Bus, Some(_)) => self.call_async(request, correlation_id).await,
            _ => self.call_direct(request, correlation_id).await,
        }
    }

    /// Synchronous path: the upstream client in-process.
    pub async fn call_direct(
        &self,
        request: OperationRequest,
        correlation_id: CorrelationId,
    ) -> OperationResult<OperationResponse> {
        let trace_id = TraceId::from(&correlation_id);
        let operation = request.operation();
        let span = info_span!("direct_call", trace_id = %trace_id, operation = %operation);
        async {
            info!("Calling upstream directly");
            self.upstream.invoke(&request, &trace_id).await
        }
        .instrument(span)
        .await
    }

    /// Asynchronous path: publish on the bus, await the reply. Falls back to
    /// the direct path when no bus is attached.
    pub async fn call_async(
        &self,
        request: OperationRequest,
        correlation_id: CorrelationId,
    ) -> OperationResult<OperationResponse> {
        let Some(bus) = &self.bus else {
            return self.call_direct(request, correlation_id).await;
        };
        let operation = request.operation();
        let span = info_span!("bus_call", correlation_id = %correlation_id, operation = %operation);
        async {
            info!("Publishing request on the bus");
            bus.call(&request, correlation_id.clone()).await
        }
        .instrument(span)
        .await
    }

    pub async fn enroll_data(
        &self,
        request: EnrollDataRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        self.execute(OperationRequest::EnrollData(request), correlation_id)
            .await
    }

    pub async fn enroll_payment_instruments(
        &self,
        request: EnrollPaymentInstrumentsRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        self.execute(OperationRequest::EnrollInstruments(request), correlation_id)
            .await
    }

    pub async fn request_status(
        &self,
        request_trace_id: impl Into<String>,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        let query = RequestStatusQuery {
            request_trace_id: request_trace_id.into(),
        };
        self.execute(OperationRequest::GetStatus(query), correlation_id)
            .await
    }

    pub async fn manage_payment_instruments(
        &self,
        request: ManagePaymentInstrumentsRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        self.execute(OperationRequest::ManageInstruments(request), correlation_id)
            .await
    }

    pub async fn manage_consumer_information(
        &self,
        request: ManageConsumerInformationRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        self.execute(OperationRequest::ManageConsumer(request), correlation_id)
            .await
    }

    pub async fn delete_consumer_information(
        &self,
        request: DeleteConsumerInformationRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        self.execute(OperationRequest::DeleteConsumer(request), correlation_id)
            .await
    }

    pub async fn delete_payment_instruments(
        &self,
        request: DeletePaymentInstrumentsRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        self.execute(OperationRequest::DeleteInstruments(request), correlation_id)
            .await
    }

    pub async fn get_data(
        &self,
        request: GetDataRequest,
        correlation_id: Option<CorrelationId>,
    ) -> OperationResult<OperationResponse> {
        self.execute(OperationRequest::GetData(request), correlation_id)
            .await
    }
}
