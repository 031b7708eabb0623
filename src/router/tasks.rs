//! Background work of `ProtocolRouter`: the read loop and inbound handlers

use std::ops::ControlFlow;
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::control::RawControlRequest;
use crate::error::Result;
use crate::message::{Envelope, classify};
use crate::queue::{PushOutcome, QueueWriter};
use crate::transport::Transport;
use crate::types::identifiers::RequestId;
use crate::types::messages::Message;
use crate::types::options::InboundDispatch;

use super::RouterShared;

impl<T: Transport> RouterShared<T> {
    /// Serialize one document and write it as a single line
    pub(crate) async fn write_document<D: Serialize + ?Sized>(&self, document: &D) -> Result<()> {
        let mut line = serde_json::to_string(document)?;
        line.push('\n');
        let mut transport = self.transport.lock().await;
        transport.write(&line).await
    }

    /// Read documents until the stream ends, faults, or the router is disposed
    ///
    /// The end of the stream and disposal complete the message stream
    /// normally. A transport fault completes it with that fault as the
    /// terminal error. Either way, outbound requests still pending are failed,
    /// since no response can arrive any more.
    pub(crate) async fn read_loop(
        self: Arc<Self>,
        mut inbound: mpsc::Receiver<Result<serde_json::Value>>,
        mut writer: QueueWriter,
    ) {
        debug!("read loop started");
        let outcome: Result<()> = loop {
            let next = tokio::select! {
                biased;
                () = self.lifetime.cancelled() => break Ok(()),
                next = inbound.recv() => next,
            };

            match next {
                None => break Ok(()),
                Some(Err(e)) => break Err(e),
                Some(Ok(document)) => {
                    if self.route(document, &mut writer).await.is_break() {
                        break Ok(());
                    }
                }
            }
        };

        match outcome {
            Ok(()) => {
                debug!("read loop finished");
                writer.complete();
            }
            Err(e) => {
                error!("read loop terminated by transport fault: {e}");
                writer.complete_with_error(Arc::new(e));
            }
        }

        if !self.lifetime.is_cancelled() {
            let failed = self.protocol.close("transport stream ended");
            if failed > 0 {
                warn!("failed {failed} pending control requests after the stream ended");
            }
        }
    }

    /// Route one document; `Break` stops the loop
    async fn route(
        self: &Arc<Self>,
        document: serde_json::Value,
        writer: &mut QueueWriter,
    ) -> ControlFlow<()> {
        let envelope = match classify(document) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("skipping malformed document: {e}");
                return ControlFlow::Continue(());
            }
        };

        match envelope {
            Envelope::ControlResponse(payload) => {
                self.protocol.handle_response(payload);
            }
            Envelope::ControlRequest(request) => return self.handle_inbound(request).await,
            Envelope::ControlCancelRequest(cancel) => self.cancel_inbound(&cancel.request_id),
            Envelope::Message(message) => return self.deliver(message, writer).await,
            Envelope::Unrecognized(tag) => {
                debug!("ignoring document with unrecognized type {tag:?}");
            }
        }
        ControlFlow::Continue(())
    }

    /// Hand a conversation message to the consumer
    async fn deliver(&self, message: Message, writer: &mut QueueWriter) -> ControlFlow<()> {
        let terminal = self.settings.complete_on_terminal_result && message.is_terminal_result();

        match writer.push(message, &self.lifetime).await {
            PushOutcome::Delivered => {}
            PushOutcome::Closed => debug!("message stream closed, dropping message"),
            PushOutcome::Cancelled => return ControlFlow::Break(()),
        }

        if terminal && writer.is_open() {
            info!("terminal result received, completing message stream");
            writer.complete();
        }
        ControlFlow::Continue(())
    }

    /// Run the handler for an inbound request in the configured mode
    async fn handle_inbound(self: &Arc<Self>, request: RawControlRequest) -> ControlFlow<()> {
        let signal = self.lifetime.child_token();
        self.inflight
            .lock()
            .insert(request.request_id.clone(), signal.clone());

        match self.settings.inbound_dispatch {
            InboundDispatch::Sequential => {
                tokio::select! {
                    biased;
                    () = self.lifetime.cancelled() => ControlFlow::Break(()),
                    () = self.answer(request, signal) => ControlFlow::Continue(()),
                }
            }
            InboundDispatch::Concurrent => {
                let shared = Arc::clone(self);
                tokio::spawn(async move {
                    let lifetime = shared.lifetime.clone();
                    tokio::select! {
                        () = lifetime.cancelled() => {}
                        () = shared.answer(request, signal) => {}
                    }
                });
                ControlFlow::Continue(())
            }
        }
    }

    /// Produce and write the response to one inbound request
    async fn answer(&self, request: RawControlRequest, signal: CancellationToken) {
        let response = self.dispatcher.respond(&request, signal.clone()).await;
        self.inflight.lock().remove(&request.request_id);

        if signal.is_cancelled() {
            debug!(
                "inbound request {} was cancelled, not answering",
                request.request_id
            );
            return;
        }
        if let Err(e) = self.write_document(&response).await {
            warn!(
                "failed to write response to control request {}: {e}",
                request.request_id
            );
        }
    }

    /// Cancel the handler of a withdrawn inbound request
    fn cancel_inbound(&self, request_id: &RequestId) {
        match self.inflight.lock().remove(request_id) {
            Some(token) => {
                debug!("agent cancelled inbound request {request_id}");
                token.cancel();
            }
            None => debug!("cancel for unknown or finished inbound request {request_id}"),
        }
    }
}
