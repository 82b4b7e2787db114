use bytes::BytesMut;

use crate::frontend::transport::FrontendTransport;
use crate::shared_types::SessionStage;
use crate::wire_protocol::{MessageType, PeekError, peek_frontend};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const SCRATCH_CAPACITY_HINT: usize = 4096;

// -----------------------------------------------------------------------------
// ----- InboundMessage --------------------------------------------------------

/// One complete frontend frame, bytes exactly as received.
#[derive(Debug)]
pub(crate) struct InboundMessage {
    pub(crate) message_type: MessageType,
    pub(crate) bytes: BytesMut,
}

// -----------------------------------------------------------------------------
// ----- FrontendBuffers -------------------------------------------------------

#[derive(Debug)]
pub(crate) struct FrontendBuffers {
    inbox: BytesMut,
    outbox: BytesMut,
}

impl FrontendBuffers {
    pub(crate) fn new() -> Self {
        Self {
            inbox: BytesMut::with_capacity(SCRATCH_CAPACITY_HINT),
            outbox: BytesMut::with_capacity(SCRATCH_CAPACITY_HINT),
        }
    }

    pub(crate) async fn read_from(
        &mut self,
        transport: &mut FrontendTransport,
    ) -> std::io::Result<usize> {
        self.inbox.reserve(SCRATCH_CAPACITY_HINT);
        transport.read_buf(&mut self.inbox).await
    }

    /// Split the next complete frame off the inbox. Partial frames stay put
    /// until more bytes arrive.
    pub(crate) fn pull_message(
        &mut self,
        stage: SessionStage,
    ) -> Result<Option<InboundMessage>, PeekError> {
        let Some(found) = peek_frontend(stage, &self.inbox)? else {
            return Ok(None);
        };

        Ok(Some(InboundMessage {
            message_type: found.message_type,
            bytes: self.inbox.split_to(found.len),
        }))
    }

    /// Bytes received but not yet pulled as a message.
    pub(crate) fn has_unread_input(&self) -> bool {
        !self.inbox.is_empty()
    }

    pub(crate) fn queue_response(&mut self, response: &[u8]) {
        self.outbox.extend_from_slice(response);
    }

    pub(crate) async fn flush_to(
        &mut self,
        transport: &mut FrontendTransport,
    ) -> std::io::Result<()> {
        if !self.outbox.is_empty() {
            transport.write_all_buf(&mut self.outbox).await?;
        }

        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbox.extend_from_slice(bytes);
    }

    #[cfg(test)]
    pub(crate) fn outbox(&self) -> &[u8] {
        &self.outbox
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
