/// Pass outputs and the read-only providers consumers hold.
///
/// A producer publishes its sampled attachments once its framebuffer
/// exists; consumers resolve them in their own setup, which the renderer
/// runs after the producer's. Re-initializing a producer revokes and then
/// republishes, so consumers must be initialized again after it.

use std::sync::{Arc, RwLock};
use crate::error::{Error, Result};
use crate::graphics_device::{Sampler, Texture};

/// A texture together with the sampler consumers read it through
#[derive(Clone)]
pub struct SampledAttachment {
    pub texture: Arc<dyn Texture>,
    pub sampler: Arc<dyn Sampler>,
}

/// Read-only access to another pass's attachments
pub trait AttachmentProvider: Send + Sync {
    /// Name of the pass that publishes the attachments
    fn producer_name(&self) -> &str;

    /// Attachment published at `slot`
    ///
    /// Fails with `Error::DependencyNotReady` before the producer has set up
    /// its framebuffer.
    fn output_attachment(&self, slot: usize) -> Result<SampledAttachment>;
}

/// Attachments published by one pass
#[derive(Clone)]
pub struct PassOutputs {
    producer: String,
    slots: Arc<RwLock<Option<Vec<SampledAttachment>>>>,
}

impl PassOutputs {
    pub fn new(producer: &str) -> Self {
        Self {
            producer: producer.to_string(),
            slots: Arc::new(RwLock::new(None)),
        }
    }

    /// Replace the published attachments
    pub fn publish(&self, attachments: Vec<SampledAttachment>) {
        if let Ok(mut slots) = self.slots.write() {
            *slots = Some(attachments);
        }
    }

    /// Withdraw the published attachments
    pub fn revoke(&self) {
        if let Ok(mut slots) = self.slots.write() {
            *slots = None;
        }
    }

    pub fn is_published(&self) -> bool {
        self.slots.read().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Provider handle for consumers
    pub fn provider(&self) -> Arc<dyn AttachmentProvider> {
        Arc::new(self.clone())
    }
}

impl AttachmentProvider for PassOutputs {
    fn producer_name(&self) -> &str {
        &self.producer
    }

    fn output_attachment(&self, slot: usize) -> Result<SampledAttachment> {
        let slots = self
            .slots
            .read()
            .map_err(|_| Error::BackendError(format!("outputs of '{}' poisoned", self.producer)))?;
        let attachments = slots.as_ref().ok_or_else(|| {
            Error::DependencyNotReady(format!(
                "pass '{}' has not published its attachments",
                self.producer
            ))
        })?;
        attachments.get(slot).cloned().ok_or_else(|| {
            Error::InvalidResource(format!(
                "pass '{}' has no output slot {} ({} published)",
                self.producer,
                slot,
                attachments.len()
            ))
        })
    }
}

#[cfg(test)]
#[path = "outputs_tests.rs"]
mod tests;
