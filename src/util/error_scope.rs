//! Helper for turning a fallible device allocation into a `Result` instead
//! of a validation-error log line, following `wgpu`'s push/pop error-scope
//! API.
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use wgpu::Device;

use crate::error::EngineError;

/// Scopes a single out-of-memory error filter around a sequence of buffer
/// creations. Because `wgpu` reports allocation failures asynchronously, the
/// scope must be ended explicitly with [`AllocationErrorScope::end`].
#[must_use = "an AllocationErrorScope must be ended with `end`"]
pub struct AllocationErrorScope<'a> {
    device: &'a Device,
    ended: bool,
}

impl<'a> AllocationErrorScope<'a> {
    pub fn new(device: &'a Device) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        Self { device, ended: false }
    }

    pub fn end(mut self) -> Result<(), EngineError> {
        self.ended = true;

        // The future wgpu hands back resolves immediately on native/WebGL;
        // we can't reasonably block here, so a single poll is enough.
        let mut future = self.device.pop_error_scope();
        let pin = Pin::new(&mut future);
        match pin.poll(&mut Context::from_waker(&noop_waker::noop_waker())) {
            Poll::Ready(Some(error)) => Err(EngineError::AllocationFailed(error)),
            Poll::Ready(None) => Ok(()),
            Poll::Pending => Ok(()),
        }
    }
}

impl<'a> Drop for AllocationErrorScope<'a> {
    fn drop(&mut self) {
        if !self.ended {
            log::error!("AllocationErrorScope dropped without calling `end`");
        }
    }
}
