//! Request/response interceptor pipeline
//!
//! Hooks run in registration order and may short-circuit the call by
//! returning an error: a failing pre hook aborts before the transport is
//! reached, a failing post hook turns a received response into a failure.

use super::transport::{TransportRequest, TransportResponse};
use crate::Result;

type PreHook = Box<dyn Fn(&mut TransportRequest) -> Result<()> + Send + Sync>;
type PostHook = Box<dyn Fn(&mut TransportResponse) -> Result<()> + Send + Sync>;

/// Ordered pipeline of pre-request and post-response hooks
#[derive(Default)]
pub struct InterceptorChain {
    pre: Vec<PreHook>,
    post: Vec<PostHook>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook run against every outbound request
    pub fn on_request<F>(&mut self, hook: F)
    where
        F: Fn(&mut TransportRequest) -> Result<()> + Send + Sync + 'static,
    {
        self.pre.push(Box::new(hook));
    }

    /// Register a hook run against every received response
    pub fn on_response<F>(&mut self, hook: F)
    where
        F: Fn(&mut TransportResponse) -> Result<()> + Send + Sync + 'static,
    {
        self.post.push(Box::new(hook));
    }

    /// Run all pre hooks in registration order
    pub fn apply_request(&self, request: &mut TransportRequest) -> Result<()> {
        for hook in &self.pre {
            hook(request)?;
        }
        Ok(())
    }

    /// Run all post hooks in registration order
    pub fn apply_response(&self, response: &mut TransportResponse) -> Result<()> {
        for hook in &self.post {
            hook(response)?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}
