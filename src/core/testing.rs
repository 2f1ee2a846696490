//! Scripted backend for unit tests

use crate::client::Method;
use crate::core::traits::Backend;
use crate::types::{FinesError, Result};
use serde_json::Value;
use std::collections::HashMap;

/// Backend answering from a fixed route table and recording every call
///
/// Unrouted calls fail with a 404 status error.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    routes: HashMap<(Method, String), Value>,
    calls: Vec<String>,
    bodies: Vec<(String, Value)>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(self, path: &str, response: Value) -> Self {
        self.on(Method::Get, path, response)
    }

    pub fn on_post(self, path: &str, response: Value) -> Self {
        self.on(Method::Post, path, response)
    }

    pub fn on_delete(self, path: &str, response: Value) -> Self {
        self.on(Method::Delete, path, response)
    }

    fn on(mut self, method: Method, path: &str, response: Value) -> Self {
        self.routes.insert((method, path.to_string()), response);
        self
    }

    /// Every call so far as `"<METHOD> <path>"`
    pub fn calls(&self) -> &[String] {
        &self.calls
    }

    /// Body of the most recent POST to `path`
    pub fn body_sent_to(&self, path: &str) -> Option<&Value> {
        self.bodies
            .iter()
            .rev()
            .find(|(sent, _)| sent == path)
            .map(|(_, body)| body)
    }

    fn answer(&mut self, method: Method, path: &str) -> Result<Value> {
        self.calls.push(format!("{} {}", method, path));
        self.routes
            .get(&(method, path.to_string()))
            .cloned()
            .ok_or_else(|| FinesError::http_status(method.as_str(), path, 404, "no route"))
    }
}

impl Backend for ScriptedBackend {
    fn get(&mut self, path: &str) -> Result<Value> {
        self.answer(Method::Get, path)
    }

    fn post(&mut self, path: &str, body: &Value) -> Result<Value> {
        self.bodies.push((path.to_string(), body.clone()));
        self.answer(Method::Post, path)
    }

    fn post_soft(&mut self, path: &str, body: &Value) -> Result<Value> {
        self.bodies.push((path.to_string(), body.clone()));
        self.answer(Method::Post, path)
    }

    fn delete(&mut self, path: &str) -> Result<Value> {
        self.answer(Method::Delete, path)
    }
}
